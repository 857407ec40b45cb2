use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use super::PageRequest;
use crate::entities::transaction::{
    ActiveModel as TransactionActiveModel, Column, Entity as Transaction,
    Model as TransactionModel,
};
use crate::models::TransactionStatus;

pub async fn find_by_id<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<TransactionModel>, DbErr> {
    Transaction::find_by_id(id).one(conn).await
}

pub async fn insert<C: ConnectionTrait>(
    conn: &C,
    transaction: TransactionActiveModel,
) -> Result<TransactionModel, DbErr> {
    transaction.insert(conn).await
}

/// Marks a pending transaction completed. Returns 0 when the row is missing
/// or no longer pending.
pub async fn complete_pending<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    transaction_reference: &str,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let mut update = Transaction::update_many()
        .col_expr(Column::Status, Expr::value(TransactionStatus::Completed))
        .col_expr(Column::CompletedAt, Expr::value(now))
        .col_expr(Column::PaidAt, Expr::value(now))
        .col_expr(
            Column::TransactionReference,
            Expr::value(transaction_reference.to_string()),
        )
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .col_expr(Column::Version, Expr::col(Column::Version).add(1));

    if let Some(notes) = notes {
        update = update.col_expr(Column::Notes, Expr::value(notes));
    }

    let result = update
        .filter(Column::Id.eq(id))
        .filter(Column::Status.eq(TransactionStatus::Pending))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Marks a pending transaction cancelled. Returns 0 when the row is missing
/// or no longer pending.
pub async fn cancel_pending<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let mut update = Transaction::update_many()
        .col_expr(Column::Status, Expr::value(TransactionStatus::Cancelled))
        .col_expr(Column::CancelledAt, Expr::value(now))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .col_expr(Column::Version, Expr::col(Column::Version).add(1));

    if let Some(notes) = notes {
        update = update.col_expr(Column::Notes, Expr::value(notes));
    }

    let result = update
        .filter(Column::Id.eq(id))
        .filter(Column::Status.eq(TransactionStatus::Pending))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Applies the set fields of `changes` if the row is still at
/// `expected_version`. Bumps the version.
pub async fn update_if_version<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    expected_version: i32,
    changes: TransactionActiveModel,
) -> Result<u64, DbErr> {
    let result = Transaction::update_many()
        .set(changes)
        .col_expr(Column::Version, Expr::value(expected_version + 1))
        .filter(Column::Id.eq(id))
        .filter(Column::Version.eq(expected_version))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Newest first, unpaged.
pub async fn find_all<C: ConnectionTrait>(
    conn: &C,
    condition: Condition,
) -> Result<Vec<TransactionModel>, DbErr> {
    Transaction::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt)
        .order_by_asc(Column::Id)
        .all(conn)
        .await
}

/// Newest first. Returns the page and the total number of matches.
pub async fn find_page<C: ConnectionTrait>(
    conn: &C,
    condition: Condition,
    page: PageRequest,
) -> Result<(Vec<TransactionModel>, u64), DbErr> {
    let paginator = Transaction::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt)
        .order_by_asc(Column::Id)
        .paginate(conn, page.limit);

    let total = paginator.num_items().await?;
    if page.offset() >= total {
        return Ok((Vec::new(), total));
    }
    let transactions = paginator.fetch_page(page.page - 1).await?;

    Ok((transactions, total))
}

/// How many transactions cite `inspection_id`.
pub async fn count_for_inspection<C: ConnectionTrait>(
    conn: &C,
    inspection_id: Uuid,
) -> Result<u64, DbErr> {
    Transaction::find()
        .filter(Column::InspectionId.eq(inspection_id))
        .count(conn)
        .await
}

/// Matches transactions where `user_id` is seller or buyer.
pub fn party_condition(user_id: Uuid) -> Condition {
    Condition::any()
        .add(Column::SellerId.eq(user_id))
        .add(Column::BuyerId.eq(user_id))
}
