use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde_json::Value as Json;
use uuid::Uuid;

use super::PageRequest;
use crate::entities::inspection::{
    ActiveModel as InspectionActiveModel, Column, Entity as Inspection,
    Model as InspectionModel,
};
use crate::models::InspectionStatus;

pub async fn find_by_id<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<InspectionModel>, DbErr> {
    Inspection::find_by_id(id).one(conn).await
}

pub async fn insert<C: ConnectionTrait>(
    conn: &C,
    inspection: InspectionActiveModel,
) -> Result<InspectionModel, DbErr> {
    inspection.insert(conn).await
}

/// Files the report and closes the inspection. Returns 0 when the row is
/// missing or already completed or cancelled.
pub async fn complete_open<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    report: Json,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let mut update = Inspection::update_many()
        .col_expr(Column::Status, Expr::value(InspectionStatus::Completed))
        .col_expr(Column::Report, Expr::value(report))
        .col_expr(Column::CompletedAt, Expr::value(now))
        .col_expr(Column::UpdatedAt, Expr::value(now));

    if let Some(notes) = notes {
        update = update.col_expr(Column::Notes, Expr::value(notes));
    }

    let result = update
        .filter(Column::Id.eq(id))
        .filter(Column::Status.is_in(InspectionStatus::OPEN))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

pub async fn cancel_open<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let mut update = Inspection::update_many()
        .col_expr(Column::Status, Expr::value(InspectionStatus::Cancelled))
        .col_expr(Column::UpdatedAt, Expr::value(now));

    if let Some(notes) = notes {
        update = update.col_expr(Column::Notes, Expr::value(notes));
    }

    let result = update
        .filter(Column::Id.eq(id))
        .filter(Column::Status.is_in(InspectionStatus::OPEN))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Applies the set fields of `changes` while the row is still in
/// `expected_status`.
pub async fn update_if_status<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    expected_status: InspectionStatus,
    changes: InspectionActiveModel,
) -> Result<u64, DbErr> {
    let result = Inspection::update_many()
        .set(changes)
        .filter(Column::Id.eq(id))
        .filter(Column::Status.eq(expected_status))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

pub async fn delete<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<u64, DbErr> {
    let result = Inspection::delete_by_id(id).exec(conn).await?;
    Ok(result.rows_affected)
}

/// Every match, ordered newest-first on `order_by`.
pub async fn find_all<C: ConnectionTrait>(
    conn: &C,
    condition: Condition,
    order_by: Column,
) -> Result<Vec<InspectionModel>, DbErr> {
    Inspection::find()
        .filter(condition)
        .order_by_desc(order_by)
        .order_by_asc(Column::Id)
        .all(conn)
        .await
}

/// Latest appointment first. Returns the page and the total number of matches.
pub async fn find_page<C: ConnectionTrait>(
    conn: &C,
    condition: Condition,
    page: PageRequest,
) -> Result<(Vec<InspectionModel>, u64), DbErr> {
    let paginator = Inspection::find()
        .filter(condition)
        .order_by_desc(Column::ScheduledAt)
        .order_by_asc(Column::Id)
        .paginate(conn, page.limit);

    let total = paginator.num_items().await?;
    if page.offset() >= total {
        return Ok((Vec::new(), total));
    }
    let inspections = paginator.fetch_page(page.page - 1).await?;

    Ok((inspections, total))
}
