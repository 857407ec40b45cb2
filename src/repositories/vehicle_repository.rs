use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use super::PageRequest;
use crate::entities::vehicle::{
    ActiveModel as VehicleActiveModel, Column, Entity as Vehicle, Model as VehicleModel,
};
use crate::models::VehicleStatus;

pub async fn find_by_id<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<VehicleModel>, DbErr> {
    Vehicle::find_by_id(id).one(conn).await
}

pub async fn insert<C: ConnectionTrait>(
    conn: &C,
    vehicle: VehicleActiveModel,
) -> Result<VehicleModel, DbErr> {
    vehicle.insert(conn).await
}

/// Hands the vehicle to `buyer_id` and marks it sold.
///
/// Only applies while `seller_id` still owns an active listing; returns the
/// number of rows changed.
pub async fn transfer_to_buyer<C: ConnectionTrait>(
    conn: &C,
    vehicle_id: Uuid,
    seller_id: Uuid,
    buyer_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let result = Vehicle::update_many()
        .col_expr(Column::OwnerId, Expr::value(buyer_id))
        .col_expr(Column::Status, Expr::value(VehicleStatus::Sold))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(vehicle_id))
        .filter(Column::OwnerId.eq(seller_id))
        .filter(Column::Status.eq(VehicleStatus::Active))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Moves a vehicle from `from` to `to` if it is still in `from`.
pub async fn update_status<C: ConnectionTrait>(
    conn: &C,
    vehicle_id: Uuid,
    from: VehicleStatus,
    to: VehicleStatus,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let result = Vehicle::update_many()
        .col_expr(Column::Status, Expr::value(to))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(vehicle_id))
        .filter(Column::Status.eq(from))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Newest first. Returns the page and the total number of matches.
pub async fn find_page<C: ConnectionTrait>(
    conn: &C,
    condition: Condition,
    page: PageRequest,
) -> Result<(Vec<VehicleModel>, u64), DbErr> {
    let paginator = Vehicle::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt)
        .order_by_asc(Column::Id)
        .paginate(conn, page.limit);

    let total = paginator.num_items().await?;
    if page.offset() >= total {
        return Ok((Vec::new(), total));
    }
    let vehicles = paginator.fetch_page(page.page - 1).await?;

    Ok((vehicles, total))
}
