//! Live sums over active allocations.
//!
//! Paid, unpaid, allocated and unallocated figures are never stored; every
//! repository derives them from these queries.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::entities::{allocations, sea_orm_active_enums::AllocationStatus};

/// Sum of active allocations whose `column` equals `id`.
pub(crate) async fn allocated_for<C: ConnectionTrait>(
    conn: &C,
    column: allocations::Column,
    id: Uuid,
) -> Result<Decimal, DbErr> {
    let total: Option<Option<Decimal>> = allocations::Entity::find()
        .select_only()
        .column_as(allocations::Column::Amount.sum(), "allocated")
        .filter(column.eq(id))
        .filter(allocations::Column::Status.eq(AllocationStatus::Active))
        .into_tuple()
        .one(conn)
        .await?;

    Ok(total.flatten().unwrap_or(Decimal::ZERO))
}

/// Sums of active allocations grouped by `column`, for the given ids.
///
/// Ids without allocations are absent from the map.
pub(crate) async fn allocated_by<C: ConnectionTrait>(
    conn: &C,
    column: allocations::Column,
    ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, Decimal>, DbErr> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, Decimal)> = allocations::Entity::find()
        .select_only()
        .column(column)
        .column_as(allocations::Column::Amount.sum(), "allocated")
        .filter(column.is_in(ids))
        .filter(allocations::Column::Status.eq(AllocationStatus::Active))
        .group_by(column)
        .into_tuple()
        .all(conn)
        .await?;

    Ok(rows.into_iter().collect())
}

/// Number of allocations whose `column` equals `id`.
pub(crate) async fn count_allocations<C: ConnectionTrait>(
    conn: &C,
    column: allocations::Column,
    id: Uuid,
    active_only: bool,
) -> Result<u64, DbErr> {
    let mut query = allocations::Entity::find().filter(column.eq(id));
    if active_only {
        query = query.filter(allocations::Column::Status.eq(AllocationStatus::Active));
    }
    query.count(conn).await
}
