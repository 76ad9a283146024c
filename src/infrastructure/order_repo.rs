use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{NewOrder, Order, OrderChange};
use crate::domain::ports::OrderRepository;
use crate::schema::orders;

use super::models::{NewOrderRow, OrderRow};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::StorageUnavailable(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::StorageUnavailable(e.to_string())
    }
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl OrderRepository for DieselOrderRepository {
    fn insert(&self, order: NewOrder) -> Result<Uuid, DomainError> {
        let mut conn = self.pool.get()?;

        let order_id = Uuid::new_v4();
        diesel::insert_into(orders::table)
            .values(&NewOrderRow {
                id: order_id,
                email: order.email,
                image_ref: order.image_ref,
                paid: false,
                notified: false,
            })
            .execute(&mut conn)?;

        Ok(order_id)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = orders::table
            .filter(orders::id.eq(id))
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(row.map(Order::from))
    }

    fn find_all(&self) -> Result<Vec<Order>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows = orders::table
            .select(OrderRow::as_select())
            .order(orders::created_at.asc())
            .load(&mut conn)?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    fn update(&self, id: Uuid, change: OrderChange) -> Result<bool, DomainError> {
        let mut conn = self.pool.get()?;

        let affected = match change {
            OrderChange::MarkPaid => diesel::update(orders::table.find(id))
                .set((orders::paid.eq(true), orders::updated_at.eq(Utc::now())))
                .execute(&mut conn)?,
            OrderChange::MarkNotified => diesel::update(orders::table.find(id))
                .set((orders::notified.eq(true), orders::updated_at.eq(Utc::now())))
                .execute(&mut conn)?,
        };

        Ok(affected > 0)
    }

    fn delete_by_id(&self, id: Uuid) -> Result<bool, DomainError> {
        let mut conn = self.pool.get()?;

        let affected = diesel::delete(orders::table.find(id)).execute(&mut conn)?;

        Ok(affected > 0)
    }
}
