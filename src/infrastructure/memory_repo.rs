use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{NewOrder, Order, OrderChange};
use crate::domain::ports::OrderRepository;

/// Process-local order store. Contents are lost when the process exits.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> DomainError {
    DomainError::StorageUnavailable("in-memory order store lock poisoned".to_string())
}

impl OrderRepository for InMemoryOrderRepository {
    fn insert(&self, order: NewOrder) -> Result<Uuid, DomainError> {
        let id = Uuid::new_v4();
        let mut orders = self.orders.write().map_err(poisoned)?;
        orders.insert(
            id,
            Order {
                id,
                email: order.email,
                image_ref: order.image_ref,
                paid: false,
                notified: false,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders.get(&id).cloned())
    }

    fn find_all(&self) -> Result<Vec<Order>, DomainError> {
        let orders = self.orders.read().map_err(poisoned)?;
        let mut all: Vec<Order> = orders.values().cloned().collect();
        all.sort_by_key(|o| o.created_at);
        Ok(all)
    }

    fn update(&self, id: Uuid, change: OrderChange) -> Result<bool, DomainError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        let Some(order) = orders.get_mut(&id) else {
            return Ok(false);
        };
        match change {
            OrderChange::MarkPaid => order.paid = true,
            OrderChange::MarkNotified => order.notified = true,
        }
        Ok(true)
    }

    fn delete_by_id(&self, id: Uuid) -> Result<bool, DomainError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        Ok(orders.remove(&id).is_some())
    }
}
