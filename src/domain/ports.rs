use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use super::errors::DomainError;
use super::order::{DeliveryReceipt, NewOrder, Order, OrderChange};

/// Persistent collection of orders. Calls are blocking; the application layer
/// moves them onto the blocking pool.
pub trait OrderRepository: Send + Sync + 'static {
    fn insert(&self, order: NewOrder) -> Result<Uuid, DomainError>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError>;
    fn find_all(&self) -> Result<Vec<Order>, DomainError>;
    /// Returns `false` when no order with `id` exists.
    fn update(&self, id: Uuid, change: OrderChange) -> Result<bool, DomainError>;
    /// Returns `false` when no order with `id` exists.
    fn delete_by_id(&self, id: Uuid) -> Result<bool, DomainError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Stores `bytes` and returns the reference recorded on the order.
    async fn put(&self, original_name: Option<&str>, bytes: Bytes) -> Result<String, DomainError>;
    async fn get(&self, image_ref: &str) -> Result<Option<Bytes>, DomainError>;
    /// Returns `false` when there was nothing to remove.
    async fn delete(&self, image_ref: &str) -> Result<bool, DomainError>;
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(
        &self,
        destination: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<DeliveryReceipt, DomainError>;
}
