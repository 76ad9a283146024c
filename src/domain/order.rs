use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: Uuid,
    pub email: String,
    pub image_ref: String,
    pub paid: bool,
    /// Set once the payment confirmation has been delivered.
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied at intake. `paid` always starts out `false` and the id is
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub email: String,
    pub image_ref: String,
}

/// Mutations an order supports after creation. Both flags only ever move
/// from `false` to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderChange {
    MarkPaid,
    MarkNotified,
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub original_name: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub destination: String,
    pub detail: String,
}
