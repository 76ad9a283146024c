use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("No image uploaded")]
    MissingPayload,
    #[error("Order not found")]
    NotFound,
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Notification failed: {0}")]
    NotificationFailed(String),
    #[error("Blob cleanup failed: {0}")]
    BlobCleanupFailed(String),
}
