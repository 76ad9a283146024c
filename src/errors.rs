use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

use crate::domain::errors::DomainError;

/// Errors surfaced by the upload and read endpoints. Mutation endpoints never
/// produce these; they always answer `{success: bool}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No image uploaded.")]
    MissingPayload,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Image exceeds the maximum upload size of {0} bytes.")]
    PayloadTooLarge(usize),

    #[error("Not found")]
    NotFound,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::MissingPayload => AppError::MissingPayload,
            DomainError::NotFound => AppError::NotFound,
            DomainError::StorageUnavailable(msg) => AppError::StorageUnavailable(msg),
            DomainError::NotificationFailed(msg) | DomainError::BlobCleanupFailed(msg) => {
                AppError::Internal(msg)
            }
        }
    }
}

impl From<actix_multipart::MultipartError> for AppError {
    fn from(e: actix_multipart::MultipartError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingPayload | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Causes stay in the server log; clients get a short fixed message.
        let message = match self {
            AppError::MissingPayload | AppError::PayloadTooLarge(_) | AppError::NotFound => {
                self.to_string()
            }
            AppError::BadRequest(_) => "Malformed upload.".to_string(),
            AppError::StorageUnavailable(_) => {
                log::error!("{}", self);
                "Storage is temporarily unavailable. Please try again.".to_string()
            }
            AppError::Internal(_) => {
                log::error!("{}", self);
                "Internal server error".to_string()
            }
        };
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(message)
    }
}
