use actix_multipart::{Field, Multipart};
use actix_web::{web, Either, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::order_service::{Outcome, OrderService};
use crate::domain::order::{ImageUpload, Order};
use crate::errors::AppError;

pub const UPLOAD_CONFIRMATION: &str = "Image received! We will verify payment and email you soon.";

/// Longest accepted `email` form field.
const MAX_TEXT_FIELD: usize = 4 * 1024;

/// Largest accepted image part, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimit(pub usize);

// ── Request / response DTOs ──────────────────────────────────────────────────

/// Multipart form accepted by `POST /upload` (documentation only).
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct UploadForm {
    pub email: String,
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub email: String,
    /// Stored file name (served under `/uploads/`) or remote URL.
    pub image_ref: String,
    pub paid: bool,
    pub created_at: String,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            id: o.id,
            email: o.email,
            image_ref: o.image_ref,
            paid: o.paid,
            created_at: o.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkPaidRequest {
    pub id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteOrderRequest {
    pub id: String,
    /// Accepted from local-disk clients; the stored reference is what gets removed.
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

type JsonOrForm<T> = Result<Either<web::Json<T>, web::Form<T>>, actix_web::Error>;

fn body_of<T>(body: JsonOrForm<T>) -> Option<T> {
    match body {
        Ok(Either::Left(json)) => Some(json.into_inner()),
        Ok(Either::Right(form)) => Some(form.into_inner()),
        Err(e) => {
            log::warn!("Unreadable request body: {}", e);
            None
        }
    }
}

fn parse_id(raw: &str) -> Option<Uuid> {
    match Uuid::parse_str(raw.trim()) {
        Ok(id) => Some(id),
        Err(e) => {
            log::warn!("Rejecting malformed order id '{}': {}", raw, e);
            None
        }
    }
}

fn respond(outcome: Option<Outcome>) -> HttpResponse {
    let success = outcome.map(|o| o.success()).unwrap_or(false);
    HttpResponse::Ok().json(SuccessResponse { success })
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Bytes, AppError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.try_next().await? {
        if buf.len() + chunk.len() > limit {
            return Err(AppError::PayloadTooLarge(limit));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

fn content_type_for(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /upload
///
/// Stores the `image` part and records an unpaid order for `email`.
#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Order received", body = String),
        (status = 400, description = "No image uploaded"),
        (status = 413, description = "Image too large"),
        (status = 503, description = "Storage unavailable"),
    ),
    tag = "orders"
)]
pub async fn upload(
    service: web::Data<OrderService>,
    limit: web::Data<UploadLimit>,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let mut email: Option<String> = None;
    let mut image: Option<ImageUpload> = None;

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("email") => {
                let raw = read_field(&mut field, MAX_TEXT_FIELD)
                    .await
                    .map_err(|e| match e {
                        AppError::PayloadTooLarge(_) => {
                            AppError::BadRequest("email field too long".to_string())
                        }
                        other => other,
                    })?;
                email = Some(String::from_utf8_lossy(&raw).trim().to_string());
            }
            Some("image") => {
                let original_name = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .map(str::to_owned);
                let bytes = read_field(&mut field, limit.0).await?;
                image = Some(ImageUpload {
                    original_name,
                    bytes,
                });
            }
            _ => {
                while field.try_next().await?.is_some() {}
            }
        }
    }

    let Some(image) = image else {
        log::warn!("Upload rejected: no image part");
        return Err(AppError::MissingPayload);
    };

    service.intake(email.unwrap_or_default(), image).await?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(UPLOAD_CONFIRMATION))
}

/// GET /uploads-data
///
/// Every recorded order, oldest first.
#[utoipa::path(
    get,
    path = "/uploads-data",
    responses(
        (status = 200, description = "All orders", body = [OrderResponse]),
        (status = 503, description = "Storage unavailable"),
    ),
    tag = "orders"
)]
pub async fn uploads_data(service: web::Data<OrderService>) -> Result<HttpResponse, AppError> {
    let orders: Vec<OrderResponse> = service
        .list_orders()
        .await?
        .into_iter()
        .map(OrderResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(orders))
}

/// POST /mark-paid
#[utoipa::path(
    post,
    path = "/mark-paid",
    request_body(content = MarkPaidRequest, description = "JSON or urlencoded"),
    responses(
        (status = 200, description = "Whether the order is now paid", body = SuccessResponse),
    ),
    tag = "orders"
)]
pub async fn mark_paid(
    service: web::Data<OrderService>,
    body: JsonOrForm<MarkPaidRequest>,
) -> HttpResponse {
    let outcome = match body_of(body).and_then(|req| parse_id(&req.id)) {
        Some(id) => Some(service.mark_paid(id).await),
        None => None,
    };
    respond(outcome)
}

/// POST /delete-order
#[utoipa::path(
    post,
    path = "/delete-order",
    request_body(content = DeleteOrderRequest, description = "JSON or urlencoded"),
    responses(
        (status = 200, description = "Whether the order was deleted", body = SuccessResponse),
    ),
    tag = "orders"
)]
pub async fn delete_order(
    service: web::Data<OrderService>,
    body: JsonOrForm<DeleteOrderRequest>,
) -> HttpResponse {
    let Some(req) = body_of(body) else {
        return respond(None);
    };
    let Some(id) = parse_id(&req.id) else {
        return respond(None);
    };

    if let Some(filename) = req.filename.as_deref() {
        match service.get_order(id).await {
            Ok(Some(order)) if order.image_ref != filename => log::warn!(
                "delete-order {}: client filename '{}' differs from stored '{}'; using stored",
                id,
                filename,
                order.image_ref
            ),
            _ => {}
        }
    }

    respond(Some(service.delete(id).await))
}

/// GET /uploads/{name}
///
/// Raw bytes of a stored image.
#[utoipa::path(
    get,
    path = "/uploads/{name}",
    params(
        ("name" = String, Path, description = "Stored image reference"),
    ),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 404, description = "No such image"),
        (status = 503, description = "Storage unavailable"),
    ),
    tag = "orders"
)]
pub async fn get_upload(
    service: web::Data<OrderService>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let name = path.into_inner();

    match service.fetch_image(&name).await? {
        Some(bytes) => Ok(HttpResponse::Ok()
            .content_type(content_type_for(&name))
            .body(bytes)),
        None => Err(AppError::NotFound),
    }
}
