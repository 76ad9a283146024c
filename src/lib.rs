pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::application::order_service::OrderService;
use crate::config::{AppConfig, BlobConfig, StoreConfig};
use crate::domain::ports::{BlobStore, Notifier, OrderRepository};
use crate::handlers::orders::UploadLimit;
use crate::infrastructure::blob_store::ObjectBlobStore;
use crate::infrastructure::mailer::{LogNotifier, SmtpNotifier};
use crate::infrastructure::memory_repo::InMemoryOrderRepository;
use crate::infrastructure::order_repo::DieselOrderRepository;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::orders::upload,
        handlers::orders::uploads_data,
        handlers::orders::mark_paid,
        handlers::orders::delete_order,
        handlers::orders::get_upload,
    ),
    components(schemas(
        handlers::orders::UploadForm,
        handlers::orders::OrderResponse,
        handlers::orders::MarkPaidRequest,
        handlers::orders::DeleteOrderRequest,
        handlers::orders::SuccessResponse,
    )),
    tags((name = "orders", description = "Order intake and administration"))
)]
pub struct ApiDoc;

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), BoxError> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)?;
    Ok(())
}

/// Open the configured order store, blob store and notifier and wire them
/// into an [`OrderService`].
pub fn build_service(config: &AppConfig) -> Result<OrderService, BoxError> {
    let repo: Arc<dyn OrderRepository> = match &config.store {
        StoreConfig::Memory => {
            log::info!("Using in-memory order store");
            Arc::new(InMemoryOrderRepository::new())
        }
        StoreConfig::Postgres { database_url } => {
            let pool = create_pool(database_url, config.store_timeout)?;
            run_migrations(&pool)?;
            log::info!("Using PostgreSQL order store");
            Arc::new(DieselOrderRepository::new(pool))
        }
    };

    let blobs: Arc<dyn BlobStore> = match &config.blob {
        BlobConfig::Local { upload_dir } => {
            log::info!("Storing images under {}", upload_dir.display());
            Arc::new(ObjectBlobStore::local(upload_dir)?)
        }
        BlobConfig::S3(settings) => {
            log::info!("Storing images in bucket {}", settings.bucket);
            Arc::new(ObjectBlobStore::s3(settings)?)
        }
        BlobConfig::Azure(settings) => {
            log::info!(
                "Storing images in Azure container {}/{}",
                settings.account,
                settings.container
            );
            Arc::new(ObjectBlobStore::azure(settings)?)
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => {
            log::info!("Sending confirmations through {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpNotifier::new(smtp, config.store_timeout)?)
        }
        None => {
            log::info!("SMTP_HOST not set; confirmations will be logged");
            Arc::new(LogNotifier)
        }
    };

    Ok(OrderService::new(repo, blobs, notifier).with_timeout(config.store_timeout))
}

/// Register the order endpoints. Expects `web::Data<OrderService>` and
/// `web::Data<UploadLimit>` to be present as app data.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/upload", web::post().to(handlers::orders::upload))
        .route("/uploads-data", web::get().to(handlers::orders::uploads_data))
        .route("/uploads/{name}", web::get().to(handlers::orders::get_upload))
        .route("/mark-paid", web::post().to(handlers::orders::mark_paid))
        .route("/delete-order", web::post().to(handlers::orders::delete_order));
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    service: web::Data<OrderService>,
    max_upload_bytes: usize,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let limit = web::Data::new(UploadLimit(max_upload_bytes));
    let openapi = ApiDoc::openapi();

    Ok(HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .app_data(limit.clone())
            .wrap(Logger::default())
            .configure(routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
