use actix_web::web;
use dotenvy::dotenv;
use order_intake::config::AppConfig;
use order_intake::{build_server, build_service, BoxError};

#[actix_web::main]
async fn main() -> Result<(), BoxError> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env()?;
    let service = web::Data::new(build_service(&config)?);

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(service.clone(), config.max_upload_bytes, &config.host, config.port)?.await?;

    drop(service);
    log::info!("Server stopped; order store closed");
    Ok(())
}
