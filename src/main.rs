use actix_web::{web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod app;
mod model;
mod service;
mod upstream;

use app::AppState;
use model::Config;

const ENV_LOG_LEVEL: &str = "SECSCORE_LOG_LEVEL";

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (ignore if missing)
    let _ = dotenvy::dotenv();

    // Initialize tracing; RUST_LOG wins over SECSCORE_LOG_LEVEL.
    let default_level =
        std::env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr();

    let state = AppState::new(config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to initialize application state");
        std::process::exit(1);
    });
    let state = web::Data::new(state);

    tracing::info!("Starting SecScore intelligence server on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::cve::configure)
            .configure(api::admin::configure)
            .configure(api::health::configure)
            .configure(api::openapi::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
