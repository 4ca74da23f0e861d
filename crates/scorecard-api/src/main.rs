//! Data-Quality Scorecard API Server
//!
//! REST API for scorecard dashboards over a scoring store.

use dq_scorecard_api::{build_router, config::ServerConfig, AppState};
use dq_scorecard_storage::{backend_from_uri, ScoringBackend};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    tracing::info!("Using scoring store at: {}", config.db_path);

    let backend = backend_from_uri(&config.db_path).unwrap_or_else(|e| {
        tracing::error!("Failed to create backend: {}", e);
        std::process::exit(1);
    });

    prepare_store(backend.as_ref(), config.init_schema).await;

    let app = build_router(AppState::new(Arc::from(backend)));

    let addr = config.socket_addr();
    tracing::info!("Scorecard API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Create a missing store or bring an existing one up to the current schema.
///
/// With `init_schema` off the store must already exist and is left as is.
async fn prepare_store(backend: &dyn ScoringBackend, init_schema: bool) {
    let exists = backend.exists().await.unwrap_or_else(|e| {
        tracing::error!("Failed to check scoring store: {}", e);
        std::process::exit(1);
    });

    match (exists, init_schema) {
        (false, true) => {
            tracing::warn!("Scoring store does not exist, initializing new store");
            if let Err(e) = backend.initialize().await {
                tracing::error!("Failed to initialize scoring store: {}", e);
                std::process::exit(1);
            }
        }
        (false, false) => {
            tracing::error!("Scoring store does not exist and SCORECARD_INIT_SCHEMA is off");
            std::process::exit(1);
        }
        (true, true) => {
            if let Err(e) = backend.ensure_schema().await {
                tracing::error!("Failed to update scoring store schema: {}", e);
                std::process::exit(1);
            }
        }
        (true, false) => {}
    }
}
