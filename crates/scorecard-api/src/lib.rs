//! Data-Quality Scorecard API Library
//!
//! Router, handlers, and the orchestration layer between HTTP requests and
//! the scoring engine. The binary in `main.rs` only wires configuration,
//! the store backend, and the listener around [`build_router`].

use axum::{routing::get, Router};
use dq_scorecard_storage::DynScoringBackend;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod dashboards;
pub mod engine;
pub mod error;
pub mod filter_options;
pub mod health;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod scorecards;
pub mod session;
pub mod sqlite_engine;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

/// Mount point of the dashboard API.
pub const API_PREFIX: &str = "/api/data-quality";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<DynScoringBackend>,
}

impl AppState {
    pub fn new(backend: Arc<DynScoringBackend>) -> Self {
        Self { backend }
    }
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let api = dashboards::routes().route(
        "/filter-options",
        get(filter_options::get_filter_options),
    );

    let router = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest(API_PREFIX, api);

    #[cfg(feature = "metrics")]
    let router = router
        .route("/metrics", get(metrics::metrics_handler))
        .layer(axum::middleware::from_fn(metrics::track_metrics));

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
