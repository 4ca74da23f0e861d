//! Health Check Module
//!
//! - `/health` - Liveness, returns `{"status": "ok"}` while the process runs
//! - `/ready` - Readiness, checks scoring store connectivity

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Body of `/health`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
}

/// Readiness response with component detail
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Basic health check, suitable for load balancers.
pub async fn health_check() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check
///
/// Verifies that a store connection can be opened and answers a query.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_health = match check_database_health(&state).await {
        Ok(latency_ms) => ComponentHealth {
            status: HealthStatus::Healthy,
            latency_ms: Some(latency_ms),
            message: None,
        },
        Err(e) => ComponentHealth {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(e),
        },
    };

    let overall_status = db_health.status;
    let status_code = match overall_status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status: overall_status,
        database: Some(db_health),
        message: if overall_status == HealthStatus::Healthy {
            Some("Service is ready".to_string())
        } else {
            Some("Service is not ready".to_string())
        },
    };

    tracing::debug!(status = ?overall_status, "Readiness check completed");

    (status_code, Json(response))
}

async fn check_database_health(state: &AppState) -> Result<u64, String> {
    let start = std::time::Instant::now();

    let conn = state
        .backend
        .get_connection()
        .await
        .map_err(|e| format!("Failed to get connection: {}", e))?;

    tokio::task::spawn_blocking(move || {
        conn.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get::<_, i64>(0))
            .map_err(|e| format!("Database query failed: {}", e))
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))??;

    Ok(start.elapsed().as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestStore;

    #[tokio::test]
    async fn test_health_check() {
        let Json(body) = health_check().await;
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn test_database_health_on_initialized_store() {
        let store = TestStore::new().await.unwrap();
        assert!(check_database_health(&store.state()).await.is_ok());
    }
}
