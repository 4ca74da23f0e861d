//! HTTP error mapping
//!
//! Every handler returns `Result<_, ApiError>`. Errors render as
//! `{"error": "<message>"}` with the status chosen from the scorecard error
//! taxonomy: unknown project or dashboard → 404, malformed input → 400,
//! everything else → 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dq_scorecard_core::ScorecardError;
use serde::{Deserialize, Serialize};

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error ready to be sent to the client.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ScorecardError> for ApiError {
    fn from(err: ScorecardError) -> Self {
        match &err {
            ScorecardError::ProjectNotFound(_) | ScorecardError::DashboardNotFound(_) => {
                ApiError::not_found(err.to_string())
            }
            ScorecardError::InvalidIdentifier(_)
            | ScorecardError::InvalidCategory { .. }
            | ScorecardError::ValidationError(_) => ApiError::bad_request(err.to_string()),
            ScorecardError::Sqlite(_)
            | ScorecardError::SerializationError(_)
            | ScorecardError::Other(_) => {
                tracing::error!(error = %err, "Scorecard operation failed");
                ApiError::internal_error(err.to_string())
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!(error = %err, "Blocking task failed");
        ApiError::internal_error(format!("Task join error: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
