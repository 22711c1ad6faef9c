//! Error types for textsense-ta
//!
//! - `AnalysisError`: outcome of orchestration (input, readiness, execution)
//! - `ApiError`: HTTP mapping of every failure a handler can return

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use textsense_common::auth::AuthError;
use thiserror::Error;

use crate::types::Category;

/// Orchestration error taxonomy
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalysisError {
    /// Request failed shape or length constraints (never retried)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Bootstrap incomplete or a required category never became Ready
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A Ready pipeline failed while serving this request
    #[error("{category} analysis failed: {message}")]
    ExecutionFailure { category: Category, message: String },
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or rejected credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Models not ready (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Pipeline execution failed (500)
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::InvalidInput(msg) => ApiError::BadRequest(msg),
            AnalysisError::ServiceUnavailable(msg) => ApiError::ServiceUnavailable(msg),
            e @ AnalysisError::ExecutionFailure { .. } => ApiError::ExecutionFailed(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
            ApiError::ExecutionFailed(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "EXECUTION_FAILED", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
