use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use strata_core::StrataError;
use thiserror::Error;
use tracing::error;

/// Errors returned by gateway handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The workflow definition was rejected.
    #[error("{0}")]
    Validation(String),

    /// Unknown workflow id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation is not allowed in the workflow's current status.
    #[error("{0}")]
    InvalidState(String),

    /// Malformed query or parameter.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<StrataError> for ApiError {
    fn from(err: StrataError) -> Self {
        match err {
            StrataError::Validation(e) => ApiError::Validation(e.to_string()),
            StrataError::NotFound(what) => ApiError::NotFound(what),
            StrataError::InvalidState(msg) => ApiError::InvalidState(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::InvalidState(_) => (StatusCode::BAD_REQUEST, "INVALID_STATE"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for gateway handlers.
pub type ApiResult<T> = Result<T, ApiError>;
