//! Error types for the REST endpoints.
//!
//! [`ApiError`] converts into an Axum response with a JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use playground_core::CoreError;
use playground_db::DbError;

/// Errors returned by REST handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No valid bearer token was presented.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller may not perform this action.
    #[error("forbidden")]
    Forbidden,

    /// The request body was rejected.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A store call failed.
    #[error("store error: {0}")]
    Store(#[from] DbError),

    /// Any other failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Store(db) => Self::Store(db),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!(error = %self, "Request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
