//! API error types.

use crate::delta::DeltaError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// API error type.
///
/// Response bodies are short fixed strings; details stay in the logs.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request originates from this peer")]
    SelfRequest,

    #[error("catalog not found: {0}")]
    CatalogNotFound(String),

    #[error("refresh queue closed")]
    QueueClosed,

    #[error("delta error: {0}")]
    Delta(#[from] DeltaError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SelfRequest => "self_request",
            Self::CatalogNotFound(_) => "not_found",
            Self::QueueClosed => "unavailable",
            Self::Delta(_) => "delta_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SelfRequest => StatusCode::CONFLICT,
            Self::CatalogNotFound(_) => StatusCode::NOT_FOUND,
            Self::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
            Self::Delta(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::SelfRequest => "409 conflict, cannot serve myself",
            Self::CatalogNotFound(_) => "404 not found, sorry",
            Self::QueueClosed => "503 service unavailable, shutting down",
            Self::Delta(_) | Self::Internal(_) => "500 internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }
        (status, self.public_message()).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
