//! API error taxonomy and HTTP mapping.
//!
//! Every failure a handler can produce is funneled into [`ApiError`], which
//! converts to a `{"error": …}` JSON response at the router boundary.
//! Nothing escapes unhandled: unexpected failures arrive here via
//! `anyhow::Error` and surface as a generic 500.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::extract::ExtractionError;
use crate::llm::GenerationError;
use crate::multipart::MultipartError;

/// Boundary error type for the HTTP API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A required field or part was missing or empty.
    #[error("{0}")]
    Validation(String),

    /// The upload body could not be decoded.
    #[error(transparent)]
    Multipart(#[from] MultipartError),

    /// The document yielded no usable text.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// No session is registered under the given ID.
    #[error("chat session not found: {0}")]
    SessionNotFound(String),

    /// The text generation backend failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Anything unexpected.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Multipart(_) | Self::Extraction(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Generation(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(name: "api.error", error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
