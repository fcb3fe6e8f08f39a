//! Relay errors and their HTTP rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_model::BackendError;
use relay_rag::RagError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type RelayResult<T> = Result<T, RelayError>;

/// Marker that ends a relayed stream which failed after streaming began.
pub const ERROR_MARKER: &str = "\n\n[error] ";

const UNREACHABLE: &str = "AI server is not responding. Please ensure the model server is running.";
const TIMEOUT: &str = "AI server request timed out. The model may be overloaded.";
const INTERNAL: &str = "AI server encountered an internal error. Please try again later.";
const KNOWLEDGE_BASE: &str =
    "The menu knowledge base is temporarily unavailable. Please try again later.";
const GENERIC: &str = "Failed to communicate with AI server. Please try again.";

/// Everything that can end a relay early.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The caller sent an unusable request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found")]
    NotFound,

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error(transparent)]
    Rag(#[from] RagError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// JSON body of an error response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub message: String,
}

impl RelayError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::NotFound => StatusCode::NOT_FOUND,
            RelayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the end user.
    ///
    /// Only a backend's 4xx `detail` is passed through; every other internal
    /// detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            RelayError::BadRequest(msg) => msg.clone(),
            RelayError::NotFound => "Not found".to_string(),
            RelayError::PayloadTooLarge(_) => self.to_string(),
            RelayError::Backend(err) => match err {
                BackendError::BackendUnreachable(_) => UNREACHABLE.to_string(),
                BackendError::BackendTimeout(_) => TIMEOUT.to_string(),
                BackendError::BackendInternalError { .. } => INTERNAL.to_string(),
                BackendError::InvalidRequest { detail, .. } => {
                    format!("Invalid request to AI server: {detail}")
                }
                BackendError::InferenceError { status, .. } => {
                    format!("AI server returned an error (status {status}).")
                }
                BackendError::UnknownBackendError(_) | BackendError::ConfigError(_) => {
                    GENERIC.to_string()
                }
            },
            RelayError::Rag(err) => match err {
                RagError::EmbeddingUnavailable { .. }
                | RagError::IndexUnavailable { .. }
                | RagError::DimensionMismatch { .. } => KNOWLEDGE_BASE.to_string(),
                _ => GENERIC.to_string(),
            },
            RelayError::Config(_) => GENERIC.to_string(),
        }
    }

    /// Short name of the failure kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::BadRequest(_) => "bad_request",
            RelayError::NotFound => "not_found",
            RelayError::PayloadTooLarge(_) => "payload_too_large",
            RelayError::Backend(err) => match err {
                BackendError::BackendUnreachable(_) => "backend_unreachable",
                BackendError::BackendTimeout(_) => "backend_timeout",
                BackendError::BackendInternalError { .. } => "backend_internal_error",
                BackendError::InvalidRequest { .. } => "invalid_request",
                BackendError::InferenceError { .. } => "inference_error",
                BackendError::UnknownBackendError(_) => "unknown_backend_error",
                BackendError::ConfigError(_) => "backend_config_error",
            },
            RelayError::Rag(err) => match err {
                RagError::EmbeddingUnavailable { .. } => "embedding_unavailable",
                RagError::IndexUnavailable { .. } | RagError::DimensionMismatch { .. } => {
                    "index_unavailable"
                }
                _ => "retrieval_error",
            },
            RelayError::Config(_) => "config_error",
        }
    }

    /// Bytes appended to a stream that failed mid-relay.
    pub fn in_band_marker(&self) -> String {
        format!("{ERROR_MARKER}{}", self.user_message())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "relay failed");
        } else {
            tracing::debug!(kind = self.kind(), error = %self, "request rejected");
        }

        let body = ErrorResponse { status_code: status.as_u16(), message: self.user_message() };
        (status, Json(body)).into_response()
    }
}
