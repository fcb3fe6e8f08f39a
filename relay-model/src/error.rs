//! Error taxonomy for calls to the inference backend.

use thiserror::Error;

/// Failures talking to the inference backend.
///
/// Each variant is a distinct, user-facing failure kind; callers map them to
/// messages rather than matching on error strings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend refused or could not accept the connection.
    #[error("Inference backend unreachable: {0}")]
    BackendUnreachable(String),

    /// Connecting, waiting for the first byte, or waiting between chunks took too long.
    #[error("Inference backend timed out: {0}")]
    BackendTimeout(String),

    /// The backend answered a stream request with a 5xx status.
    #[error("Inference backend internal error (status {status})")]
    BackendInternalError {
        /// HTTP status code
        status: u16,
    },

    /// The backend rejected a stream request with a 4xx status.
    #[error("Invalid request to inference backend (status {status}): {detail}")]
    InvalidRequest {
        /// HTTP status code
        status: u16,
        /// Backend-supplied `detail`, or a generic message.
        detail: String,
    },

    /// A synchronous generation call returned a non-2xx status.
    #[error("Inference backend returned {status}: {detail}")]
    InferenceError {
        /// HTTP status code
        status: u16,
        /// Backend-supplied `detail`, or a generic message.
        detail: String,
    },

    /// Anything else: malformed responses, protocol errors, broken streams.
    #[error("Inference backend error: {0}")]
    UnknownBackendError(String),

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for backend calls.
pub type Result<T> = std::result::Result<T, BackendError>;
