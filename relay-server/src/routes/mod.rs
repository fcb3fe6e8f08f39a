//! HTTP route handlers
//!
//! - `chat`: streaming and one-shot chat relays
//! - `health`: liveness plus index and embedder status

pub mod chat;
pub mod health;

use crate::error::RelayError;

/// Fallback for undefined routes.
pub async fn not_found() -> RelayError {
    RelayError::NotFound
}
