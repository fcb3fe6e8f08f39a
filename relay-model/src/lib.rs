//! # relay-model
//!
//! Client side of the inference backend used by the chat relay.
//!
//! ## Overview
//!
//! - [`InferenceBackend`] - the seam the relay talks to
//! - [`HttpInferenceClient`] - `reqwest` implementation with synchronous and
//!   streaming modes and classified failures
//! - [`MockBackend`] - scripted backend for tests
//!
//! ## Modes
//!
//! | Operation | Request body | Response |
//! |-----------|--------------|----------|
//! | [`generate`](InferenceBackend::generate) | `{ prompt, max_tokens, temperature }` | `{ reply }` or `{ text }` |
//! | [`generate_stream`](InferenceBackend::generate_stream) | `{ message, session_id }` | raw chunked bytes |
//!
//! ## Failure kinds
//!
//! | Condition | Error |
//! |-----------|-------|
//! | connection refused | [`BackendError::BackendUnreachable`] |
//! | connect / first byte / idle timeout | [`BackendError::BackendTimeout`] |
//! | stream request answered 5xx | [`BackendError::BackendInternalError`] |
//! | stream request answered 4xx | [`BackendError::InvalidRequest`] |
//! | sync request answered non-2xx | [`BackendError::InferenceError`] |
//! | anything else | [`BackendError::UnknownBackendError`] |

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod mock;

pub use backend::{ByteStream, GenerationParams, InferenceBackend, InferenceOutput, InferenceRequest};
pub use client::HttpInferenceClient;
pub use config::{InferenceConfig, InferenceConfigBuilder};
pub use error::{BackendError, Result};
pub use mock::MockBackend;
