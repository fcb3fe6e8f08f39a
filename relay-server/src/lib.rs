//! # relay-server
//!
//! HTTP front of the chat relay. Each message is embedded, matched against
//! the menu index, wrapped into a prompt and forwarded to the inference
//! backend; the backend's reply is streamed back chunk by chunk.
//!
//! ## Endpoints
//!
//! | Route | Body | Response |
//! |-------|------|----------|
//! | `POST /chat` | `{ message, sessionId? }` | `text/plain` stream |
//! | `POST /chat/complete` | `{ message, sessionId? }` | `{ reply }` |
//! | `GET /health` | | `{ status, documents, embedder }` |
//!
//! Errors before streaming starts are returned as `{ statusCode, message }`.
//! A stream that fails after its first chunk ends with
//! `"\n\n[error] <message>"`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relay_server::RelayConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RelayConfig::from_env()?;
//!     relay_server::start_server(config).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod session;
pub mod state;
pub mod telemetry;

pub use config::{RelayConfig, RelayConfigBuilder};
pub use error::{ERROR_MARKER, ErrorResponse, RelayError, RelayResult};
pub use server::{build_router, serve, start_server};
pub use session::{RelaySession, RelayState, RelayStream};
pub use state::AppState;
pub use telemetry::{LogFormat, init_tracing};
