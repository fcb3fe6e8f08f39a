//! The [`InferenceBackend`] trait and its request/response types.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, Result};

/// Lazy, finite, non-restartable sequence of response chunks in arrival order.
///
/// Dropping the stream closes the underlying backend connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Sampling parameters for synchronous generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { max_tokens: 300, temperature: 0.7 }
    }
}

/// What the caller wants from the backend. The mode is picked by the
/// caller, never inferred from the response shape.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceRequest {
    Sync { prompt: String, params: GenerationParams },
    Stream { message: String, session_id: String },
}

/// Backend output, tagged by mode.
pub enum InferenceOutput {
    Sync(String),
    Stream(ByteStream),
}

impl fmt::Debug for InferenceOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(text) => f.debug_tuple("Sync").field(text).finish(),
            Self::Stream(_) => f.debug_tuple("Stream").field(&"<byte stream>").finish(),
        }
    }
}

impl InferenceOutput {
    /// The text of a synchronous reply.
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Sync(text) => Ok(text),
            Self::Stream(_) => Err(BackendError::UnknownBackendError(
                "expected a synchronous reply, got a stream".to_string(),
            )),
        }
    }

    /// The byte stream of a streaming reply.
    pub fn into_stream(self) -> Result<ByteStream> {
        match self {
            Self::Stream(stream) => Ok(stream),
            Self::Sync(_) => Err(BackendError::UnknownBackendError(
                "expected a stream, got a synchronous reply".to_string(),
            )),
        }
    }
}

/// A remote language-model endpoint.
///
/// Implementations classify failures into [`BackendError`] kinds and never
/// retry.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Generate a complete reply for `prompt`.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Open a streaming reply for `message` within `session_id`.
    ///
    /// Returns once the backend accepted the request; chunks are pulled
    /// lazily from the returned stream.
    async fn generate_stream(&self, message: &str, session_id: &str) -> Result<ByteStream>;

    /// Dispatch on the request mode.
    async fn invoke(&self, request: InferenceRequest) -> Result<InferenceOutput> {
        match request {
            InferenceRequest::Sync { prompt, params } => {
                self.generate(&prompt, &params).await.map(InferenceOutput::Sync)
            }
            InferenceRequest::Stream { message, session_id } => {
                self.generate_stream(&message, &session_id).await.map(InferenceOutput::Stream)
            }
        }
    }
}
