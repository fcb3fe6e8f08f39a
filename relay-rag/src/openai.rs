//! Remote embedding model served by an OpenAI-compatible `/embeddings` API.
//!
//! This module is only available when the `openai` feature is enabled. The
//! API returns one pooled vector per input, which the [`Embedder`] treats as
//! a single "token" row, so pooling and normalisation stay uniform across
//! models.
//!
//! [`Embedder`]: crate::Embedder

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::{EmbeddingModel, ModelLoader};
use crate::error::{RagError, Result};

/// The default OpenAI API base.
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Bound on a single embeddings request.
pub const DEFAULT_EMBEDDING_TIMEOUT: Duration = Duration::from_secs(30);

/// Loads an [`OpenAiEmbeddingModel`].
///
/// # Configuration
///
/// - `model` – e.g. `text-embedding-3-small`.
/// - `dimensions` – Matryoshka dimension passed to the API.
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment variable.
/// - `base_url` – defaults to the public OpenAI API; any compatible server works.
/// - `timeout` – bound on each embeddings request, 30 s by default.
#[derive(Debug, Clone)]
pub struct OpenAiModelLoader {
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    timeout: Duration,
}

impl OpenAiModelLoader {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENAI_API_BASE.to_string(),
            model: model.into(),
            dimensions,
            timeout: DEFAULT_EMBEDDING_TIMEOUT,
        }
    }

    /// Create a loader using the `OPENAI_API_KEY` environment variable.
    pub fn from_env(model: impl Into<String>, dimensions: usize) -> Result<Self> {
        let model = model.into();
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::embedding(&model, "OPENAI_API_KEY environment variable not set")
        })?;
        Ok(Self::new(api_key, model, dimensions))
    }

    /// Point at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ModelLoader for OpenAiModelLoader {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn load(&self) -> Result<Arc<dyn EmbeddingModel>> {
        if self.api_key.is_empty() {
            return Err(RagError::embedding(&self.model, "API key must not be empty"));
        }
        let client = reqwest::Client::builder().timeout(self.timeout).build().map_err(|e| {
            RagError::embedding(&self.model, format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Arc::new(OpenAiEmbeddingModel {
            client,
            endpoint: format!("{}/embeddings", self.base_url.trim_end_matches('/')),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            dimensions: self.dimensions,
        }))
    }
}

/// An [`EmbeddingModel`] backed by the OpenAI embeddings API.
pub struct OpenAiEmbeddingModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl EmbeddingModel for OpenAiEmbeddingModel {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn token_embeddings(&self, text: &str) -> Result<Vec<Vec<f32>>> {
        debug!(model = %self.model, text_len = text.len(), "requesting remote embedding");

        let request_body =
            EmbeddingRequest { model: &self.model, input: vec![text], dimensions: self.dimensions };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(model = %self.model, error = %e, "embedding request failed");
                RagError::embedding(&self.model, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(model = %self.model, %status, "embedding API error");
            return Err(RagError::embedding(&self.model, format!("API returned {status}: {detail}")));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(model = %self.model, error = %e, "failed to parse embedding response");
            RagError::embedding(&self.model, format!("failed to parse response: {e}"))
        })?;

        if parsed.data.is_empty() {
            return Err(RagError::embedding(&self.model, "response carried no embeddings"));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}
