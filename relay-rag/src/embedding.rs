//! Embedding providers and the lazily loaded [`Embedder`].
//!
//! An [`EmbeddingModel`] is the opaque model: it turns text into one vector
//! per token. The [`Embedder`] owns a [`ModelLoader`], loads the model on
//! first use (single-flight: concurrent first callers share one load), and
//! turns token vectors into a sentence embedding by mean pooling followed by
//! L2 normalisation, so that a dot product equals cosine similarity.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// An opaque, loaded embedding model producing per-token vectors.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Length of every vector this model returns.
    fn dimensions(&self) -> usize;

    /// Embed `text`, returning one vector per token.
    async fn token_embeddings(&self, text: &str) -> Result<Vec<Vec<f32>>>;
}

/// Loads an [`EmbeddingModel`]. Called at most once per successful load.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Identifier of the model this loader produces.
    fn model_id(&self) -> &str;

    /// Dimensionality of the model, known before loading.
    fn dimensions(&self) -> usize;

    /// Load the model. May be slow (downloads, weight loading).
    async fn load(&self) -> Result<Arc<dyn EmbeddingModel>>;
}

/// Observable load state of an [`Embedder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    NotLoaded,
    Loading,
    Loaded,
}

const NOT_LOADED: u8 = 0;
const LOADING: u8 = 1;
const LOADED: u8 = 2;

/// Lazily loaded sentence embedder.
///
/// The underlying model is loaded by the first call to
/// [`embed`](EmbeddingProvider::embed); callers that arrive while the load
/// is in flight wait for it instead of starting their own. A failed load is
/// not cached, so a later call retries.
///
/// # Example
///
/// ```rust,ignore
/// use relay_rag::{Embedder, EmbeddingProvider, HashingModelLoader};
///
/// let embedder = Embedder::new(Arc::new(HashingModelLoader::new(384)));
/// let v = embedder.embed("cheese burger").await?;
/// assert_eq!(v.len(), 384);
/// ```
pub struct Embedder {
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn EmbeddingModel>>,
    state: AtomicU8,
}

impl Embedder {
    /// Create an embedder that will load its model through `loader`.
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self { loader, model: OnceCell::new(), state: AtomicU8::new(NOT_LOADED) }
    }

    /// Identifier of the wrapped model.
    pub fn model_id(&self) -> &str {
        self.loader.model_id()
    }

    /// Current load state.
    pub fn state(&self) -> ModelState {
        match self.state.load(Ordering::Acquire) {
            LOADED => ModelState::Loaded,
            LOADING => ModelState::Loading,
            _ => ModelState::NotLoaded,
        }
    }

    /// Load the model now instead of on first use.
    pub async fn warm_up(&self) -> Result<()> {
        self.model().await.map(|_| ())
    }

    async fn model(&self) -> Result<&Arc<dyn EmbeddingModel>> {
        self.model
            .get_or_try_init(|| async {
                self.state.store(LOADING, Ordering::Release);
                info!(model = self.loader.model_id(), "loading embedding model");
                match self.loader.load().await {
                    Ok(model) => {
                        self.state.store(LOADED, Ordering::Release);
                        info!(model = self.loader.model_id(), "embedding model loaded");
                        Ok(model)
                    }
                    Err(e) => {
                        self.state.store(NOT_LOADED, Ordering::Release);
                        warn!(model = self.loader.model_id(), error = %e, "embedding model failed to load");
                        Err(e)
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl EmbeddingProvider for Embedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model().await?;
        let tokens = model.token_embeddings(text).await?;
        debug!(model = self.model_id(), token_count = tokens.len(), "pooling token embeddings");
        let mut pooled = mean_pool(&tokens, model.dimensions()).ok_or(RagError::EmptyInput)?;
        l2_normalize(&mut pooled);
        Ok(pooled)
    }

    fn dimensions(&self) -> usize {
        self.loader.dimensions()
    }
}

/// Average token vectors component-wise. `None` when there are no tokens.
///
/// Rows whose length differs from `dimensions` are skipped.
pub fn mean_pool(tokens: &[Vec<f32>], dimensions: usize) -> Option<Vec<f32>> {
    let mut sum = vec![0.0f32; dimensions];
    let mut count = 0usize;
    for row in tokens.iter().filter(|row| row.len() == dimensions) {
        for (acc, v) in sum.iter_mut().zip(row) {
            *acc += v;
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let n = count as f32;
    sum.iter_mut().for_each(|x| *x /= n);
    Some(sum)
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

// ── Hashing model ───────────────────────────────────────────────────

/// Model id reported by [`HashingModelLoader`].
pub const HASHING_MODEL_ID: &str = "hashing";

/// A deterministic bag-of-words model using signed feature hashing.
///
/// Each token maps to a signed one-hot vector, so after mean pooling two
/// texts are similar exactly when they share (normalised) tokens. Needs no
/// weights, which makes it the default for local runs and tests.
#[derive(Debug, Clone)]
pub struct HashingModel {
    dimensions: usize,
}

impl HashingModel {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn token_vector(&self, token: &str) -> Vec<f32> {
        let digest = Sha256::digest(token.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let h = u64::from_le_bytes(bytes);
        let mut v = vec![0.0f32; self.dimensions];
        let index = (h % self.dimensions as u64) as usize;
        v[index] = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        v
    }
}

/// Split text into lowercase alphanumeric tokens with a light plural fold
/// (`burgers` → `burger`).
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| {
            let lower = t.to_lowercase();
            if lower.len() > 3 && lower.ends_with('s') && !lower.ends_with("ss") {
                lower[..lower.len() - 1].to_string()
            } else {
                lower
            }
        })
        .collect()
}

#[async_trait]
impl EmbeddingModel for HashingModel {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn token_embeddings(&self, text: &str) -> Result<Vec<Vec<f32>>> {
        Ok(tokenize(text).iter().map(|t| self.token_vector(t)).collect())
    }
}

/// [`ModelLoader`] for [`HashingModel`].
#[derive(Debug, Clone)]
pub struct HashingModelLoader {
    dimensions: usize,
}

impl HashingModelLoader {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl ModelLoader for HashingModelLoader {
    fn model_id(&self) -> &str {
        HASHING_MODEL_ID
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn load(&self) -> Result<Arc<dyn EmbeddingModel>> {
        if self.dimensions == 0 {
            return Err(RagError::embedding(HASHING_MODEL_ID, "dimensions must be greater than zero"));
        }
        Ok(Arc::new(HashingModel::new(self.dimensions)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_pool_averages_rows() {
        let pooled = mean_pool(&[vec![1.0, 0.0], vec![0.0, 1.0]], 2).unwrap();
        assert_eq!(pooled, vec![0.5, 0.5]);
    }

    #[test]
    fn mean_pool_of_nothing_is_none() {
        assert!(mean_pool(&[], 4).is_none());
    }

    #[test]
    fn l2_normalize_produces_unit_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn tokenize_folds_plurals_and_case() {
        assert_eq!(tokenize("What Burgers do you have?"), vec!["what", "burger", "do", "you", "have"]);
        assert_eq!(tokenize("glass"), vec!["glass"]);
    }

    #[tokio::test]
    async fn embedder_output_is_unit_norm() {
        let embedder = Embedder::new(Arc::new(HashingModelLoader::new(64)));
        assert_eq!(embedder.state(), ModelState::NotLoaded);
        let v = embedder.embed("double cheese burger").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert_eq!(v.len(), 64);
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(embedder.state(), ModelState::Loaded);
    }

    #[tokio::test]
    async fn text_without_tokens_is_empty_input() {
        let embedder = Embedder::new(Arc::new(HashingModelLoader::new(8)));
        let err = embedder.embed("  ?! 🍔").await.unwrap_err();
        assert!(matches!(err, RagError::EmptyInput));
        assert_eq!(embedder.state(), ModelState::Loaded);
    }

    #[tokio::test]
    async fn failed_load_is_retried() {
        let embedder = Embedder::new(Arc::new(HashingModelLoader::new(0)));
        assert!(matches!(embedder.embed("x").await, Err(RagError::EmbeddingUnavailable { .. })));
        assert_eq!(embedder.state(), ModelState::NotLoaded);
    }
}
