//! Vector store trait for storing and searching document embeddings.

use async_trait::async_trait;

use crate::document::{EmbeddedDocument, RetrievalResult};
use crate::error::Result;

/// A storage backend for document embeddings with similarity search.
///
/// Implementations must deduplicate by [`EmbeddedDocument::content_hash`]:
/// adding a document whose content is already stored is a no-op, so a
/// corpus can be re-ingested on every startup.
///
/// # Example
///
/// ```rust,ignore
/// use relay_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.add(&documents).await?;
/// let results = store.query(&query_embedding, 3).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Add documents, skipping any whose content hash is already present.
    ///
    /// Returns the number of documents actually inserted.
    async fn add(&self, documents: &[EmbeddedDocument]) -> Result<usize>;

    /// Whether a document with this content hash is stored.
    async fn contains(&self, content_hash: &str) -> Result<bool>;

    /// Return the `k` documents most similar to `embedding`, by descending
    /// score. Returns every document when fewer than `k` are stored.
    ///
    /// Fails with [`RagError::InvalidTopK`](crate::RagError::InvalidTopK)
    /// when `k == 0`.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<RetrievalResult>;

    /// Number of stored documents.
    async fn len(&self) -> Result<usize>;

    /// Whether the store holds no documents.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}
