//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] keeps documents in insertion order behind a
//! `tokio::sync::RwLock`, with a hash set of content digests for
//! deduplication. Queries are a brute-force scan, which is fine for the
//! small corpora this relay serves.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{EmbeddedDocument, RetrievalResult, ScoredDocument};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

#[derive(Debug, Default)]
struct Inner {
    documents: Vec<EmbeddedDocument>,
    hashes: HashSet<String>,
    dimensions: Option<usize>,
}

/// An in-memory vector store using cosine similarity for search.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    inner: RwLock<Inner>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, documents: &[EmbeddedDocument]) -> Result<usize> {
        let Some(first) = documents.first() else {
            return Ok(0);
        };
        let mut inner = self.inner.write().await;

        // validate the whole batch before touching the store
        let expected = inner.dimensions.unwrap_or(first.embedding.len());
        if let Some(bad) = documents.iter().find(|d| d.embedding.len() != expected) {
            return Err(RagError::DimensionMismatch { expected, actual: bad.embedding.len() });
        }
        inner.dimensions = Some(expected);

        let mut inserted = 0;
        for doc in documents {
            if !inner.hashes.insert(doc.content_hash.clone()) {
                debug!(content_hash = %doc.content_hash, "skipping duplicate document");
                continue;
            }
            inner.documents.push(doc.clone());
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn contains(&self, content_hash: &str) -> Result<bool> {
        Ok(self.inner.read().await.hashes.contains(content_hash))
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::InvalidTopK);
        }
        let inner = self.inner.read().await;
        if let Some(expected) = inner.dimensions {
            if expected != embedding.len() {
                return Err(RagError::DimensionMismatch { expected, actual: embedding.len() });
            }
        }

        let mut scored: Vec<ScoredDocument> = inner
            .documents
            .iter()
            .map(|doc| ScoredDocument {
                document: doc.document.clone(),
                score: cosine_similarity(&doc.embedding, embedding),
            })
            .collect();

        // stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.read().await.documents.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn doc(text: &str, embedding: Vec<f32>) -> EmbeddedDocument {
        EmbeddedDocument::new(Document::new(text), embedding)
    }

    #[tokio::test]
    async fn duplicate_content_is_not_inserted_twice() {
        let store = InMemoryVectorStore::new();
        let docs = vec![doc("a", vec![1.0, 0.0]), doc("b", vec![0.0, 1.0])];
        assert_eq!(store.add(&docs).await.unwrap(), 2);
        assert_eq!(store.add(&docs).await.unwrap(), 0);
        assert_eq!(store.len().await.unwrap(), 2);
        assert!(store.contains(&Document::new("a").content_hash()).await.unwrap());
    }

    #[tokio::test]
    async fn query_with_zero_k_is_rejected() {
        let store = InMemoryVectorStore::new();
        assert!(matches!(store.query(&[1.0], 0).await, Err(RagError::InvalidTopK)));
    }

    #[tokio::test]
    async fn query_ranks_by_similarity() {
        let store = InMemoryVectorStore::new();
        store
            .add(&[doc("x", vec![1.0, 0.0]), doc("y", vec![0.0, 1.0]), doc("xy", vec![0.7, 0.7])])
            .await
            .unwrap();
        let results = store.query(&[1.0, 0.0], 2).await.unwrap();
        let texts: Vec<_> = results.iter().map(|r| r.document.content.as_str()).collect();
        assert_eq!(texts, vec!["x", "xy"]);
    }

    #[tokio::test]
    async fn mismatched_dimensions_are_rejected() {
        let store = InMemoryVectorStore::new();
        store.add(&[doc("x", vec![1.0, 0.0])]).await.unwrap();
        let err = store.add(&[doc("y", vec![1.0, 0.0, 0.0])]).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 3 }));
        assert!(store.query(&[1.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn rejected_batch_leaves_store_untouched() {
        let store = InMemoryVectorStore::new();
        let err = store
            .add(&[doc("a", vec![1.0, 0.0]), doc("b", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 3 }));
        assert_eq!(store.len().await.unwrap(), 0);
        assert!(!store.contains(&Document::new("a").content_hash()).await.unwrap());

        // the failed batch did not pin the dimension
        assert_eq!(store.add(&[doc("c", vec![1.0, 0.0, 0.0])]).await.unwrap(), 1);
    }
}
