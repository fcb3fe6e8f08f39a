//! Query-time retrieval and one-time corpus ingestion.
//!
//! The [`Retriever`] composes an [`EmbeddingProvider`] and a
//! [`VectorStore`]: queries are embed → search, ingestion is
//! dedup → embed → add. Errors from either collaborator are returned as-is;
//! retrying is the caller's business.
//!
//! # Example
//!
//! ```rust,ignore
//! use relay_rag::{Retriever, InMemoryVectorStore, Embedder, HashingModelLoader};
//!
//! let retriever = Retriever::new(
//!     Arc::new(Embedder::new(Arc::new(HashingModelLoader::new(384)))),
//!     Arc::new(InMemoryVectorStore::new()),
//! );
//! retriever.ingest(&documents).await?;
//! let results = retriever.retrieve("What burgers do you have?", 3).await?;
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::DEFAULT_TOP_K;
use crate::document::{Document, EmbeddedDocument, RetrievalResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Outcome of [`Retriever::ingest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Documents newly embedded and stored.
    pub inserted: usize,
    /// Documents skipped because their content was already stored.
    pub skipped: usize,
}

/// Embeds queries and searches the vector store.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    default_k: usize,
}

impl Retriever {
    /// Create a retriever with the default top-k of 3.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store, default_k: DEFAULT_TOP_K }
    }

    /// Override the top-k used by [`retrieve_default`](Self::retrieve_default).
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.default_k = k;
        self
    }

    /// Return a reference to the vector store.
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Return the top-k used when none is given.
    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Retrieve the `k` documents most similar to `query`.
    ///
    /// # Errors
    ///
    /// [`RagError::InvalidTopK`] for `k == 0`; otherwise the first failing
    /// sub-call's error, unchanged. A query with nothing to embed (only
    /// punctuation or emoji, say) matches no documents.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::InvalidTopK);
        }
        let embedding = match self.embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(RagError::EmptyInput) => {
                debug!("query has no embeddable tokens, returning no documents");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let results = self.store.query(&embedding, k).await?;
        debug!(
            k,
            result_count = results.len(),
            top_score = results.first().map(|r| r.score),
            "retrieval completed"
        );
        Ok(results)
    }

    /// Retrieve with the configured default top-k.
    pub async fn retrieve_default(&self, query: &str) -> Result<RetrievalResult> {
        self.retrieve(query, self.default_k).await
    }

    /// Embed and store `documents`, skipping any already present.
    ///
    /// Safe to call on every startup: content already in the store is
    /// neither re-embedded nor duplicated.
    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestReport> {
        let mut fresh = Vec::with_capacity(documents.len());
        let mut skipped = 0;
        for document in documents {
            if self.store.contains(&document.content_hash()).await? {
                skipped += 1;
            } else {
                fresh.push(document);
            }
        }

        let texts: Vec<&str> = fresh.iter().map(|d| d.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        let embedded: Vec<EmbeddedDocument> = fresh
            .into_iter()
            .zip(embeddings)
            .map(|(doc, embedding)| EmbeddedDocument::new(doc.clone(), embedding))
            .collect();

        // the store dedups too, which catches repeats within this batch
        let inserted = self.store.add(&embedded).await?;
        skipped += embedded.len() - inserted;

        info!(inserted, skipped, "ingested documents");
        Ok(IngestReport { inserted, skipped })
    }
}
