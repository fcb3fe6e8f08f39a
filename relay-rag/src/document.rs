//! Data types for documents, embedded documents and retrieval results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A source document: text content plus string metadata.
///
/// Documents are immutable once ingested. Their identity inside an index is
/// the SHA-256 digest of [`content`](Document::content), so re-ingesting the
/// same text is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The text content of the document.
    pub content: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), metadata: HashMap::new() }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Lowercase hex SHA-256 of the document content.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A [`Document`] paired with its embedding, ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedDocument {
    /// The source document.
    pub document: Document,
    /// Unit-norm embedding of the document content.
    pub embedding: Vec<f32>,
    /// Cached [`Document::content_hash`].
    pub content_hash: String,
}

impl EmbeddedDocument {
    /// Pair a document with its embedding, computing the content hash.
    pub fn new(document: Document, embedding: Vec<f32>) -> Self {
        let content_hash = document.content_hash();
        Self { document, embedding, content_hash }
    }
}

/// A retrieved [`Document`] paired with a similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// The retrieved document.
    pub document: Document,
    /// Cosine similarity with the query (higher is more relevant).
    pub score: f32,
}

/// Ranked retrieval output: at most `k` entries, descending score.
pub type RetrievalResult = Vec<ScoredDocument>;
