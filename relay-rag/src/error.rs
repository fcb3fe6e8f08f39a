//! Error types for the `relay-rag` crate.

use thiserror::Error;

/// Errors that can occur while embedding, indexing or retrieving documents.
#[derive(Debug, Error)]
pub enum RagError {
    /// The embedding model could not be loaded or failed to produce a vector.
    #[error("Embedding unavailable ({model}): {message}")]
    EmbeddingUnavailable {
        /// Identifier of the embedding model.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector index backend failed.
    #[error("Index unavailable ({backend}): {message}")]
    IndexUnavailable {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector of the wrong length was handed to the index.
    #[error("Dimension mismatch: index holds {expected}-d vectors, got {actual}")]
    DimensionMismatch {
        /// Dimension of vectors already stored in the index.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// The text held nothing the model could embed.
    #[error("Nothing to embed: text has no tokens")]
    EmptyInput,

    /// `k` must be a positive integer.
    #[error("top_k must be greater than zero")]
    InvalidTopK,

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The document corpus could not be read or parsed.
    #[error("Corpus error: {0}")]
    CorpusError(String),
}

impl RagError {
    pub(crate) fn embedding(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable { model: model.into(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
