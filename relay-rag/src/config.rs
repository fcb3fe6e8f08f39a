//! Configuration for retrieval and prompt assembly.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default number of documents retrieved per query.
pub const DEFAULT_TOP_K: usize = 3;

/// Default cap on the joined context, in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 4000;

/// Default embedding dimensionality (matches all-MiniLM-L6-v2).
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Configuration parameters for retrieval and prompt assembly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Identifier of the embedding model to load.
    pub embedding_model: String,
    /// Dimensionality of the embedding model.
    pub embedding_dimensions: usize,
    /// Number of documents retrieved when the caller does not pass `k`.
    pub top_k: usize,
    /// Maximum length of the joined context in characters; `None` disables the cap.
    pub max_context_chars: Option<usize>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding_model: crate::embedding::HASHING_MODEL_ID.to_string(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            top_k: DEFAULT_TOP_K,
            max_context_chars: Some(DEFAULT_MAX_CONTEXT_CHARS),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the embedding dimensionality.
    pub fn embedding_dimensions(mut self, dimensions: usize) -> Self {
        self.config.embedding_dimensions = dimensions;
        self
    }

    /// Set the default number of retrieved documents.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the context cap; `None` disables it.
    pub fn max_context_chars(mut self, max: Option<usize>) -> Self {
        self.config.max_context_chars = max;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `top_k == 0`
    /// - `embedding_dimensions == 0`
    /// - `embedding_model` is blank
    /// - `max_context_chars == Some(0)`
    pub fn build(self) -> Result<RagConfig> {
        if self.config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.config.embedding_dimensions == 0 {
            return Err(RagError::ConfigError(
                "embedding_dimensions must be greater than zero".to_string(),
            ));
        }
        if self.config.embedding_model.trim().is_empty() {
            return Err(RagError::ConfigError("embedding_model must not be empty".to_string()));
        }
        if self.config.max_context_chars == Some(0) {
            return Err(RagError::ConfigError(
                "max_context_chars must be greater than zero when set".to_string(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.embedding_model, "hashing");
    }

    #[test]
    fn zero_top_k_is_rejected() {
        assert!(matches!(RagConfig::builder().top_k(0).build(), Err(RagError::ConfigError(_))));
    }

    #[test]
    fn zero_context_cap_is_rejected() {
        let err = RagConfig::builder().max_context_chars(Some(0)).build().unwrap_err();
        assert!(err.to_string().contains("max_context_chars"));
    }
}
