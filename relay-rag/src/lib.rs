//! # relay-rag
//!
//! Retrieval half of the chat relay: embed text, search a small document
//! index, and assemble a bounded prompt from what was found.
//!
//! ## Overview
//!
//! - [`Embedder`] - lazily loaded sentence embedder (mean pooling + L2
//!   normalisation over an opaque [`EmbeddingModel`])
//! - [`VectorStore`] / [`InMemoryVectorStore`] - cosine k-NN with
//!   content-hash deduplication
//! - [`Retriever`] - embed → search, plus idempotent one-time ingestion
//! - [`PromptAssembler`] - persona + knowledge + instructions + message
//! - [`load_menu`] - the menu corpus shipped with the relay
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use relay_rag::*;
//!
//! let embedder = Arc::new(Embedder::new(Arc::new(HashingModelLoader::new(384))));
//! let retriever = Retriever::new(embedder, Arc::new(InMemoryVectorStore::new()));
//! retriever.ingest(&load_menu("data/menu.json").await?).await?;
//!
//! let found = retriever.retrieve("What burgers do you have?", 3).await?;
//! let prompt = PromptAssembler::new(Some(4000)).assemble(persona, &found, message);
//! ```

pub mod config;
pub mod corpus;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod prompt;
pub mod retriever;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;

pub use config::{RagConfig, RagConfigBuilder};
pub use corpus::{MenuItem, load_menu, parse_menu};
pub use document::{Document, EmbeddedDocument, RetrievalResult, ScoredDocument};
pub use embedding::{
    Embedder, EmbeddingModel, EmbeddingProvider, HASHING_MODEL_ID, HashingModel,
    HashingModelLoader, ModelLoader, ModelState,
};
pub use error::{RagError, Result};
pub use inmemory::InMemoryVectorStore;
pub use prompt::{Prompt, PromptAssembler};
pub use retriever::{IngestReport, Retriever};
pub use vectorstore::VectorStore;

#[cfg(feature = "openai")]
pub use openai::{OpenAiEmbeddingModel, OpenAiModelLoader};
