//! Shared application state.

use std::sync::Arc;

use relay_model::{HttpInferenceClient, InferenceBackend};
use relay_rag::{
    Embedder, HASHING_MODEL_ID, HashingModelLoader, InMemoryVectorStore, ModelLoader,
    PromptAssembler, RagConfig, Retriever, load_menu,
};
use tracing::info;

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::session::RelaySession;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub session: RelaySession,
    /// Embedder behind the retriever, reported by `/health`.
    pub embedder: Option<Arc<Embedder>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").field("session", &self.session).finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(session: RelaySession) -> Self {
        Self { session, embedder: None }
    }

    pub fn with_embedder(mut self, embedder: Arc<Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Build the full pipeline and ingest the corpus.
    ///
    /// Runs once at startup, before the listener is bound, so the index is
    /// complete by the time the first request arrives.
    pub async fn from_config(config: &RelayConfig) -> RelayResult<Self> {
        let embedder = Arc::new(Embedder::new(model_loader(&config.rag)?));
        let store = Arc::new(InMemoryVectorStore::new());
        let retriever =
            Arc::new(Retriever::new(embedder.clone(), store).with_top_k(config.rag.top_k));

        let documents = load_menu(&config.corpus_path).await?;
        let report = retriever.ingest(&documents).await?;
        info!(
            corpus = %config.corpus_path.display(),
            inserted = report.inserted,
            skipped = report.skipped,
            model = embedder.model_id(),
            "corpus ingested"
        );

        let backend: Arc<dyn InferenceBackend> =
            Arc::new(HttpInferenceClient::new(config.inference.clone())?);

        let session = RelaySession::new(backend, config.persona.clone())
            .with_retriever(retriever)
            .with_assembler(PromptAssembler::new(config.rag.max_context_chars))
            .with_params(config.generation);

        Ok(Self::new(session).with_embedder(embedder))
    }
}

/// Pick the embedding model named by the config.
fn model_loader(rag: &RagConfig) -> RelayResult<Arc<dyn ModelLoader>> {
    if rag.embedding_model == HASHING_MODEL_ID {
        return Ok(Arc::new(HashingModelLoader::new(rag.embedding_dimensions)));
    }

    #[cfg(feature = "openai")]
    {
        let loader = relay_rag::OpenAiModelLoader::from_env(
            rag.embedding_model.clone(),
            rag.embedding_dimensions,
        )?;
        Ok(Arc::new(loader))
    }

    #[cfg(not(feature = "openai"))]
    {
        Err(RelayError::Config(format!(
            "embedding model '{}' needs the `openai` feature; use '{HASHING_MODEL_ID}' otherwise",
            rag.embedding_model
        )))
    }
}
