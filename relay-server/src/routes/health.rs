use axum::Json;
use axum::extract::State;
use relay_rag::ModelState;
use serde::{Deserialize, Serialize};

use crate::error::RelayResult;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Documents in the index.
    pub documents: usize,
    /// `not_loaded`, `loading`, `loaded`, or `disabled` without retrieval.
    pub embedder: String,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> RelayResult<Json<HealthResponse>> {
    let documents = match state.session.retriever() {
        Some(retriever) => retriever.store().len().await?,
        None => 0,
    };
    let embedder = match &state.embedder {
        Some(embedder) => match embedder.state() {
            ModelState::NotLoaded => "not_loaded",
            ModelState::Loading => "loading",
            ModelState::Loaded => "loaded",
        },
        None => "disabled",
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        documents,
        embedder: embedder.to_string(),
    }))
}
