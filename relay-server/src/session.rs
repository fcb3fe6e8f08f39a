//! One relay per inbound message: retrieve, assemble, forward, stream back.
//!
//! ```text
//! Idle -> Retrieving -> Assembling -> AwaitingBackend -> Streaming -> Complete
//!   \__________\____________\______________\________________\______> Errored
//! ```
//!
//! A failure before the first chunk surfaces as an `Err` the handler turns
//! into a JSON error response. After the first chunk the response is
//! committed, so a failure ends the stream with
//! [`ERROR_MARKER`](crate::error::ERROR_MARKER) and the user-safe message.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::{Context, Poll};

use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use relay_model::{ByteStream, GenerationParams, InferenceBackend};
use relay_rag::{Prompt, PromptAssembler, Retriever};
use tracing::{Instrument, Span, debug, error, info, info_span};
use uuid::Uuid;

use crate::error::{RelayError, RelayResult};

type ChunkStream = Pin<Box<dyn Stream<Item = Bytes> + Send>>;

/// Lifecycle of a single relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Retrieving,
    Assembling,
    AwaitingBackend,
    Streaming,
    Complete,
    Errored,
}

impl RelayState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RelayState::Complete | RelayState::Errored)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => RelayState::Idle,
            1 => RelayState::Retrieving,
            2 => RelayState::Assembling,
            3 => RelayState::AwaitingBackend,
            4 => RelayState::Streaming,
            5 => RelayState::Complete,
            _ => RelayState::Errored,
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayState::Idle => "idle",
            RelayState::Retrieving => "retrieving",
            RelayState::Assembling => "assembling",
            RelayState::AwaitingBackend => "awaiting_backend",
            RelayState::Streaming => "streaming",
            RelayState::Complete => "complete",
            RelayState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Shared, observable state of one relay.
#[derive(Debug, Clone)]
struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(RelayState::Idle as u8)))
    }

    fn get(&self) -> RelayState {
        RelayState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: RelayState) {
        debug!(%state, "relay state");
        self.0.store(state as u8, Ordering::Release);
    }

    fn fail(&self, err: impl Into<RelayError>) -> RelayError {
        let err = err.into();
        error!(kind = err.kind(), error = %err, state = %self.get(), "relay errored");
        self.set(RelayState::Errored);
        err
    }
}

/// Response bytes of a relay that reached `Streaming`.
///
/// Yields the backend's chunks unchanged and in order. Dropping it drops the
/// backend stream, so no further chunks are pulled after a disconnect.
pub struct RelayStream {
    inner: ChunkStream,
    state: StateCell,
}

impl RelayStream {
    /// Current state of the relay behind this stream.
    pub fn state(&self) -> RelayState {
        self.state.get()
    }
}

impl fmt::Debug for RelayStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayStream").field("state", &self.state()).finish_non_exhaustive()
    }
}

impl Stream for RelayStream {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Relay pipeline shared by every request.
///
/// Cheap to clone; every call to [`relay`](Self::relay) or
/// [`complete`](Self::complete) runs its own state machine.
#[derive(Clone)]
pub struct RelaySession {
    retriever: Option<Arc<Retriever>>,
    assembler: PromptAssembler,
    persona: Arc<str>,
    backend: Arc<dyn InferenceBackend>,
    params: GenerationParams,
}

impl fmt::Debug for RelaySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelaySession")
            .field("backend", &self.backend.name())
            .field("retriever", &self.retriever.is_some())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl RelaySession {
    /// A session without retrieval: prompts carry the empty-context fallback.
    pub fn new(backend: Arc<dyn InferenceBackend>, persona: impl Into<String>) -> Self {
        Self {
            retriever: None,
            assembler: PromptAssembler::default(),
            persona: Arc::from(persona.into()),
            backend,
            params: GenerationParams::default(),
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn retriever(&self) -> Option<&Arc<Retriever>> {
        self.retriever.as_ref()
    }

    pub fn backend(&self) -> &Arc<dyn InferenceBackend> {
        &self.backend
    }

    /// Stream a reply to `message`.
    ///
    /// Returns once the first chunk has arrived; everything before that
    /// point fails with an `Err`. An empty backend stream completes with an
    /// empty [`RelayStream`].
    pub async fn relay(&self, message: &str, session_id: &str) -> RelayResult<RelayStream> {
        let relay_id = Uuid::new_v4();
        let span = info_span!("relay", %relay_id, session_id);
        let state = StateCell::new();

        let opened = self.open(message, session_id, &state).instrument(span.clone()).await?;
        let inner: ChunkStream = match opened {
            Some((first, upstream)) => relay_chunks(first, upstream, state.clone(), span),
            None => Box::pin(futures::stream::empty()),
        };
        Ok(RelayStream { inner, state })
    }

    /// Generate a complete reply to `message` in one response.
    pub async fn complete(&self, message: &str, session_id: &str) -> RelayResult<String> {
        let relay_id = Uuid::new_v4();
        let span = info_span!("relay", %relay_id, session_id, mode = "sync");
        let state = StateCell::new();

        self.generate(message, &state).instrument(span).await
    }

    /// Everything up to and including the first chunk.
    async fn open(
        &self,
        message: &str,
        session_id: &str,
        state: &StateCell,
    ) -> RelayResult<Option<(Bytes, ByteStream)>> {
        let prompt = self.prepare(message, state).await?;

        state.set(RelayState::AwaitingBackend);
        let mut upstream = self
            .backend
            .generate_stream(prompt.as_str(), session_id)
            .await
            .map_err(|e| state.fail(e))?;

        match upstream.next().await {
            Some(Ok(first)) => {
                state.set(RelayState::Streaming);
                info!(backend = self.backend.name(), "streaming reply");
                Ok(Some((first, upstream)))
            }
            Some(Err(e)) => Err(state.fail(e)),
            None => {
                state.set(RelayState::Complete);
                info!(chunks = 0, bytes = 0, "relay complete");
                Ok(None)
            }
        }
    }

    async fn generate(&self, message: &str, state: &StateCell) -> RelayResult<String> {
        let prompt = self.prepare(message, state).await?;

        state.set(RelayState::AwaitingBackend);
        let reply = self
            .backend
            .generate(prompt.as_str(), &self.params)
            .await
            .map_err(|e| state.fail(e))?;

        state.set(RelayState::Complete);
        info!(reply_len = reply.len(), "relay complete");
        Ok(reply)
    }

    /// `Idle -> Retrieving -> Assembling`, returning the prompt to dispatch.
    async fn prepare(&self, message: &str, state: &StateCell) -> RelayResult<Prompt> {
        state.set(RelayState::Retrieving);
        let retrieved = match &self.retriever {
            Some(retriever) => {
                retriever.retrieve_default(message).await.map_err(|e| state.fail(e))?
            }
            None => Vec::new(),
        };
        debug!(documents = retrieved.len(), "retrieved context");

        state.set(RelayState::Assembling);
        let prompt = self.assembler.assemble(&self.persona, &retrieved, message);
        debug!(prompt_len = prompt.as_str().len(), "assembled prompt");
        Ok(prompt)
    }
}

/// `Streaming -> Complete | Errored` over the rest of the backend stream.
fn relay_chunks(
    first: Bytes,
    mut upstream: ByteStream,
    state: StateCell,
    span: Span,
) -> ChunkStream {
    Box::pin(stream! {
        let mut chunks = 1usize;
        let mut bytes = first.len();
        yield first;

        let mut failure = None;
        while let Some(next) = upstream.next().await {
            match next {
                Ok(chunk) => {
                    chunks += 1;
                    bytes += chunk.len();
                    yield chunk;
                }
                Err(e) => {
                    failure = Some(RelayError::from(e));
                    break;
                }
            }
        }

        match failure {
            Some(err) => {
                span.in_scope(|| {
                    error!(kind = err.kind(), error = %err, chunks, bytes, "backend stream failed mid-relay");
                    state.set(RelayState::Errored);
                });
                yield Bytes::from(err.in_band_marker());
            }
            None => span.in_scope(|| {
                state.set(RelayState::Complete);
                info!(chunks, bytes, "relay complete");
            }),
        }
    })
}
