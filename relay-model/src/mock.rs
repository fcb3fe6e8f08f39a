//! Scripted in-process backend for tests and offline runs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use bytes::Bytes;

use crate::backend::{ByteStream, GenerationParams, InferenceBackend, InferenceRequest};
use crate::error::{BackendError, Result};

/// How a scripted stream ends after its chunks are exhausted.
#[derive(Debug, Clone)]
enum Ending {
    Finish,
    Fail(BackendError),
    Hang,
}

#[derive(Debug, Default)]
struct Probe {
    pulled: AtomicUsize,
    dropped: AtomicBool,
}

struct DropFlag(Arc<Probe>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.dropped.store(true, Ordering::SeqCst);
    }
}

/// Mock backend with scripted replies.
///
/// Streams yield the configured chunks in order, optionally spaced by a
/// delay, then finish, fail or hang. Every request is recorded.
///
/// # Example
///
/// ```rust,ignore
/// use relay_model::MockBackend;
///
/// let backend = MockBackend::new().with_chunks(["Hel", "lo"]);
/// ```
#[derive(Clone)]
pub struct MockBackend {
    chunks: Vec<Bytes>,
    chunk_delay: Option<Duration>,
    ending: Ending,
    open_error: Option<BackendError>,
    reply: std::result::Result<String, BackendError>,
    requests: Arc<Mutex<Vec<InferenceRequest>>>,
    probe: Arc<Probe>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            chunk_delay: None,
            ending: Ending::Finish,
            open_error: None,
            reply: Ok("Mock reply".to_string()),
            requests: Arc::new(Mutex::new(Vec::new())),
            probe: Arc::new(Probe::default()),
        }
    }

    /// Chunks yielded by every stream, in order.
    pub fn with_chunks<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chunks = chunks.into_iter().map(|c| Bytes::from(c.into())).collect();
        self
    }

    /// Sleep before each chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Yield `error` after the scripted chunks.
    pub fn fail_after_chunks(mut self, error: BackendError) -> Self {
        self.ending = Ending::Fail(error);
        self
    }

    /// Never finish after the scripted chunks.
    pub fn hang_after_chunks(mut self) -> Self {
        self.ending = Ending::Hang;
        self
    }

    /// Fail `generate_stream` before any chunk.
    pub fn fail_open(mut self, error: BackendError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Result of `generate`.
    pub fn with_reply(mut self, reply: std::result::Result<String, BackendError>) -> Self {
        self.reply = reply;
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Chunks pulled from streams so far.
    pub fn chunks_pulled(&self) -> usize {
        self.probe.pulled.load(Ordering::SeqCst)
    }

    /// Whether a stream handed out by this backend has been dropped.
    pub fn stream_dropped(&self) -> bool {
        self.probe.dropped.load(Ordering::SeqCst)
    }

    fn record(&self, request: InferenceRequest) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
    }
}

#[async_trait]
impl InferenceBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.record(InferenceRequest::Sync { prompt: prompt.to_string(), params: *params });
        self.reply.clone()
    }

    async fn generate_stream(&self, message: &str, session_id: &str) -> Result<ByteStream> {
        self.record(InferenceRequest::Stream {
            message: message.to_string(),
            session_id: session_id.to_string(),
        });
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }

        let chunks = self.chunks.clone();
        let delay = self.chunk_delay;
        let ending = self.ending.clone();
        let probe = self.probe.clone();
        let flag = DropFlag(probe.clone());
        Ok(Box::pin(stream! {
            let _flag = flag;
            for chunk in chunks {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                probe.pulled.fetch_add(1, Ordering::SeqCst);
                yield Ok(chunk);
            }
            match ending {
                Ending::Finish => {}
                Ending::Fail(err) => {
                    yield Err(err);
                }
                Ending::Hang => std::future::pending::<()>().await,
            }
        }))
    }
}
