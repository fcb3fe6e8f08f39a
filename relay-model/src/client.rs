//! HTTP inference client.
//!
//! Talks to the backend with two JSON requests:
//!
//! - stream: `POST {stream_url}` with `{ message, session_id }`, response body
//!   relayed as raw bytes
//! - sync: `POST {generate_url}` with `{ prompt, max_tokens, temperature }`,
//!   response `{ reply }` or `{ text }`

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

use crate::backend::{ByteStream, GenerationParams, InferenceBackend};
use crate::config::InferenceConfig;
use crate::error::{BackendError, Result};

/// Detail used when a 4xx response carries no `detail` field.
pub const GENERIC_DETAIL: &str = "Unknown error";

/// [`InferenceBackend`] over HTTP using `reqwest`.
///
/// # Example
///
/// ```rust,ignore
/// use relay_model::{HttpInferenceClient, InferenceBackend, InferenceConfig};
///
/// let client = HttpInferenceClient::new(InferenceConfig::default())?;
/// let mut stream = client.generate_stream("Any burgers?", "session-123").await?;
/// while let Some(chunk) = stream.next().await { /* ... */ }
/// ```
#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    client: reqwest::Client,
    config: InferenceConfig,
}

impl HttpInferenceClient {
    /// Create a client. The connect timeout is `config.request_timeout`.
    pub fn new(config: InferenceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::ConfigError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Return a reference to the client configuration.
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }
}

// ── Backend wire types ─────────────────────────────────────────────

#[derive(Serialize)]
struct StreamPayload<'a> {
    message: &'a str,
    session_id: &'a str,
}

#[derive(Serialize)]
struct GeneratePayload<'a> {
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateReply {
    reply: Option<String>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<Value>,
}

// ── Classification ─────────────────────────────────────────────────

/// Map a transport-level failure to a [`BackendError`].
pub fn classify_transport(e: &reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::BackendTimeout(e.to_string())
    } else if e.is_connect() {
        BackendError::BackendUnreachable(e.to_string())
    } else {
        BackendError::UnknownBackendError(e.to_string())
    }
}

/// Pull the `detail` field out of an error body.
///
/// String details are returned as-is; structured details (e.g. validation
/// error lists) are rendered as compact JSON.
pub fn extract_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Map a non-success status on a stream request to a [`BackendError`].
pub fn classify_stream_status(status: StatusCode, body: &str) -> BackendError {
    if status.is_server_error() {
        BackendError::BackendInternalError { status: status.as_u16() }
    } else if status.is_client_error() {
        BackendError::InvalidRequest {
            status: status.as_u16(),
            detail: extract_detail(body).unwrap_or_else(|| GENERIC_DETAIL.to_string()),
        }
    } else {
        BackendError::UnknownBackendError(format!("unexpected status {status}"))
    }
}

/// Wrap a body stream so the first chunk must arrive before `first_byte`
/// and, when `idle` is set, each later chunk within `idle` of the previous.
fn timed_stream<S>(inner: S, first_byte: Instant, idle: Option<Duration>) -> ByteStream
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    Box::pin(stream! {
        let mut inner = Box::pin(inner);
        let mut first_byte = Some(first_byte);
        loop {
            let next = match (first_byte, idle) {
                (Some(deadline), _) => match timeout_at(deadline, inner.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        yield Err(BackendError::BackendTimeout(
                            "backend sent no data before the request deadline".to_string(),
                        ));
                        break;
                    }
                },
                (None, Some(wait)) => match timeout(wait, inner.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        yield Err(BackendError::BackendTimeout(format!(
                            "no data from backend for {wait:?}"
                        )));
                        break;
                    }
                },
                (None, None) => inner.next().await,
            };
            match next {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => {
                    first_byte = None;
                    yield Ok(chunk);
                }
                Some(Err(e)) => {
                    yield Err(classify_transport(&e));
                    break;
                }
                None => break,
            }
        }
    })
}

#[async_trait]
impl InferenceBackend for HttpInferenceClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let url = self.config.generate_url();
        debug!(%url, prompt_len = prompt.len(), max_tokens = params.max_tokens, "sync generation");

        let payload = GeneratePayload {
            prompt,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };
        let response = self
            .client
            .post(&url)
            .timeout(self.config.request_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                let err = classify_transport(&e);
                warn!(%url, error = %err, "sync generation request failed");
                err
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = extract_detail(&body).unwrap_or_else(|| {
                status.canonical_reason().unwrap_or(GENERIC_DETAIL).to_string()
            });
            warn!(%url, %status, "backend rejected sync generation");
            return Err(BackendError::InferenceError { status: status.as_u16(), detail });
        }

        let reply: GenerateReply = response.json().await.map_err(|e| classify_transport(&e))?;
        reply.reply.or(reply.text).ok_or_else(|| {
            BackendError::UnknownBackendError("reply has neither 'reply' nor 'text'".to_string())
        })
    }

    async fn generate_stream(&self, message: &str, session_id: &str) -> Result<ByteStream> {
        let url = self.config.stream_url();
        let limit = self.config.request_timeout;
        // one deadline covers connect, headers and the first body byte
        let deadline = Instant::now() + limit;
        debug!(%url, session_id, message_len = message.len(), "opening backend stream");

        let send = self.client.post(&url).json(&StreamPayload { message, session_id }).send();
        let response = match timeout_at(deadline, send).await {
            Err(_) => {
                warn!(%url, timeout = ?limit, "backend did not respond in time");
                return Err(BackendError::BackendTimeout(format!(
                    "no response from backend within {limit:?}"
                )));
            }
            Ok(Err(e)) => {
                let err = classify_transport(&e);
                warn!(%url, error = %err, "backend stream request failed");
                return Err(err);
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            let body = timeout_at(deadline, response.text())
                .await
                .ok()
                .and_then(|r| r.ok())
                .unwrap_or_default();
            let err = classify_stream_status(status, &body);
            warn!(%url, %status, error = %err, "backend rejected stream request");
            return Err(err);
        }

        info!(%url, %status, session_id, "backend stream opened");
        Ok(timed_stream(response.bytes_stream(), deadline, self.config.stream_idle_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string_is_extracted() {
        assert_eq!(extract_detail(r#"{"detail":"bad field"}"#).as_deref(), Some("bad field"));
    }

    #[test]
    fn structured_detail_is_rendered_as_json() {
        let detail = extract_detail(r#"{"detail":[{"loc":["body","message"]}]}"#).unwrap();
        assert_eq!(detail, r#"[{"loc":["body","message"]}]"#);
    }

    #[test]
    fn missing_or_non_json_detail_is_none() {
        assert!(extract_detail("{}").is_none());
        assert!(extract_detail("<html>oops</html>").is_none());
        assert!(extract_detail(r#"{"detail":null}"#).is_none());
    }

    #[test]
    fn stream_status_classification() {
        assert_eq!(
            classify_stream_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            BackendError::BackendInternalError { status: 503 }
        );
        assert_eq!(
            classify_stream_status(StatusCode::UNPROCESSABLE_ENTITY, r#"{"detail":"bad field"}"#),
            BackendError::InvalidRequest { status: 422, detail: "bad field".into() }
        );
        assert_eq!(
            classify_stream_status(StatusCode::NOT_FOUND, "not json"),
            BackendError::InvalidRequest { status: 404, detail: GENERIC_DETAIL.into() }
        );
        assert!(matches!(
            classify_stream_status(StatusCode::NOT_MODIFIED, ""),
            BackendError::UnknownBackendError(_)
        ));
    }
}
