use std::convert::Infallible;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RelayError, RelayResult};
use crate::server::MAX_BODY_BYTES;
use crate::state::AppState;

/// Body of `POST /chat` and `POST /chat/complete`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    /// Opaque conversation id forwarded to the backend. A fresh one is
    /// generated when absent.
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ChatRequest {
    /// Validated `(message, session_id)`. The message is forwarded as sent.
    fn into_parts(self) -> RelayResult<(String, String)> {
        if self.message.trim().is_empty() {
            return Err(RelayError::BadRequest("message must not be empty".to_string()));
        }
        let session_id = self
            .session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Ok((self.message, session_id))
    }
}

/// Body of a `POST /chat/complete` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

fn parse(payload: Result<Json<ChatRequest>, JsonRejection>) -> RelayResult<(String, String)> {
    let Json(request) = payload.map_err(|rejection| match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => RelayError::PayloadTooLarge(MAX_BODY_BYTES),
        _ => RelayError::BadRequest(rejection.body_text()),
    })?;
    request.into_parts()
}

/// Relay a streamed reply.
///
/// Headers are only sent once the backend produced its first chunk; any
/// failure before that is a JSON error response.
///
/// # Response
///
/// `200 text/plain; charset=utf-8`, chunked, with the backend's bytes as they
/// arrive.
pub async fn chat_stream(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> RelayResult<Response> {
    let (message, session_id) = parse(payload)?;
    let relay = state.session.relay(&message, &session_id).await?;

    let body = Body::from_stream(relay.map(Ok::<_, Infallible>));
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

/// Relay a complete reply as `{ "reply": "..." }`.
pub async fn chat_complete(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> RelayResult<Json<ChatReply>> {
    let (message, session_id) = parse(payload)?;
    let reply = state.session.complete(&message, &session_id).await?;
    Ok(Json(ChatReply { reply }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(message: &str, session_id: Option<&str>) -> ChatRequest {
        ChatRequest { message: message.to_string(), session_id: session_id.map(str::to_string) }
    }

    #[test]
    fn blank_message_is_rejected() {
        let err = request("   \n", Some("s")).into_parts().unwrap_err();
        assert_eq!(err.user_message(), "message must not be empty");
    }

    #[test]
    fn session_id_is_passed_through_or_generated() {
        let (message, session_id) = request(" hi ", Some("abc")).into_parts().unwrap();
        assert_eq!(message, " hi ");
        assert_eq!(session_id, "abc");

        let (_, generated) = request("hi", None).into_parts().unwrap();
        assert!(Uuid::parse_str(&generated).is_ok());
    }

    #[test]
    fn request_uses_camel_case() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"message":"hi","sessionId":"s-1"}"#).unwrap();
        assert_eq!(req.session_id.as_deref(), Some("s-1"));
    }
}
