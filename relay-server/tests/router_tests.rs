//! HTTP surface of the relay.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use relay_model::{BackendError, InferenceConfig, MockBackend};
use relay_rag::{Embedder, HashingModelLoader, InMemoryVectorStore, Retriever, parse_menu};
use relay_server::server::MAX_BODY_BYTES;
use relay_server::{AppState, RelayConfig, RelaySession, build_router};
use serde_json::{Value, json};
use tower::ServiceExt;

const MENU: &str = r#"[
    {"name": "Gemma Classic Burger", "description": "Juicy beef burger with cheddar and pickles", "price": 8.99, "category": "Burgers"},
    {"name": "Vanilla Shake", "description": "Thick milkshake made with vanilla ice cream", "price": 5.25, "category": "Drinks"}
]"#;

fn app(backend: &MockBackend) -> Router {
    build_router(AppState::new(RelaySession::new(Arc::new(backend.clone()), "You are Gemma.")))
}

async fn post(app: Router, uri: &str, body: &str) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn chat_streams_plain_text() {
    let backend = MockBackend::new().with_chunks(["A", "B", "C"]);
    let response =
        post(app(&backend), "/chat", r#"{"message":"Hello","sessionId":"session-123"}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(body_text(response).await, "ABC");
}

#[tokio::test]
async fn blank_message_is_400() {
    let backend = MockBackend::new();
    let response = post(app(&backend), "/chat", r#"{"message":"   ","sessionId":"s"}"#).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "statusCode": 400, "message": "message must not be empty" })
    );
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn malformed_body_is_400() {
    let backend = MockBackend::new();
    let response = post(app(&backend), "/chat", "{not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["statusCode"], 400);
}

#[tokio::test]
async fn oversized_body_is_413() {
    let backend = MockBackend::new().with_chunks(["unused"]);
    let body = json!({ "message": "a".repeat(MAX_BODY_BYTES), "sessionId": "s" }).to_string();
    let response = post(app(&backend), "/chat", &body).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["statusCode"], 413);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn message_is_forwarded_untrimmed() {
    let backend = MockBackend::new().with_chunks(["ok"]);
    let response =
        post(app(&backend), "/chat", r#"{"message":"  Hello there \n","sessionId":"s"}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_text(response).await;

    match &backend.requests()[0] {
        relay_model::InferenceRequest::Stream { message, .. } => {
            assert!(message.contains("Customer:   Hello there \n\nAnswer:"), "prompt: {message}");
        }
        other => panic!("expected a stream request, got {other:?}"),
    }
}

#[tokio::test]
async fn backend_failure_before_streaming_is_500_json() {
    let backend = MockBackend::new().fail_open(BackendError::InvalidRequest {
        status: 422,
        detail: "bad field".into(),
    });
    let response = post(app(&backend), "/chat", r#"{"message":"Hello","sessionId":"s"}"#).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "statusCode": 500, "message": "Invalid request to AI server: bad field" })
    );
}

#[tokio::test]
async fn failure_after_first_chunk_is_in_band() {
    let backend = MockBackend::new()
        .with_chunks(["Our burgers"])
        .fail_after_chunks(BackendError::UnknownBackendError("connection reset".into()));
    let response = post(app(&backend), "/chat", r#"{"message":"Hello","sessionId":"s"}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        "Our burgers\n\n[error] Failed to communicate with AI server. Please try again."
    );
}

#[tokio::test]
async fn complete_returns_reply_json() {
    let backend = MockBackend::new().with_reply(Ok("Hi there!".to_string()));
    let response = post(app(&backend), "/chat/complete", r#"{"message":"Hello"}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "reply": "Hi there!" }));
}

#[tokio::test]
async fn health_reports_index_and_embedder() {
    let embedder = Arc::new(Embedder::new(Arc::new(HashingModelLoader::new(256))));
    let retriever = Retriever::new(embedder.clone(), Arc::new(InMemoryVectorStore::new()));
    retriever.ingest(&parse_menu(MENU).unwrap()).await.unwrap();

    let session = RelaySession::new(Arc::new(MockBackend::new()), "You are Gemma.")
        .with_retriever(Arc::new(retriever));
    let app = build_router(AppState::new(session).with_embedder(embedder));

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "status": "ok", "documents": 2, "embedder": "loaded" })
    );
}

#[tokio::test]
async fn unknown_route_is_404_json() {
    let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();
    let response = app(&MockBackend::new()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["statusCode"], 404);
}

#[tokio::test]
async fn full_pipeline_over_http_backend() {
    // Fake inference backend echoing the prompt it was sent.
    let backend = Router::new().route(
        "/chat",
        axum::routing::post(|axum::Json(body): axum::Json<Value>| async move {
            format!("[{}] {}", body["session_id"].as_str().unwrap(), body["message"].as_str().unwrap())
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, backend).await.unwrap();
    });

    let config = RelayConfig::builder()
        .corpus_path(concat!(env!("CARGO_MANIFEST_DIR"), "/../data/menu.json"))
        .inference(InferenceConfig::builder().base_url(format!("http://{addr}")).build().unwrap())
        .build()
        .unwrap();
    let state = AppState::from_config(&config).await.unwrap();

    let response = post(
        build_router(state),
        "/chat",
        r#"{"message":"What burgers do you have?","sessionId":"session-123"}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let echoed = body_text(response).await;
    assert!(echoed.starts_with("[session-123] You are Gemma"));
    assert!(echoed.contains("Burger"));
    assert!(echoed.ends_with("Customer: What burgers do you have?\nAnswer:"));
}
