//! Test utilities for vesper-core
//!
//! A mock OpenAI-compatible server that can stand in for the inference
//! provider in integration tests and local development, plus a builder for
//! caller tokens.

use std::net::SocketAddr;

use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::ai::hashed_embedding;

/// Build an unsigned JWT naming `user_id`
///
/// Identity parsing accepts it; a real PostgREST backend would not.
pub fn unsigned_token(user_id: Uuid) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload =
        URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{}","role":"authenticated"}}"#, user_id));
    format!("{}.{}.", header, payload)
}

/// How the mock provider answers
#[derive(Debug, Clone, Default)]
pub struct MockProviderBehavior {
    /// Fixed assistant text for every completion (default: a valid reply)
    pub completion: Option<String>,
    /// Answer embedding requests with HTTP 500
    pub fail_embeddings: bool,
}

/// Mock OpenAI-compatible provider for testing and development
pub struct MockProviderServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockProviderServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::start_with(MockProviderBehavior::default()).await
    }

    pub async fn start_with(behavior: MockProviderBehavior) -> Self {
        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat))
            .route("/v1/embeddings", post(handle_embeddings))
            .with_state(behavior);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockProviderServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("Bearer "))
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"message": "Missing bearer key"}})),
    )
        .into_response()
}

async fn handle_models() -> Json<Value> {
    Json(json!({"object": "list", "data": [{"id": "mock-chat", "object": "model"}]}))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

async fn handle_chat(
    State(behavior): State<MockProviderBehavior>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }

    let system = request
        .messages
        .iter()
        .find(|m| m.role == "system")
        .map(|m| m.content.as_str())
        .unwrap_or("");

    // Replies are fenced to exercise fence stripping end to end
    let content = behavior.completion.unwrap_or_else(|| {
        if system.contains("dominant_emotion") {
            format!(
                "```json\n{}\n```",
                json!({
                    "dominant_emotion": "hopeful",
                    "top_themes": ["work pressure", "rest"],
                    "emotional_arc": "Tension early in the week eased by the weekend.",
                    "ai_observation": "Rest days appear to restore your sense of control."
                })
            )
        } else {
            format!(
                "```json\n{}\n```",
                json!({
                    "mood_score": 7.2,
                    "themes": ["gratitude", "rest"],
                    "distortions": ["mind READING"],
                    "observation": "Slowing down long enough to notice small comforts seems to have lifted the whole day."
                })
            )
        }
    });

    Json(json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": request.model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
    dimensions: Option<usize>,
}

async fn handle_embeddings(
    State(behavior): State<MockProviderBehavior>,
    headers: HeaderMap,
    Json(request): Json<EmbeddingRequest>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if behavior.fail_embeddings {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": {"message": "embedding backend unavailable"}})),
        )
            .into_response();
    }

    let dims = request.dimensions.unwrap_or(1536);
    Json(json!({
        "object": "list",
        "model": request.model,
        "data": [{
            "object": "embedding",
            "index": 0,
            "embedding": hashed_embedding(&request.input, dims)
        }]
    }))
    .into_response()
}
