//! Test utilities for ledgersort-core
//!
//! This module provides a mock model server that speaks the Ollama, OpenAI
//! and Anthropic wire formats, for development and integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::oneshot;

use crate::ai::mock::keyword_reply;
use crate::ai::MockRule;

struct ServerState {
    rules: Vec<MockRule>,
    /// Completion requests still to be answered with a 503
    failures_left: AtomicUsize,
    requests: AtomicUsize,
}

impl ServerState {
    /// Count the request and decide whether it should fail
    fn should_fail(&self) -> bool {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Mock model server for testing and development
///
/// Completion endpoints answer every transaction group whose short
/// description contains a rule keyword.
pub struct MockModelServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockModelServer {
    /// Start the mock server on an available port
    pub async fn start(rules: Vec<MockRule>) -> Self {
        Self::start_failing(rules, 0).await
    }

    /// Start a server whose first `failures` completion requests return 503
    pub async fn start_failing(rules: Vec<MockRule>, failures: usize) -> Self {
        let state = Arc::new(ServerState {
            rules,
            failures_left: AtomicUsize::new(failures),
            requests: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat))
            .route("/v1/messages", post(handle_messages))
            .route("/health", get(|| async { "ok" }))
            .with_state(state.clone());

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
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Completion requests received, including failed ones
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockModelServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "model overloaded").into_response()
}

/// Ollama tags endpoint (health check)
async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "llama3.2:latest".to_string(),
            modified_at: "2024-01-01T00:00:00Z".to_string(),
            size: 4_000_000_000,
        }],
    })
}

/// Ollama generate endpoint
async fn handle_generate(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    if state.should_fail() {
        return unavailable();
    }

    Json(GenerateResponse {
        model: request.model,
        response: keyword_reply(&request.prompt, &state.rules),
        done: true,
    })
    .into_response()
}

/// OpenAI and Anthropic model listing (health check)
async fn handle_models() -> Json<serde_json::Value> {
    Json(json!({
        "object": "list",
        "data": [{"id": "mock-model", "object": "model"}]
    }))
}

/// OpenAI chat completions endpoint
async fn handle_chat(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    if state.should_fail() {
        return unavailable();
    }

    let prompt = user_content(&request.messages);
    Json(json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": request.model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": keyword_reply(&prompt, &state.rules)},
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

/// Anthropic messages endpoint
async fn handle_messages(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    if state.should_fail() {
        return unavailable();
    }

    let prompt = user_content(&request.messages);
    Json(json!({
        "id": "msg_mock",
        "type": "message",
        "role": "assistant",
        "model": request.model,
        "content": [{"type": "text", "text": keyword_reply(&prompt, &state.rules)}],
        "stop_reason": "end_turn"
    }))
    .into_response()
}

fn user_content(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

// Request/Response types for the mock server

#[derive(Debug, Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    name: String,
    modified_at: String,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    model: String,
    response: String,
    done: bool,
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
