//! Mock chat completion backend for integration tests
//!
//! Implements a minimal OpenAI-compatible endpoint that returns canned
//! responses, including SSE bodies delivered in deliberately split frames

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

/// How the mock answers completion requests
enum Mode {
    /// Canned success, streaming or not depending on the request
    Chat { content: String },
    /// Structured API error body under the given status
    Error { status: u16 },
    /// Arbitrary raw body under the given status
    Raw { status: u16, body: String },
}

struct MockApiState {
    mode: Mode,
    request_count: AtomicU32,
}

/// Mock backend that returns predictable responses
pub struct MockApi {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockApiState>,
}

impl MockApi {
    /// Start the mock with the default canned response
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(Mode::Chat {
            content: "Hello from mock API".to_owned(),
        })
        .await
    }

    /// Start a mock that answers with a structured error body
    pub async fn start_with_error(status: u16) -> anyhow::Result<Self> {
        Self::start_inner(Mode::Error { status }).await
    }

    /// Start a mock that answers with a raw body
    pub async fn start_with_raw(status: u16, body: &str) -> anyhow::Result<Self> {
        Self::start_inner(Mode::Raw {
            status,
            body: body.to_owned(),
        })
        .await
    }

    async fn start_inner(mode: Mode) -> anyhow::Result<Self> {
        let state = Arc::new(MockApiState {
            mode,
            request_count: AtomicU32::new(0),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            addr,
            shutdown,
            state,
        })
    }

    /// Base URL for pointing a client at the mock
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Number of completion requests received
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// -- Handler --

async fn handle_chat_completions(
    State(state): State<Arc<MockApiState>>,
    Json(request): Json<serde_json::Value>,
) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    match &state.mode {
        Mode::Error { status } => {
            let status = StatusCode::from_u16(*status).expect("valid status");
            (
                status,
                Json(serde_json::json!({
                    "error": {
                        "message": "mock rejected the request",
                        "type": "mock_error",
                        "param": "model",
                        "code": "mock_rejection"
                    }
                })),
            )
                .into_response()
        }
        Mode::Raw { status, body } => {
            let status = StatusCode::from_u16(*status).expect("valid status");
            (status, body.clone()).into_response()
        }
        Mode::Chat { content } => {
            let model = request["model"].as_str().unwrap_or("mock-model").to_owned();
            if request["stream"].as_bool().unwrap_or(false) {
                streaming_response(content, &model)
            } else {
                completion_response(content, &model)
            }
        }
    }
}

fn completion_response(content: &str, model: &str) -> Response {
    Json(serde_json::json!({
        "id": "chatcmpl-mock-123",
        "object": "chat.completion",
        "created": 1_700_000_000u64,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }))
    .into_response()
}

fn chunk_record(model: &str, delta: serde_json::Value, finish_reason: Option<&str>) -> String {
    let chunk = serde_json::json!({
        "id": "chatcmpl-mock-stream",
        "object": "chat.completion.chunk",
        "created": 1_700_000_000u64,
        "model": model,
        "choices": [{
            "index": 0,
            "delta": delta,
            "finish_reason": finish_reason
        }]
    });
    format!("data: {chunk}\n\n")
}

/// Build the SSE body as explicit frames, with one record split across two
/// frames to exercise boundary reconstruction end to end
fn streaming_response(content: &str, model: &str) -> Response {
    let mut frames: Vec<Bytes> = Vec::new();

    frames.push(Bytes::from(chunk_record(
        model,
        serde_json::json!({"role": "assistant", "content": ""}),
        None,
    )));

    let words: Vec<&str> = content.split_whitespace().collect();
    for (i, word) in words.iter().enumerate() {
        let record = chunk_record(model, serde_json::json!({"content": format!("{word} ")}), None);
        if i == 0 {
            // Split mid-record
            let half = record.len() / 2;
            frames.push(Bytes::from(record[..half].to_owned()));
            frames.push(Bytes::from(record[half..].to_owned()));
        } else {
            frames.push(Bytes::from(record));
        }
    }

    frames.push(Bytes::from(chunk_record(
        model,
        serde_json::json!({}),
        Some("stop"),
    )));
    frames.push(Bytes::from(
        "data: {\"id\":\"chatcmpl-mock-stream\",\"object\":\"chat.completion.chunk\",\
         \"created\":1700000000,\"model\":\"mock\",\"choices\":[],\
         \"usage\":{\"prompt_tokens\":10,\"completion_tokens\":5,\"total_tokens\":15}}\n\n"
            .to_owned(),
    ));
    frames.push(Bytes::from("data: [DONE]\n\n".to_owned()));

    let body = Body::from_stream(futures::stream::iter(
        frames.into_iter().map(Ok::<_, Infallible>),
    ));

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/event-stream")],
        body,
    )
        .into_response()
}
