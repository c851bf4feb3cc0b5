//! HTTP surface: health, blocking chat, streaming chat (SSE), and run.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, Method};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::engine::pipeline;
use crate::engine::runner::{self, RunnerOptions};
use crate::engine::types::{ChatRequest, PipelineEvent, RunRequest};
use crate::AppState;

/// Dev frontend origins allowed through CORS.
const ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://127.0.0.1:5173"];

/// Streaming channel depth. Events are forwarded as they arrive; the buffer
/// only absorbs bursts between provider delivery and SSE flushing.
const EVENT_CHANNEL_CAPACITY: usize = 64;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            ALLOWED_ORIGINS.iter().map(|o| HeaderValue::from_static(o)),
        ))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/chat/stream", post(chat_stream))
        .route("/api/run", post(run_agent))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

/// POST /api/chat — blocking pipeline. Always returns a renderable body;
/// failures surface as the fixed fallback with `raw_text` attached.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    let response =
        pipeline::run_chat(&state.registry, state.backend.as_ref(), request.messages).await;
    Json(response)
}

/// POST /api/chat/stream — streaming pipeline as Server-Sent Events.
async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<PipelineEvent>(EVENT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        pipeline::run_chat_stream(&state.registry, state.backend.as_ref(), request.messages, tx)
            .await;
    });

    let events = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let sse = Event::default()
            .event(event.sse_event_name())
            .data(event.to_json().to_string());
        Some((Ok(sse), rx))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// POST /api/run — execute candidate agent code in the sandbox. Every
/// outcome, including validation failure and timeout, is a 200 with a
/// uniform `RunResponse` body.
async fn run_agent(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> impl IntoResponse {
    let options = RunnerOptions {
        python_bin: state.config.python_bin.clone(),
        timeout: state.config.run_timeout,
    };
    let response = runner::run_agent_code(&request, &options).await;
    Json(response)
}
