//! Request handlers for the chat API

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AppState;
use crate::conversation::{
    ConversationStats, ConversationTurn, DEFAULT_PERSONA_NAME, build_window, format_for_prompt,
};
use crate::gateway::{GenerationContext, TokenEvent, WireEvent};

/// Response header naming the backend that produced the reply
pub const PROVIDER_HEADER: &str = "x-pulse-provider";

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub system_instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_name: Option<String>,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

/// Non-streaming reply to `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub provider: String,
}

/// Body of `POST /api/conversation/stats`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatsRequest {
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// Answer one persona turn
///
/// History is compacted once into the prior context shared by every backend
/// attempt.
pub(super) async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    if request.message.trim().is_empty() || request.system_instruction.trim().is_empty() {
        return bad_request("Message and system instruction are required");
    }

    let persona_name = request
        .persona_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(DEFAULT_PERSONA_NAME);

    let mut context = GenerationContext::new(request.system_instruction, request.message);
    if !request.history.is_empty() {
        let window = build_window(&request.history);
        context = context.with_prior_context(format_for_prompt(&window, persona_name));

        let stats = ConversationStats::from_turns(&request.history);
        debug!(
            "History of {} turns: ~{} tokens full, ~{} windowed",
            stats.message_count,
            stats.estimated_full_history_tokens,
            stats.estimated_windowed_tokens
        );
    }

    if !request.stream {
        let result = state.gateway.complete(&context).await;
        let headers = [(PROVIDER_HEADER, result.backend_name.clone())];
        return (
            headers,
            Json(ChatResponse {
                response: result.text,
                provider: result.backend_name,
            }),
        )
            .into_response();
    }

    let stream = state.gateway.stream(&context).await;
    let backend_name = stream.backend_name.clone();
    let events = stream.events.map(move |event: TokenEvent| {
        let wire = WireEvent::from_event(&event, &backend_name);
        Ok::<_, Infallible>(match Event::default().json_data(&wire) {
            Ok(event) => event,
            Err(_) => Event::default().comment("unserializable event"),
        })
    });

    (
        [(PROVIDER_HEADER, stream.backend_name)],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

pub(super) async fn provider_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(state.gateway.active_backend().await).into_response()
}

pub(super) async fn stats_handler(Json(request): Json<StatsRequest>) -> Response {
    Json(ConversationStats::from_turns(&request.history)).into_response()
}
