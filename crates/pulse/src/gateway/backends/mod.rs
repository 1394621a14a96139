//! Backend adapters for each generation provider

mod gemini;
mod offline;
mod ollama;
mod openai;

pub use gemini::GeminiBackend;
pub use offline::{OFFLINE_BACKEND_NAME, OFFLINE_NOTE, OfflineResponder};
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use reqwest::{Client, Response};

use crate::gateway::stream::Chunk;
use crate::gateway::types::BackendError;

/// Build the HTTP client shared by every request of one adapter
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client, BackendError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| BackendError::Network(e.to_string()))
}

/// Pass a success response through; turn anything else into `BackendError::Http`
pub(crate) async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(BackendError::Http {
        status: status.as_u16(),
        body,
    })
}

/// Decode a server-sent-events body into chunks
///
/// `parse` maps one event's `data` field to a chunk, or `None` for events
/// that carry nothing (keepalives, metadata).
pub(crate) fn sse_chunks<F>(
    response: Response,
    parse: F,
) -> impl Stream<Item = Result<Chunk, BackendError>> + Send + 'static
where
    F: Fn(&str) -> Result<Option<Chunk>, BackendError> + Send + 'static,
{
    response
        .bytes_stream()
        .eventsource()
        .filter_map(move |event| {
            let item = match event {
                Ok(event) => parse(&event.data).transpose(),
                Err(e) => Some(Err(BackendError::Stream(e.to_string()))),
            };
            futures::future::ready(item)
        })
}
