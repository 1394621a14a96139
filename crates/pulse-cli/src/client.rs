//! HTTP client for a running pulse daemon

use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, Response};

use pulse::gateway::{ActiveBackend, WireEvent};
use pulse::server::{ChatRequest, ChatResponse};

use crate::error::{CliError, CliResult};

/// A streamed reply once the daemon has finished sending it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedReply {
    pub full_response: String,
    pub provider: String,
    /// False when the stream ended without a terminal `done` event
    pub completed: bool,
}

pub struct PulseClient {
    base_url: String,
    client: Client,
}

impl PulseClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub async fn provider(&self) -> CliResult<ActiveBackend> {
        let response = self
            .client
            .get(format!("{}/api/provider", self.base_url))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn chat(&self, request: &ChatRequest) -> CliResult<ChatResponse> {
        let request = ChatRequest {
            stream: false,
            ..request.clone()
        };
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Send a streaming chat request, calling `on_token` for each token
    ///
    /// An error from `on_token` stops reading and is returned.
    pub async fn chat_stream<F>(
        &self,
        request: &ChatRequest,
        mut on_token: F,
    ) -> CliResult<StreamedReply>
    where
        F: FnMut(&str) -> std::io::Result<()>,
    {
        let request = ChatRequest {
            stream: true,
            ..request.clone()
        };
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;
        let response = check(response).await?;

        let header_provider = response
            .headers()
            .get(pulse::server::PROVIDER_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let mut reply = StreamedReply {
            full_response: String::new(),
            provider: header_provider,
            completed: false,
        };

        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| CliError(format!("Stream error: {e}")))?;
            if event.data.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<WireEvent>(&event.data)? {
                WireEvent::Token { token } => {
                    reply.full_response.push_str(&token);
                    on_token(&token)?;
                }
                WireEvent::Done {
                    full_response,
                    provider,
                    ..
                } => {
                    reply.full_response = full_response;
                    if let Some(provider) = provider {
                        reply.provider = provider;
                    }
                    reply.completed = true;
                    break;
                }
            }
        }

        Ok(reply)
    }
}

async fn check(response: Response) -> CliResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CliError(format!("Daemon returned {status}: {body}")))
}
