//! OpenAI-compatible chat completions backend

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::OpenAiConfig;
use crate::gateway::backend::Backend;
use crate::gateway::backends::{build_client, check_status, sse_chunks};
use crate::gateway::prober::is_credential_valid;
use crate::gateway::stream::{Chunk, Exhaustion, normalize};
use crate::gateway::types::{BackendError, GenerationContext, TokenStream};

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 256;
const DONE_MARKER: &str = "[DONE]";

/// Chat completions backend for OpenAI and compatible endpoints
#[derive(Debug)]
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiBackend {
    /// Create the backend, resolving the API key once
    pub fn new(config: &OpenAiConfig) -> Result<Self, BackendError> {
        let client = build_client(config.timeout_secs)?;
        let api_key = config.resolve_api_key();

        info!(
            "OpenAI backend initialized with model: {}, api_url: {}",
            config.model, config.api_url
        );

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    fn request(&self, context: &GenerationContext, stream: bool) -> ChatCompletionRequest {
        let mut messages = vec![Message {
            role: "system",
            content: context.system_instruction.clone(),
        }];
        if let Some(ref prior) = context.prior_context {
            messages.push(Message {
                role: "system",
                content: format!("Conversation so far:\n{prior}"),
            });
        }
        messages.push(Message {
            role: "user",
            content: context.user_message.clone(),
        });

        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            stream,
        }
    }

    async fn send(
        &self,
        context: &GenerationContext,
        stream: bool,
    ) -> Result<reqwest::Response, BackendError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| BackendError::NotConfigured("OpenAI API key not set".to_string()))?;

        let url = format!(
            "{}/chat/completions",
            self.config.api_url.trim_end_matches('/')
        );
        debug!("Calling OpenAI at: {} (stream: {})", url, stream);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&self.request(context, stream))
            .send()
            .await?;
        check_status(response).await
    }
}

fn parse_sse_data(data: &str) -> Result<Option<Chunk>, BackendError> {
    if data.trim() == DONE_MARKER {
        return Ok(Some(Chunk::End));
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(data)
        .map_err(|e| BackendError::Parse(format!("OpenAI stream frame: {e}")))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .map(Chunk::Text))
}

#[async_trait]
impl Backend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn label(&self) -> &str {
        "OpenAI"
    }

    fn priority(&self) -> u32 {
        self.config.priority
    }

    fn is_configured(&self) -> bool {
        is_credential_valid(self.api_key.as_deref())
    }

    async fn generate(&self, context: &GenerationContext) -> Result<String, BackendError> {
        let response = self.send(context, false).await?;

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::Parse("Empty response".to_string()))
    }

    async fn generate_stream(
        &self,
        context: &GenerationContext,
    ) -> Result<TokenStream, BackendError> {
        let response = self.send(context, true).await?;
        let chunks = sse_chunks(response, parse_sse_data).boxed();
        Ok(normalize(chunks, Exhaustion::Interrupts))
    }
}
