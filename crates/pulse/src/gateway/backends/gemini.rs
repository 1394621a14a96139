//! Google Gemini backend
//!
//! Talks to the Generative Language REST API. The system instruction travels
//! in its own field; prior context is folded into the single user turn.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::GeminiConfig;
use crate::gateway::backend::Backend;
use crate::gateway::backends::{build_client, check_status, sse_chunks};
use crate::gateway::prober::is_credential_valid;
use crate::gateway::stream::{Chunk, Exhaustion, normalize};
use crate::gateway::types::{BackendError, GenerationContext, TokenStream};

const TEMPERATURE: f32 = 0.7;
const TOP_P: f32 = 0.9;
const COMPLETE_MAX_OUTPUT_TOKENS: u32 = 150;
const STREAM_MAX_OUTPUT_TOKENS: u32 = 256;

/// Gemini generation backend
#[derive(Debug)]
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate
    fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        Some(
            candidate
                .content
                .parts
                .iter()
                .map(|p| p.text.as_str())
                .collect(),
        )
    }
}

impl GeminiBackend {
    /// Create the backend, resolving the API key once
    pub fn new(config: &GeminiConfig) -> Result<Self, BackendError> {
        let client = build_client(config.timeout_secs)?;
        let api_key = config.resolve_api_key();

        info!(
            "Gemini backend initialized with model: {}, key present: {}",
            config.model,
            api_key.is_some()
        );

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    fn request(&self, context: &GenerationContext, max_output_tokens: u32) -> GenerateRequest {
        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: context.system_instruction.clone(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: context.user_prompt(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                top_p: TOP_P,
                max_output_tokens,
            },
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/models/{}:{action}",
            self.config.api_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn key(&self) -> Result<&str, BackendError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| BackendError::NotConfigured("Gemini API key not set".to_string()))
    }
}

fn parse_sse_data(data: &str) -> Result<Option<Chunk>, BackendError> {
    let response: GenerateResponse = serde_json::from_str(data)
        .map_err(|e| BackendError::Parse(format!("Gemini stream frame: {e}")))?;
    Ok(response.text().map(Chunk::Text))
}

#[async_trait]
impl Backend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn label(&self) -> &str {
        "Google Gemini"
    }

    fn priority(&self) -> u32 {
        self.config.priority
    }

    fn is_configured(&self) -> bool {
        is_credential_valid(self.api_key.as_deref())
    }

    async fn generate(&self, context: &GenerationContext) -> Result<String, BackendError> {
        let url = self.endpoint("generateContent");
        debug!("Calling Gemini at: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.key()?)
            .json(&self.request(context, COMPLETE_MAX_OUTPUT_TOKENS))
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        body.text()
            .ok_or_else(|| BackendError::Parse("Gemini returned no candidates".to_string()))
    }

    async fn generate_stream(
        &self,
        context: &GenerationContext,
    ) -> Result<TokenStream, BackendError> {
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        debug!("Streaming from Gemini at: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.key()?)
            .json(&self.request(context, STREAM_MAX_OUTPUT_TOKENS))
            .send()
            .await?;
        let response = check_status(response).await?;

        let chunks = sse_chunks(response, parse_sse_data).boxed();
        Ok(normalize(chunks, Exhaustion::Completes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let backend = GeminiBackend::new(&GeminiConfig::default()).unwrap();
        let ctx = GenerationContext::new("You are Maya.", "Hi").with_prior_context("User: hey");
        let json = serde_json::to_value(backend.request(&ctx, 150)).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "You are Maya.");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "User: hey\n\nUser: Hi");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 150);
        assert!((json["generationConfig"]["topP"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_parse_sse_data() {
        let data = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]}}]}"#;
        assert_eq!(
            parse_sse_data(data).unwrap(),
            Some(Chunk::Text("Hello".to_string()))
        );

        let metadata_only = r#"{"usageMetadata":{"totalTokenCount":12}}"#;
        assert_eq!(parse_sse_data(metadata_only).unwrap(), None);

        assert!(parse_sse_data("not json").is_err());
    }

    #[test]
    fn test_placeholder_key_is_not_configured() {
        let config = GeminiConfig {
            api_key: Some("your_api_key_here".to_string()),
            ..GeminiConfig::default()
        };
        let backend = GeminiBackend::new(&config).unwrap();
        assert!(!backend.is_configured());
    }
}
