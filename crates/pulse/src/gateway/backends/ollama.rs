//! Ollama backend for a locally hosted model server
//!
//! Unlike the cloud backends there are no credentials to check, so
//! availability is decided by a live probe of `/api/tags` before each use.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::config::OllamaConfig;
use crate::gateway::backend::Backend;
use crate::gateway::backends::{build_client, check_status};
use crate::gateway::stream::{Chunk, Exhaustion, ndjson_lines, normalize};
use crate::gateway::types::{BackendError, GenerationContext, TokenStream};

/// Ollama generation backend
#[derive(Debug)]
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: Options,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
    num_ctx: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            num_predict: 256,
            num_ctx: 4096,
        }
    }
}

/// One line of `/api/generate` output (also the whole non-streaming body)
#[derive(Debug, Deserialize)]
struct GenerateLine {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaBackend {
    pub fn new(config: &OllamaConfig) -> Result<Self, BackendError> {
        let client = build_client(config.timeout_secs)?;

        info!(
            "Ollama backend initialized with model: {}, url: {}",
            config.model, config.url
        );

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    async fn send(
        &self,
        context: &GenerationContext,
        stream: bool,
    ) -> Result<reqwest::Response, BackendError> {
        let url = format!("{}/api/generate", self.base_url());
        debug!("Calling Ollama at: {} (stream: {})", url, stream);

        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: context.flattened_prompt(),
            stream,
            options: Options::default(),
        };

        let response = self.client.post(&url).json(&request).send().await?;
        check_status(response).await
    }
}

/// Map one NDJSON line to chunks; malformed lines yield nothing
///
/// The final line may still carry text, in which case it yields the text
/// followed by the end marker.
fn parse_line(line: &str) -> Vec<Result<Chunk, BackendError>> {
    let parsed: GenerateLine = match serde_json::from_str(line) {
        Ok(parsed) => parsed,
        Err(e) => {
            trace!("Skipping malformed Ollama line: {} ({})", line, e);
            return Vec::new();
        }
    };

    if let Some(error) = parsed.error {
        return vec![Err(BackendError::Stream(error))];
    }

    let mut chunks = Vec::with_capacity(2);
    if !parsed.response.is_empty() {
        chunks.push(Ok(Chunk::Text(parsed.response)));
    }
    if parsed.done {
        chunks.push(Ok(Chunk::End));
    }
    chunks
}

#[async_trait]
impl Backend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn label(&self) -> &str {
        "Ollama (Local)"
    }

    fn priority(&self) -> u32 {
        self.config.priority
    }

    fn is_configured(&self) -> bool {
        !self.config.url.trim().is_empty() && !self.config.model.trim().is_empty()
    }

    fn requires_probe(&self) -> bool {
        true
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let url = format!("{}/api/tags", self.base_url());
        let response = self.client.get(&url).send().await?;
        check_status(response).await.map(|_| ())
    }

    async fn generate(&self, context: &GenerationContext) -> Result<String, BackendError> {
        let response = self.send(context, false).await?;

        let body: GenerateLine = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        match body.error {
            Some(error) => Err(BackendError::Parse(format!("Ollama error: {error}"))),
            None => Ok(body.response),
        }
    }

    async fn generate_stream(
        &self,
        context: &GenerationContext,
    ) -> Result<TokenStream, BackendError> {
        let response = self.send(context, true).await?;

        let chunks = ndjson_lines(response.bytes_stream())
            .flat_map(|line| {
                let items = match line {
                    Ok(line) => parse_line(&line),
                    Err(e) => vec![Err(e)],
                };
                futures::stream::iter(items)
            })
            .boxed();

        Ok(normalize(chunks, Exhaustion::Interrupts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(lines: &[&str]) -> Vec<Result<Chunk, String>> {
        lines
            .iter()
            .flat_map(|l| parse_line(l))
            .map(|r| r.map_err(|e| e.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_lines() {
        let chunks = collect(&[
            r#"{"model":"phi3:mini","response":"Hi","done":false}"#,
            "not json at all",
            r#"{"model":"phi3:mini","response":" there","done":false}"#,
            r#"{"model":"phi3:mini","response":"","done":true}"#,
        ]);
        assert_eq!(
            chunks,
            vec![
                Ok(Chunk::Text("Hi".to_string())),
                Ok(Chunk::Text(" there".to_string())),
                Ok(Chunk::End),
            ]
        );
    }

    #[test]
    fn test_final_line_with_text() {
        let chunks = collect(&[r#"{"response":"!","done":true}"#]);
        assert_eq!(
            chunks,
            vec![Ok(Chunk::Text("!".to_string())), Ok(Chunk::End)]
        );
    }

    #[test]
    fn test_error_line() {
        let chunks = collect(&[r#"{"error":"model 'phi3:mini' not found"}"#]);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].as_ref().unwrap_err().contains("not found"));
    }

    #[test]
    fn test_request_options() {
        let json = serde_json::to_value(Options::default()).unwrap();
        assert_eq!(json["num_predict"], 256);
        assert_eq!(json["num_ctx"], 4096);
    }
}
