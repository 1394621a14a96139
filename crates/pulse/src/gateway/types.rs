//! Gateway types for generation requests and results
//!
//! Defines the request context handed to every backend, the results and
//! token events handed back, the JSON wire shape of a stream event, and the
//! backend-level error taxonomy.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Everything a backend needs to produce one persona reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationContext {
    /// Persona voice and behavioral rules
    pub system_instruction: String,
    /// The message being answered
    pub user_message: String,
    /// Pre-compacted prior conversation, rendered as text
    pub prior_context: Option<String>,
}

impl GenerationContext {
    pub fn new(system_instruction: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            user_message: user_message.into(),
            prior_context: None,
        }
    }

    /// Attach a rendered prior context (blank strings are treated as absent)
    pub fn with_prior_context(mut self, prior_context: impl Into<String>) -> Self {
        let prior_context = prior_context.into();
        self.prior_context = (!prior_context.trim().is_empty()).then_some(prior_context);
        self
    }

    /// User-turn prompt for backends that take the system instruction separately
    pub fn user_prompt(&self) -> String {
        match self.prior_context {
            Some(ref prior) => format!("{prior}\n\nUser: {}", self.user_message),
            None => self.user_message.clone(),
        }
    }

    /// Single concatenated prompt for completion-style backends
    pub fn flattened_prompt(&self) -> String {
        match self.prior_context {
            Some(ref prior) => format!(
                "{}\n\n{prior}\n\nUser: {}\n\nAssistant:",
                self.system_instruction, self.user_message
            ),
            None => format!(
                "{}\n\nUser: {}\n\nAssistant:",
                self.system_instruction, self.user_message
            ),
        }
    }
}

/// Result of a non-streaming generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    /// Sanitized reply text
    pub text: String,
    /// Name of the backend that produced the reply
    pub backend_name: String,
}

/// One unit of a normalized generation stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    /// Incremental chunk of text
    Token { text: String },
    /// Terminal event carrying the complete reply
    Done { full_text: String },
}

impl TokenEvent {
    pub fn token(text: impl Into<String>) -> Self {
        TokenEvent::Token { text: text.into() }
    }

    pub fn done(full_text: impl Into<String>) -> Self {
        TokenEvent::Done {
            full_text: full_text.into(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TokenEvent::Done { .. })
    }
}

/// Stream of token events produced by a backend adapter
pub type TokenStream = BoxStream<'static, Result<TokenEvent, BackendError>>;

/// JSON shape of a stream event on the wire
///
/// ```json
/// {"token": "Hello"}
/// {"done": true, "fullResponse": "Hello there", "provider": "ollama"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireEvent {
    Token {
        token: String,
    },
    Done {
        done: bool,
        #[serde(rename = "fullResponse")]
        full_response: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
    },
}

impl WireEvent {
    pub fn from_event(event: &TokenEvent, backend_name: &str) -> Self {
        match event {
            TokenEvent::Token { text } => WireEvent::Token {
                token: text.clone(),
            },
            TokenEvent::Done { full_text } => WireEvent::Done {
                done: true,
                full_response: full_text.clone(),
                provider: Some(backend_name.to_string()),
            },
        }
    }
}

/// Backend-level errors
///
/// Adapters return these; the gateway logs them and moves on to the next
/// backend, so none of them ever reaches a caller.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Backend not configured: {0}")]
    NotConfigured(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("API returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Stream error: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout(e.to_string())
        } else if e.is_decode() {
            BackendError::Parse(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_without_history() {
        let ctx = GenerationContext::new("You are Maya.", "How are you?");
        assert_eq!(ctx.user_prompt(), "How are you?");
    }

    #[test]
    fn test_user_prompt_with_history() {
        let ctx = GenerationContext::new("You are Maya.", "And now?")
            .with_prior_context("User: hi\nMaya (you): hello");
        assert_eq!(ctx.user_prompt(), "User: hi\nMaya (you): hello\n\nUser: And now?");
    }

    #[test]
    fn test_flattened_prompt_shapes() {
        let ctx = GenerationContext::new("SYS", "MSG");
        assert_eq!(ctx.flattened_prompt(), "SYS\n\nUser: MSG\n\nAssistant:");

        let ctx = ctx.with_prior_context("PRIOR");
        assert_eq!(
            ctx.flattened_prompt(),
            "SYS\n\nPRIOR\n\nUser: MSG\n\nAssistant:"
        );
    }

    #[test]
    fn test_blank_prior_context_is_dropped() {
        let ctx = GenerationContext::new("SYS", "MSG").with_prior_context("  \n ");
        assert!(ctx.prior_context.is_none());
    }

    #[test]
    fn test_wire_event_serialization() {
        let token = WireEvent::from_event(&TokenEvent::token("Hi"), "gemini");
        assert_eq!(serde_json::to_string(&token).unwrap(), r#"{"token":"Hi"}"#);

        let done = WireEvent::from_event(&TokenEvent::done("Hi there"), "gemini");
        assert_eq!(
            serde_json::to_string(&done).unwrap(),
            r#"{"done":true,"fullResponse":"Hi there","provider":"gemini"}"#
        );
    }

    #[test]
    fn test_wire_event_parses_both_shapes() {
        let token: WireEvent = serde_json::from_str(r#"{"token":" there"}"#).unwrap();
        assert_eq!(
            token,
            WireEvent::Token {
                token: " there".to_string()
            }
        );

        let done: WireEvent =
            serde_json::from_str(r#"{"done":true,"fullResponse":"Hi there"}"#).unwrap();
        assert_eq!(
            done,
            WireEvent::Done {
                done: true,
                full_response: "Hi there".to_string(),
                provider: None,
            }
        );
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Http {
            status: 503,
            body: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "API returned 503: overloaded");
    }
}
