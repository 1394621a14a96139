//! Test utilities for pulse - scripted backends
//!
//! [`ScriptedBackend`] plays back a fixed behavior so gateway tests can
//! exercise fallback ordering, probing and stream commitment without any
//! network access.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::gateway::{Backend, BackendError, GenerationContext, TokenEvent, TokenStream};

/// What a scripted backend does when asked to generate
#[derive(Debug, Clone)]
pub enum Script {
    /// Reply with this text (streamed as one token per word)
    Reply(String),
    /// Stream exactly these tokens, then `Done`
    Tokens(Vec<String>),
    /// Stream these tokens, then fail without `Done`
    TokensThenFail(Vec<String>),
    /// Return a stream that fails before yielding anything
    FailInStream,
    /// Fail the call itself
    Fail,
}

/// How a scripted backend answers the availability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeBehavior {
    /// No probe required
    None,
    /// Probe succeeds
    Pass,
    /// Probe returns an error
    Fail,
    /// Probe never completes
    Hang,
}

/// Backend that plays back a [`Script`] and counts generation calls
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    name: String,
    priority: u32,
    configured: bool,
    probe: ProbeBehavior,
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(name: &str, priority: u32, script: Script) -> Self {
        Self {
            name: name.to_string(),
            priority,
            configured: true,
            probe: ProbeBehavior::None,
            script,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn replying(name: &str, priority: u32, text: &str) -> Self {
        Self::new(name, priority, Script::Reply(text.to_string()))
    }

    pub fn failing(name: &str, priority: u32) -> Self {
        Self::new(name, priority, Script::Fail)
    }

    pub fn streaming(name: &str, priority: u32, tokens: &[&str]) -> Self {
        Self::new(
            name,
            priority,
            Script::Tokens(tokens.iter().map(|t| t.to_string()).collect()),
        )
    }

    pub fn interrupted(name: &str, priority: u32, tokens: &[&str]) -> Self {
        Self::new(
            name,
            priority,
            Script::TokensThenFail(tokens.iter().map(|t| t.to_string()).collect()),
        )
    }

    pub fn failing_in_stream(name: &str, priority: u32) -> Self {
        Self::new(name, priority, Script::FailInStream)
    }

    /// Mark the backend as lacking credentials
    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub fn with_probe(mut self, probe: ProbeBehavior) -> Self {
        self.probe = probe;
        self
    }

    /// Shared handle to the number of generate calls made so far
    ///
    /// Grab it before handing the backend to a gateway.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn tokens(&self) -> Vec<String> {
        match &self.script {
            Script::Reply(text) => text
                .split(' ')
                .enumerate()
                .map(|(i, w)| if i == 0 { w.to_string() } else { format!(" {w}") })
                .collect(),
            Script::Tokens(tokens) | Script::TokensThenFail(tokens) => tokens.clone(),
            Script::FailInStream | Script::Fail => Vec::new(),
        }
    }
}

fn scripted_failure(name: &str) -> BackendError {
    BackendError::Network(format!("{name} scripted failure"))
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn requires_probe(&self) -> bool {
        self.probe != ProbeBehavior::None
    }

    async fn probe(&self) -> Result<(), BackendError> {
        match self.probe {
            ProbeBehavior::None | ProbeBehavior::Pass => Ok(()),
            ProbeBehavior::Fail => Err(BackendError::Http {
                status: 503,
                body: "unavailable".to_string(),
            }),
            ProbeBehavior::Hang => {
                futures::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    async fn generate(&self, _context: &GenerationContext) -> Result<String, BackendError> {
        self.record_call();
        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Tokens(tokens) => Ok(tokens.concat()),
            Script::TokensThenFail(_) | Script::FailInStream | Script::Fail => {
                Err(scripted_failure(&self.name))
            }
        }
    }

    async fn generate_stream(
        &self,
        _context: &GenerationContext,
    ) -> Result<TokenStream, BackendError> {
        self.record_call();

        let tokens = self.tokens();
        let full_text = tokens.concat();
        let mut events: Vec<Result<TokenEvent, BackendError>> =
            tokens.into_iter().map(|t| Ok(TokenEvent::token(t))).collect();

        match self.script {
            Script::Fail => return Err(scripted_failure(&self.name)),
            Script::Reply(_) | Script::Tokens(_) => events.push(Ok(TokenEvent::done(full_text))),
            Script::TokensThenFail(_) | Script::FailInStream => {
                events.push(Err(BackendError::Stream(format!(
                    "{} scripted interruption",
                    self.name
                ))))
            }
        }

        Ok(stream::iter(events).boxed())
    }
}
