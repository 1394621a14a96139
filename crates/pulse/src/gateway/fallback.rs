//! Priority-ordered fallback across backends
//!
//! The gateway walks its backend list lowest priority first, skipping
//! backends the prober rejects and moving past any that fail. When the list
//! is exhausted the offline responder answers, so neither entry point can
//! fail.

use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{BackendsConfig, GatewayConfig};
use crate::error::Result;
use crate::gateway::backend::Backend;
use crate::gateway::backends::{
    GeminiBackend, OFFLINE_BACKEND_NAME, OfflineResponder, OllamaBackend, OpenAiBackend,
};
use crate::gateway::prober::AvailabilityProber;
use crate::gateway::sanitize::sanitize;
use crate::gateway::types::{GenerationContext, GenerationResult, TokenEvent, TokenStream};

/// A committed token stream and the backend producing it
pub struct GatewayStream {
    pub backend_name: String,
    pub events: BoxStream<'static, TokenEvent>,
}

impl std::fmt::Debug for GatewayStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayStream")
            .field("backend_name", &self.backend_name)
            .finish_non_exhaustive()
    }
}

/// How the currently usable backend relates to the preferred one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    /// The highest-priority backend is usable
    Active,
    /// A lower-priority backend is standing in
    Fallback,
    /// Nothing is usable; the offline responder would answer
    Offline,
}

/// Report of the backend a request would use right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveBackend {
    pub name: String,
    pub label: String,
    pub status: BackendStatus,
}

/// Generation gateway over an immutable, priority-ordered backend list
pub struct Gateway {
    backends: Vec<Box<dyn Backend>>,
    prober: AvailabilityProber,
    offline: OfflineResponder,
}

impl Gateway {
    /// Create a gateway over `backends`, ordered by ascending priority
    ///
    /// Backends sharing a priority keep their given order.
    pub fn new(mut backends: Vec<Box<dyn Backend>>, probe_timeout: Duration) -> Self {
        backends.sort_by_key(|b| b.priority());

        Self {
            backends,
            prober: AvailabilityProber::new(probe_timeout),
            offline: OfflineResponder::new(),
        }
    }

    /// Build every enabled backend from configuration
    ///
    /// Credentials are resolved here, once; nothing reads the environment
    /// after this returns.
    pub fn from_config(backends: &BackendsConfig, gateway: &GatewayConfig) -> Result<Self> {
        let mut list: Vec<Box<dyn Backend>> = Vec::new();

        if backends.gemini.enabled {
            list.push(Box::new(GeminiBackend::new(&backends.gemini)?));
        }
        if backends.openai.enabled {
            list.push(Box::new(OpenAiBackend::new(&backends.openai)?));
        }
        if backends.ollama.enabled {
            list.push(Box::new(OllamaBackend::new(&backends.ollama)?));
        }

        let gateway = Self::new(list, gateway.probe_timeout());
        info!(
            "Gateway initialized with backends: [{}]",
            gateway.backend_names().join(", ")
        );
        Ok(gateway)
    }

    /// Backend names in the order they are tried (offline responder excluded)
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Generate a complete reply from the first backend that succeeds
    pub async fn complete(&self, context: &GenerationContext) -> GenerationResult {
        for backend in &self.backends {
            if !self.prober.is_available(backend.as_ref()).await {
                debug!("Skipping unavailable backend: {}", backend.name());
                continue;
            }

            match backend.generate(context).await {
                Ok(text) => {
                    info!("Completed reply with backend: {}", backend.name());
                    return GenerationResult {
                        text: sanitize(&text),
                        backend_name: backend.name().to_string(),
                    };
                }
                Err(e) => warn!("Backend {} failed, falling back: {}", backend.name(), e),
            }
        }

        info!("All backends exhausted, answering offline");
        GenerationResult {
            text: sanitize(&self.offline.reply()),
            backend_name: OFFLINE_BACKEND_NAME.to_string(),
        }
    }

    /// Stream a reply from the first backend that produces output
    ///
    /// A backend whose stream fails before yielding anything counts as failed
    /// and the next one is tried. Once the first event is received the
    /// gateway commits to that backend: a later failure ends the stream
    /// without a `Done` event and without falling back.
    pub async fn stream(&self, context: &GenerationContext) -> GatewayStream {
        for backend in &self.backends {
            if !self.prober.is_available(backend.as_ref()).await {
                debug!("Skipping unavailable backend: {}", backend.name());
                continue;
            }

            let mut upstream = match backend.generate_stream(context).await {
                Ok(upstream) => upstream,
                Err(e) => {
                    warn!("Backend {} failed, falling back: {}", backend.name(), e);
                    continue;
                }
            };

            match first_event(&mut upstream).await {
                Ok(first) => {
                    info!("Streaming reply with backend: {}", backend.name());
                    return GatewayStream {
                        backend_name: backend.name().to_string(),
                        events: committed(backend.name().to_string(), first, upstream),
                    };
                }
                Err(reason) => {
                    warn!("Backend {} failed, falling back: {}", backend.name(), reason);
                }
            }
        }

        info!("All backends exhausted, streaming offline");
        GatewayStream {
            backend_name: OFFLINE_BACKEND_NAME.to_string(),
            events: stream::iter(self.offline.reply_events()).boxed(),
        }
    }

    /// The backend a request would be served by right now
    pub async fn active_backend(&self) -> ActiveBackend {
        for (index, backend) in self.backends.iter().enumerate() {
            if self.prober.is_available(backend.as_ref()).await {
                return ActiveBackend {
                    name: backend.name().to_string(),
                    label: backend.label().to_string(),
                    status: if index == 0 {
                        BackendStatus::Active
                    } else {
                        BackendStatus::Fallback
                    },
                };
            }
        }

        ActiveBackend {
            name: self.offline.name().to_string(),
            label: self.offline.label().to_string(),
            status: BackendStatus::Offline,
        }
    }
}

/// Pull the first meaningful event, or describe why there is none
async fn first_event(upstream: &mut TokenStream) -> std::result::Result<TokenEvent, String> {
    loop {
        match upstream.next().await {
            Some(Ok(TokenEvent::Token { text })) if text.is_empty() => continue,
            Some(Ok(event)) => return Ok(event),
            Some(Err(e)) => return Err(e.to_string()),
            None => return Err("stream ended without output".to_string()),
        }
    }
}

struct Committed {
    backend_name: String,
    pending: Option<TokenEvent>,
    upstream: TokenStream,
    full_text: String,
    finished: bool,
}

/// Forward a committed backend's events, rebuilding `Done` from the tokens
///
/// The terminal text is the sanitized concatenation of the forwarded tokens,
/// whatever the adapter reported.
fn committed(
    backend_name: String,
    first: TokenEvent,
    upstream: TokenStream,
) -> BoxStream<'static, TokenEvent> {
    let state = Committed {
        backend_name,
        pending: Some(first),
        upstream,
        full_text: String::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        loop {
            let next = match state.pending.take() {
                Some(event) => Some(Ok(event)),
                None => state.upstream.next().await,
            };

            match next {
                Some(Ok(TokenEvent::Token { text })) => {
                    if text.is_empty() {
                        continue;
                    }
                    state.full_text.push_str(&text);
                    return Some((TokenEvent::Token { text }, state));
                }
                Some(Ok(TokenEvent::Done { .. })) => {
                    state.finished = true;
                    let full_text = sanitize(&state.full_text);
                    return Some((TokenEvent::done(full_text), state));
                }
                Some(Err(e)) => {
                    warn!("Backend {} stream interrupted: {}", state.backend_name, e);
                    return None;
                }
                None => {
                    warn!(
                        "Backend {} stream ended before completion",
                        state.backend_name
                    );
                    return None;
                }
            }
        }
    })
    .boxed()
}
