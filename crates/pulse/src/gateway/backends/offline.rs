//! Offline responder, the terminal fallback when no backend is usable

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;

use crate::gateway::backend::Backend;
use crate::gateway::types::{BackendError, GenerationContext, TokenEvent, TokenStream};

/// Backend name reported for offline replies
pub const OFFLINE_BACKEND_NAME: &str = "offline";

/// Suffix appended to every offline reply
pub const OFFLINE_NOTE: &str =
    " (Note: AI is currently unavailable, this is a placeholder response)";

const OPENERS: [&str; 4] = [
    "That's an interesting question. Let me think about that...",
    "I appreciate you asking. From my perspective...",
    "Good point. In my experience, I'd say...",
    "That's something I deal with often. Here's my take...",
];

/// Synthesizes filler replies without any network call
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineResponder;

impl OfflineResponder {
    pub fn new() -> Self {
        Self
    }

    /// A filler reply: one of the fixed openers followed by the offline note
    pub fn reply(&self) -> String {
        let opener = OPENERS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(OPENERS[0]);
        format!("{opener}{OFFLINE_NOTE}")
    }

    /// The reply as token events, one per word, then `Done`
    pub fn reply_events(&self) -> Vec<TokenEvent> {
        let text = self.reply();
        let mut events: Vec<TokenEvent> = text
            .split(' ')
            .enumerate()
            .map(|(i, word)| {
                if i == 0 {
                    TokenEvent::token(word)
                } else {
                    TokenEvent::token(format!(" {word}"))
                }
            })
            .collect();
        events.push(TokenEvent::done(text));
        events
    }
}

#[async_trait]
impl Backend for OfflineResponder {
    fn name(&self) -> &str {
        OFFLINE_BACKEND_NAME
    }

    fn label(&self) -> &str {
        "Offline"
    }

    fn priority(&self) -> u32 {
        u32::MAX
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn generate(&self, _context: &GenerationContext) -> Result<String, BackendError> {
        Ok(self.reply())
    }

    async fn generate_stream(
        &self,
        _context: &GenerationContext,
    ) -> Result<TokenStream, BackendError> {
        Ok(stream::iter(self.reply_events().into_iter().map(Ok)).boxed())
    }
}
