//! Backend trait for text generation providers
//!
//! Defines the Backend trait that abstracts the interchangeable generation
//! providers (cloud APIs, a local model server, the offline responder).

use async_trait::async_trait;

use crate::gateway::types::{BackendError, GenerationContext, TokenStream};

/// Trait for generation backends
///
/// Implementations are constructed once at startup and never mutated. They
/// translate a [`GenerationContext`] into their provider's request shape and
/// the provider's reply (or stream) back into plain text or token events.
/// Errors are always returned, never swallowed: fallback is the gateway's job.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable backend name used to tag results
    fn name(&self) -> &str;

    /// Human-readable label for status reports
    fn label(&self) -> &str {
        self.name()
    }

    /// Position in the fallback order (lower is tried first)
    fn priority(&self) -> u32;

    /// Static check: credentials present and well-formed
    fn is_configured(&self) -> bool;

    /// Whether a live reachability probe must pass before each use
    fn requires_probe(&self) -> bool {
        false
    }

    /// Lightweight reachability request
    ///
    /// Only called when [`Backend::requires_probe`] is true. The caller bounds
    /// it with a timeout.
    async fn probe(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Generate a complete reply
    async fn generate(&self, context: &GenerationContext) -> Result<String, BackendError>;

    /// Generate a reply as a stream of token events ending in `Done`
    async fn generate_stream(&self, context: &GenerationContext)
    -> Result<TokenStream, BackendError>;
}
