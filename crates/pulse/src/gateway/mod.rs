//! Generation gateway
//!
//! Routes each request through the configured backends in priority order and
//! normalizes every provider's streaming format into [`TokenEvent`]s.

pub mod backend;
pub mod backends;
pub mod fallback;
pub mod prober;
pub mod sanitize;
pub mod stream;
pub mod types;

pub use backend::Backend;
pub use backends::{
    GeminiBackend, OFFLINE_BACKEND_NAME, OFFLINE_NOTE, OfflineResponder, OllamaBackend,
    OpenAiBackend,
};
pub use fallback::{ActiveBackend, BackendStatus, Gateway, GatewayStream};
pub use prober::{AvailabilityProber, is_credential_valid};
pub use sanitize::sanitize;
pub use types::{
    BackendError, GenerationContext, GenerationResult, TokenEvent, TokenStream, WireEvent,
};
