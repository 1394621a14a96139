//! Conversation history handling
//!
//! Turns are owned by the caller; this module only reads them to build the
//! bounded context window that accompanies every generation request.

pub mod stats;
pub mod turn;
pub mod window;

pub use stats::{ConversationStats, estimate_tokens};
pub use turn::{ConversationTurn, Role};
pub use window::{
    ConversationWindow, DEFAULT_PERSONA_NAME, MAX_SUMMARY_CHARS, RECENT_COUNT, build_window,
    format_for_prompt,
};
