//! Token-usage statistics for a conversation history

use serde::Serialize;

use super::turn::{ConversationTurn, Role};
use super::window::{DEFAULT_PERSONA_NAME, build_window, format_for_prompt};

/// Estimate token count using the chars/4 heuristic, rounded up
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// How much the conversation window saves over sending the full history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStats {
    pub message_count: usize,
    pub user_messages: usize,
    pub persona_messages: usize,
    pub estimated_full_history_tokens: usize,
    pub estimated_windowed_tokens: usize,
    pub token_savings: usize,
}

impl ConversationStats {
    pub fn from_turns(turns: &[ConversationTurn]) -> Self {
        let user_messages = turns.iter().filter(|t| t.role == Role::User).count();
        let persona_messages = turns.len() - user_messages;

        let full_history = turns
            .iter()
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let estimated_full_history_tokens = estimate_tokens(&full_history);

        let windowed = format_for_prompt(&build_window(turns), DEFAULT_PERSONA_NAME);
        let estimated_windowed_tokens = estimate_tokens(&windowed);

        Self {
            message_count: turns.len(),
            user_messages,
            persona_messages,
            estimated_full_history_tokens,
            estimated_windowed_tokens,
            token_savings: estimated_full_history_tokens.saturating_sub(estimated_windowed_tokens),
        }
    }
}
