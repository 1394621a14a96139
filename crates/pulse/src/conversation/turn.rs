//! Conversation turns exchanged between a user and a persona

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a conversation participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message written by the human
    User,
    /// Message spoken by the persona
    Persona,
}

impl Role {
    /// Convert role to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Persona => "persona",
        }
    }
}

/// A single turn in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Stable identifier (generated when the caller omits it)
    #[serde(default = "new_turn_id")]
    pub id: String,
    /// Role of the speaker
    pub role: Role,
    /// Content of the message
    pub content: String,
}

impl ConversationTurn {
    /// Create a new turn with a fresh identifier
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_turn_id(),
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn persona(content: impl Into<String>) -> Self {
        Self::new(Role::Persona, content)
    }
}

fn new_turn_id() -> String {
    Uuid::new_v4().to_string()
}
