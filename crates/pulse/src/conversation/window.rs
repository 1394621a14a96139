//! Conversation window compaction
//!
//! Keeps the most recent turns verbatim and folds everything older into a
//! one-line heuristic summary. The summary is built locally from keyword and
//! question matching so compaction never costs an extra backend call.

use super::turn::{ConversationTurn, Role};

/// Number of most-recent turns kept verbatim
pub const RECENT_COUNT: usize = 4;

/// Character budget for the summary of older turns (before the ellipsis)
pub const MAX_SUMMARY_CHARS: usize = 150;

/// Persona label used when the caller does not name the persona
pub const DEFAULT_PERSONA_NAME: &str = "Persona";

const MAX_TOPICS: usize = 5;
const MAX_QUESTIONS: usize = 2;
const QUESTION_WORDS: usize = 5;
const MAX_QUESTION_CHARS: usize = 40;
const ELLIPSIS: char = '…';

/// Topic vocabulary scanned in older turns
const TOPIC_KEYWORDS: &[&str] = &[
    "stress",
    "work",
    "team",
    "meeting",
    "project",
    "deadline",
    "communication",
    "email",
    "feedback",
    "manager",
    "colleague",
    "motivation",
    "challenge",
    "problem",
    "solution",
    "help",
    "frustrated",
    "excited",
    "concerned",
    "prefer",
    "style",
];

/// Bounded, read-only view over a turn history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationWindow {
    /// Summary of the turns older than the recent window, if any
    pub summary: Option<String>,
    /// The last `RECENT_COUNT` turns (or all of them), most recent last
    pub recent_turns: Vec<ConversationTurn>,
    /// Number of turns in the full history
    pub total_turn_count: usize,
}

/// Build a conversation window from the full history
pub fn build_window(turns: &[ConversationTurn]) -> ConversationWindow {
    let total_turn_count = turns.len();

    if total_turn_count <= RECENT_COUNT {
        return ConversationWindow {
            summary: None,
            recent_turns: turns.to_vec(),
            total_turn_count,
        };
    }

    let (older, recent) = turns.split_at(total_turn_count - RECENT_COUNT);

    ConversationWindow {
        summary: Some(summarize(older)),
        recent_turns: recent.to_vec(),
        total_turn_count,
    }
}

/// Render a window as the prior-context string handed to backends
///
/// Output shape:
/// ```text
/// [Remember: You are Maya. Stay in character as Maya only.]
///
/// [Earlier in conversation: Topics: stress. 2 earlier exchanges]
///
/// User: ...
/// Maya (you): ...
/// ```
pub fn format_for_prompt(window: &ConversationWindow, persona_name: &str) -> String {
    let mut lines = vec![
        format!("[Remember: You are {persona_name}. Stay in character as {persona_name} only.]"),
        String::new(),
    ];

    if let Some(ref summary) = window.summary {
        lines.push(format!("[Earlier in conversation: {summary}]"));
        lines.push(String::new());
    }

    for turn in &window.recent_turns {
        let speaker = match turn.role {
            Role::User => "User".to_string(),
            Role::Persona => format!("{persona_name} (you)"),
        };
        lines.push(format!("{speaker}: {}", turn.content));
    }

    lines.join("\n")
}

fn summarize(older: &[ConversationTurn]) -> String {
    let mut topics: Vec<&'static str> = Vec::new();
    let mut questions: Vec<String> = Vec::new();

    for turn in older {
        let lower = turn.content.to_lowercase();
        for keyword in TOPIC_KEYWORDS {
            if lower.contains(keyword) && !topics.contains(keyword) {
                topics.push(keyword);
            }
        }

        if turn.role == Role::User && turn.content.contains('?') {
            let first_words = turn
                .content
                .split(' ')
                .take(QUESTION_WORDS)
                .collect::<Vec<_>>()
                .join(" ");
            if first_words.chars().count() < MAX_QUESTION_CHARS {
                questions.push(first_words.replacen('?', "", 1));
            }
        }
    }

    let mut parts = Vec::with_capacity(3);

    if !topics.is_empty() {
        let listed: Vec<&str> = topics.iter().take(MAX_TOPICS).copied().collect();
        parts.push(format!("Topics: {}", listed.join(", ")));
    }

    if !questions.is_empty() {
        let asked: Vec<&str> = questions
            .iter()
            .take(MAX_QUESTIONS)
            .map(String::as_str)
            .collect();
        parts.push(format!("Asked: {}", asked.join("; ")));
    }

    parts.push(format!("{} earlier exchanges", older.len()));

    truncate_summary(parts.join(". "))
}

fn truncate_summary(summary: String) -> String {
    if summary.chars().count() <= MAX_SUMMARY_CHARS {
        return summary;
    }

    let mut truncated: String = summary.chars().take(MAX_SUMMARY_CHARS).collect();
    truncated.push(ELLIPSIS);
    truncated
}
