//! The debate transcript and its markdown/JSON renderings.

use serde::{Deserialize, Serialize};

use crate::models::ConversationTurn;

const MARKDOWN_TITLE: &str = "# Debate Discussion";

/// Ordered, append-only record of a debate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub topic: String,
    pub rounds: usize,
    turns: Vec<ConversationTurn>,
}

impl Transcript {
    pub fn new(topic: impl Into<String>, rounds: usize) -> Self {
        Self {
            topic: topic.into(),
            rounds,
            turns: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Prior turns as `speaker: message` lines, oldest first.
    pub fn history_lines(&self) -> Vec<String> {
        self.turns.iter().map(ConversationTurn::history_line).collect()
    }

    /// Render as markdown.
    ///
    /// ```text
    /// # Debate Discussion
    ///
    /// ## Explainer A
    /// <message>
    /// _Sources_: [p.2] [p.5]
    ///
    /// ## Reviewer B
    /// <message>
    /// ```
    pub fn to_markdown(&self) -> String {
        let mut lines: Vec<String> = vec![MARKDOWN_TITLE.to_string(), String::new()];
        for turn in &self.turns {
            lines.push(format!("## {}", turn.speaker));
            lines.push(turn.message.trim().to_string());
            if !turn.citations.is_empty() {
                lines.push(format!("_Sources_: {}", turn.citations.join(" ")));
            }
            lines.push(String::new());
        }
        format!("{}\n", lines.join("\n").trim())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
