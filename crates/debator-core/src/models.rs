//! Core data models shared by ingestion and the debate loop.

use serde::{Deserialize, Serialize};

/// Text of one page of the source document.
///
/// Page numbers are 1-based and contiguous in the order a source yields them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

impl PageText {
    pub fn new(page: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
        }
    }
}

/// A bounded span of document words, the unit stored in and returned by a
/// [`SimilarityIndex`](crate::index::SimilarityIndex).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Stable identifier, `p<page>-c<index>`.
    pub chunk_id: String,
    /// Chunk words joined by single spaces.
    pub content: String,
    /// 1-based page the chunk was taken from.
    pub page: u32,
}

impl DocumentChunk {
    /// The `[p.<page>]` marker used in context blocks and transcripts.
    pub fn citation(&self) -> String {
        citation_marker(self.page)
    }
}

/// Format the citation marker for a page.
pub fn citation_marker(page: u32) -> String {
    format!("[p.{}]", page)
}

/// One participant turn in the debate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: String,
    pub message: String,
    /// Deduplicated markers of the context used for this turn, first-seen order.
    #[serde(default)]
    pub citations: Vec<String>,
}

impl ConversationTurn {
    pub fn new(
        speaker: impl Into<String>,
        message: impl Into<String>,
        citations: Vec<String>,
    ) -> Self {
        Self {
            speaker: speaker.into(),
            message: message.into(),
            citations,
        }
    }

    /// The `speaker: message` line handed to participants as history.
    pub fn history_line(&self) -> String {
        format!("{}: {}", self.speaker, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn citation_uses_page_marker() {
        let chunk = DocumentChunk {
            chunk_id: "p7-c0".to_string(),
            content: "text".to_string(),
            page: 7,
        };
        assert_eq!(chunk.citation(), "[p.7]");
    }

    #[test]
    fn history_line_prefixes_speaker() {
        let turn = ConversationTurn::new("Reviewer B", "Show me the data.", vec![]);
        assert_eq!(turn.history_line(), "Reviewer B: Show me the data.");
    }
}
