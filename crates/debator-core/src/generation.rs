//! Text generation abstraction and conversational history windowing.
//!
//! A [`GenerationBackend`] turns a prompt plus prior turns into text. Every
//! backend folds history in the same way, via [`HistoryWindow`]: only the
//! most recent turns that fit a character budget are kept, whole, and placed
//! ahead of the prompt.
//!
//! # Budget
//!
//! The budget is configured in approximate tokens and converted to
//! characters at [`CHARS_PER_TOKEN`]. Entries are measured in `char`s.
//!
//! ```rust
//! use debator_core::generation::HistoryWindow;
//!
//! let window = HistoryWindow::new(3); // 12 characters
//! let history = vec!["aaaaaaaa".to_string(), "bbbb".to_string(), "cccc".to_string()];
//! assert_eq!(window.select(&history), &history[1..]);
//! assert_eq!(window.fold("Q", &history), "bbbb\n\ncccc\n\nQ");
//! ```

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

/// Approximate characters per token.
pub const CHARS_PER_TOKEN: usize = 4;

pub const DEFAULT_MAX_HISTORY_TOKENS: usize = 2000;

/// Errors raised while generating text. Never retried by the caller.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),
    #[error("generation backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed generation response: {0}")]
    Decode(String),
    #[error("generation failed: {0}")]
    Backend(String),
}

/// Ordered, finite sequence of generated text fragments.
pub type FragmentStream<'a> =
    Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send + 'a>>;

/// Recency-biased history budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    max_tokens: usize,
}

impl HistoryWindow {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn char_budget(&self) -> usize {
        self.max_tokens.saturating_mul(CHARS_PER_TOKEN)
    }

    /// The longest suffix of `history` whose total size fits the budget.
    pub fn select<'h>(&self, history: &'h [String]) -> &'h [String] {
        let budget = self.char_budget();
        let mut used = 0usize;
        let mut start = history.len();
        for (i, entry) in history.iter().enumerate().rev() {
            let len = entry.chars().count();
            if used + len > budget {
                break;
            }
            used += len;
            start = i;
        }
        &history[start..]
    }

    /// The full prompt sent to a model: selected history, then `prompt`.
    pub fn fold(&self, prompt: &str, history: &[String]) -> String {
        let recent = self.select(history);
        if recent.is_empty() {
            return prompt.to_string();
        }
        format!("{}\n\n{}", recent.join("\n\n"), prompt)
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_TOKENS)
    }
}

/// Text-generation capability used by debate participants.
///
/// `history` is assembled by the caller for each call, oldest first; a
/// backend holds no conversational state between calls.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Model identifier, for logs.
    fn model(&self) -> &str;

    /// Generate the complete reply to `prompt`.
    async fn generate(&self, prompt: &str, history: &[String]) -> Result<String, GenerationError>;

    /// Generate the reply as incremental fragments.
    ///
    /// Concatenating the fragments yields the same content as
    /// [`generate`](Self::generate). The default yields that result as a
    /// single fragment.
    fn generate_stream<'a>(&'a self, prompt: String, history: &'a [String]) -> FragmentStream<'a> {
        Box::pin(futures::stream::once(async move {
            self.generate(&prompt, history).await
        }))
    }
}
