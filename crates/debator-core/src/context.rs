//! Citation-annotated context assembly.
//!
//! Turns a query into the `Context:` block injected ahead of a participant's
//! message. Each retrieved chunk becomes one line prefixed with its page
//! marker, in the index's relevance order:
//!
//! ```text
//! [p.2] Cells divide faster under nutrient stress.
//! [p.5] Growth rate doubled in the treated cohort.
//! [p.2] Division accelerates after the lag phase.
//! ```
//!
//! The citation list for the example is `["[p.2]", "[p.5]"]`: markers are
//! deduplicated, first-seen order.

use serde::Serialize;

use crate::index::SimilarityIndex;
use crate::models::DocumentChunk;

pub const DEFAULT_TOP_K: usize = 3;

/// Context block plus the citation markers it was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetrievedContext {
    pub text: String,
    pub citations: Vec<String>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Retrieves top-k chunks for a query and formats them with citations.
pub struct ContextAssembler<'a> {
    index: Option<&'a dyn SimilarityIndex>,
    top_k: usize,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(index: Option<&'a dyn SimilarityIndex>, top_k: usize) -> Self {
        Self { index, top_k }
    }

    /// An assembler with no index; every query yields an empty context.
    pub fn without_index() -> Self {
        Self {
            index: None,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Build the context for `query`.
    ///
    /// Blank queries and a missing index return an empty context without
    /// touching the index. A failed search degrades to an empty context so
    /// the debate can continue ungrounded.
    pub async fn assemble(&self, query: &str) -> RetrievedContext {
        let index = match self.index {
            Some(index) if !query.trim().is_empty() => index,
            _ => return RetrievedContext::default(),
        };

        match index.similarity_search(query, self.top_k).await {
            Ok(chunks) if chunks.is_empty() => RetrievedContext::default(),
            Ok(chunks) => format_chunks(&chunks),
            Err(e) => {
                tracing::warn!(error = %e, "similarity search failed; continuing without context");
                RetrievedContext::default()
            }
        }
    }
}

/// Format ranked chunks into a context block and deduplicated citations.
pub fn format_chunks(chunks: &[DocumentChunk]) -> RetrievedContext {
    let mut lines = Vec::with_capacity(chunks.len());
    let mut citations: Vec<String> = Vec::new();

    for chunk in chunks {
        let marker = chunk.citation();
        let snippet = chunk.content.replace(['\r', '\n'], " ");
        lines.push(format!("{} {}", marker, snippet.trim()));
        if !citations.contains(&marker) {
            citations.push(marker);
        }
    }

    RetrievedContext {
        text: lines.join("\n"),
        citations,
    }
}
