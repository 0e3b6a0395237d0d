//! Sliding word-window chunker with page-citation tracking.
//!
//! Splits page text into overlapping [`DocumentChunk`]s of `chunk_size`
//! whitespace-delimited words. Consecutive windows share `chunk_overlap`
//! words; the final window of a run may be shorter than `chunk_size`.
//!
//! Two strategies are supported:
//!
//! - [`ChunkStrategy::Page`] (default) windows each page independently, so
//!   every chunk lies entirely on the page it cites. Chunk indices reset per
//!   page.
//! - [`ChunkStrategy::Document`] windows the concatenated words of all pages,
//!   letting chunks span page breaks. A chunk cites the page of its first
//!   word, looked up in an exact word-index → page table. Chunk indices run
//!   across the whole document.
//!
//! Both produce chunk ids of the form `p<page>-c<index>`.
//!
//! # Example
//!
//! ```rust
//! use debator_core::chunk::{chunk_pages, ChunkParams, ChunkStrategy};
//! use debator_core::models::PageText;
//!
//! let pages = vec![PageText::new(1, "one two three four five")];
//! let params = ChunkParams::new(3, 1);
//! let chunks: Vec<_> = chunk_pages(&pages, params, ChunkStrategy::Page).collect();
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[0].content, "one two three");
//! assert_eq!(chunks[1].content, "three four five");
//! assert_eq!(chunks[1].chunk_id, "p1-c1");
//! ```

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::models::{DocumentChunk, PageText};

pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Window parameters after coercion.
///
/// `size` is at least 1 and `overlap` is strictly less than `size` (or 0 when
/// `size == 1`), so the window always advances by at least one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    size: usize,
    overlap: usize,
}

impl ChunkParams {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let size = chunk_size.max(1);
        let overlap = if size > 1 {
            chunk_overlap.min(size - 1)
        } else {
            0
        };
        Self { size, overlap }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Words the window advances between consecutive chunks.
    pub fn step(&self) -> usize {
        (self.size - self.overlap).max(1)
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

/// How chunk windows relate to page boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    #[default]
    Page,
    Document,
}

/// Chunk id for the `index`-th chunk attributed to `page`.
pub fn chunk_id(page: u32, index: usize) -> String {
    format!("p{}-c{}", page, index)
}

/// Lazily chunk `pages` with the given parameters and strategy.
///
/// The returned iterator is finite and `Clone`; cloning it (or calling this
/// function again) restarts the sequence from the same position.
pub fn chunk_pages(pages: &[PageText], params: ChunkParams, strategy: ChunkStrategy) -> Chunks<'_> {
    let inner = match strategy {
        ChunkStrategy::Page => ChunksInner::Page(PageChunks::new(pages, params)),
        ChunkStrategy::Document => ChunksInner::Document(DocumentChunks::new(pages, params)),
    };
    Chunks { inner }
}

/// Iterator over the chunks of a document.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    inner: ChunksInner<'a>,
}

#[derive(Debug, Clone)]
enum ChunksInner<'a> {
    Page(PageChunks<'a>),
    Document(DocumentChunks<'a>),
}

impl Iterator for Chunks<'_> {
    type Item = DocumentChunk;

    fn next(&mut self) -> Option<DocumentChunk> {
        match &mut self.inner {
            ChunksInner::Page(it) => it.next(),
            ChunksInner::Document(it) => it.next(),
        }
    }
}

/// Word ranges of a sliding window over `total` words.
#[derive(Debug, Clone)]
struct Windows {
    total: usize,
    size: usize,
    step: usize,
    next_start: Option<usize>,
}

impl Windows {
    fn new(total: usize, params: ChunkParams) -> Self {
        Self {
            total,
            size: params.size(),
            step: params.step(),
            next_start: Some(0),
        }
    }
}

impl Iterator for Windows {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        let start = self.next_start?;
        if start >= self.total {
            self.next_start = None;
            return None;
        }
        let end = (start + self.size).min(self.total);
        self.next_start = if end >= self.total {
            None
        } else {
            Some(start + self.step)
        };
        Some(start..end)
    }
}

#[derive(Debug, Clone)]
struct PageCursor<'a> {
    page: u32,
    words: Vec<&'a str>,
    windows: Windows,
    index: usize,
}

/// Page-scoped chunking: one independent window run per page.
#[derive(Debug, Clone)]
pub struct PageChunks<'a> {
    pages: std::slice::Iter<'a, PageText>,
    params: ChunkParams,
    current: Option<PageCursor<'a>>,
}

impl<'a> PageChunks<'a> {
    fn new(pages: &'a [PageText], params: ChunkParams) -> Self {
        Self {
            pages: pages.iter(),
            params,
            current: None,
        }
    }
}

impl Iterator for PageChunks<'_> {
    type Item = DocumentChunk;

    fn next(&mut self) -> Option<DocumentChunk> {
        loop {
            if let Some(cursor) = self.current.as_mut() {
                if let Some(range) = cursor.windows.next() {
                    let chunk = DocumentChunk {
                        chunk_id: chunk_id(cursor.page, cursor.index),
                        content: cursor.words[range].join(" "),
                        page: cursor.page,
                    };
                    cursor.index += 1;
                    return Some(chunk);
                }
                self.current = None;
            }

            let page = self.pages.next()?;
            let words: Vec<&str> = page.text.split_whitespace().collect();
            if words.is_empty() {
                continue;
            }
            self.current = Some(PageCursor {
                page: page.page,
                windows: Windows::new(words.len(), self.params),
                words,
                index: 0,
            });
        }
    }
}

/// Document-scoped chunking: one window run over all pages' words.
#[derive(Debug, Clone)]
pub struct DocumentChunks<'a> {
    words: Vec<&'a str>,
    /// `word_pages[i]` is the page word `i` came from.
    word_pages: Vec<u32>,
    windows: Windows,
    index: usize,
}

impl<'a> DocumentChunks<'a> {
    fn new(pages: &'a [PageText], params: ChunkParams) -> Self {
        let mut words = Vec::new();
        let mut word_pages = Vec::new();
        for page in pages {
            for word in page.text.split_whitespace() {
                words.push(word);
                word_pages.push(page.page);
            }
        }
        let windows = Windows::new(words.len(), params);
        Self {
            words,
            word_pages,
            windows,
            index: 0,
        }
    }
}

impl Iterator for DocumentChunks<'_> {
    type Item = DocumentChunk;

    fn next(&mut self) -> Option<DocumentChunk> {
        let range = self.windows.next()?;
        let page = self.word_pages[range.start];
        let chunk = DocumentChunk {
            chunk_id: chunk_id(page, self.index),
            content: self.words[range].join(" "),
            page,
        };
        self.index += 1;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn page_chunks(text: &str, size: usize, overlap: usize) -> Vec<DocumentChunk> {
        let pages = vec![PageText::new(1, text)];
        chunk_pages(&pages, ChunkParams::new(size, overlap), ChunkStrategy::Page).collect()
    }

    fn expected_count(total: usize, size: usize, step: usize) -> usize {
        if total <= size {
            1
        } else {
            (total - size).div_ceil(step) + 1
        }
    }

    #[test]
    fn test_chunk_count_matches_window_formula() {
        for size in 1..=7 {
            for overlap in 0..size {
                for total in 1..=30 {
                    let chunks = page_chunks(&words(total), size, overlap);
                    let step = size - overlap;
                    assert_eq!(
                        chunks.len(),
                        expected_count(total, size, step),
                        "size={} overlap={} total={}",
                        size,
                        overlap,
                        total
                    );
                }
            }
        }
    }

    #[test]
    fn test_full_windows_and_exact_overlap() {
        let size = 5;
        let overlap = 2;
        let chunks = page_chunks(&words(23), size, overlap);
        let split: Vec<Vec<&str>> = chunks
            .iter()
            .map(|c| c.content.split(' ').collect())
            .collect();

        for w in &split[..split.len() - 1] {
            assert_eq!(w.len(), size);
        }
        for pair in split.windows(2) {
            let tail = &pair[0][pair[0].len() - overlap..];
            assert_eq!(tail, &pair[1][..overlap]);
        }
        assert_eq!(split.last().unwrap().last(), Some(&"w22"));
    }

    #[test]
    fn test_short_page_single_chunk() {
        let chunks = page_chunks("Cells divide faster.", 800, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Cells divide faster.");
        assert_eq!(chunks[0].chunk_id, "p1-c0");
        assert_eq!(chunks[0].page, 1);
    }

    #[test]
    fn test_whitespace_normalized_to_single_spaces() {
        let chunks = page_chunks("alpha\n\n beta\tgamma   delta", 10, 0);
        assert_eq!(chunks[0].content, "alpha beta gamma delta");
    }

    #[test]
    fn test_empty_document() {
        let pages: Vec<PageText> = Vec::new();
        let chunks: Vec<_> =
            chunk_pages(&pages, ChunkParams::default(), ChunkStrategy::Page).collect();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_whitespace_pages_skipped() {
        let pages = vec![
            PageText::new(1, "   \n\t "),
            PageText::new(2, "second page words"),
            PageText::new(3, ""),
            PageText::new(4, "fourth"),
        ];
        let chunks: Vec<_> =
            chunk_pages(&pages, ChunkParams::new(10, 0), ChunkStrategy::Page).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, 2);
        assert_eq!(chunks[0].chunk_id, "p2-c0");
        assert_eq!(chunks[1].page, 4);
        assert_eq!(chunks[1].chunk_id, "p4-c0");
    }

    #[test]
    fn test_index_resets_per_page() {
        let pages = vec![PageText::new(1, words(6)), PageText::new(2, words(6))];
        let ids: Vec<String> = chunk_pages(&pages, ChunkParams::new(3, 0), ChunkStrategy::Page)
            .map(|c| c.chunk_id)
            .collect();
        assert_eq!(ids, vec!["p1-c0", "p1-c1", "p2-c0", "p2-c1"]);
    }

    #[test]
    fn test_overlap_clamped() {
        let params = ChunkParams::new(4, 10);
        assert_eq!(params.overlap(), 3);
        assert_eq!(params.step(), 1);

        let params = ChunkParams::new(0, 5);
        assert_eq!(params.size(), 1);
        assert_eq!(params.overlap(), 0);
        assert_eq!(params.step(), 1);

        // Terminates and advances one word at a time.
        let chunks = page_chunks(&words(6), 4, 10);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_restartable() {
        let pages = vec![PageText::new(1, words(20))];
        let it = chunk_pages(&pages, ChunkParams::new(5, 2), ChunkStrategy::Page);
        let first: Vec<_> = it.clone().collect();
        let second: Vec<_> = it.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_deterministic() {
        let pages = vec![PageText::new(1, words(40)), PageText::new(2, words(9))];
        let a: Vec<_> =
            chunk_pages(&pages, ChunkParams::new(8, 3), ChunkStrategy::Page).collect();
        let b: Vec<_> =
            chunk_pages(&pages, ChunkParams::new(8, 3), ChunkStrategy::Page).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_document_strategy_spans_pages() {
        let pages = vec![
            PageText::new(1, "a b c"),
            PageText::new(2, "   "),
            PageText::new(3, "d e f g"),
        ];
        let chunks: Vec<_> =
            chunk_pages(&pages, ChunkParams::new(4, 1), ChunkStrategy::Document).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "a b c d");
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[0].chunk_id, "p1-c0");
        assert_eq!(chunks[1].content, "d e f g");
        assert_eq!(chunks[1].page, 3);
        assert_eq!(chunks[1].chunk_id, "p3-c1");
    }

    #[test]
    fn test_document_strategy_repeated_words_map_to_exact_page() {
        // The same word on both pages must not confuse page attribution.
        let pages = vec![PageText::new(1, "cell cell"), PageText::new(2, "cell cell")];
        let chunks: Vec<_> =
            chunk_pages(&pages, ChunkParams::new(1, 0), ChunkStrategy::Document).collect();
        let pages_seen: Vec<u32> = chunks.iter().map(|c| c.page).collect();
        assert_eq!(pages_seen, vec![1, 1, 2, 2]);
    }
}
