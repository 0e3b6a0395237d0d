//! Page-text sources for the paper being debated.
//!
//! | Extension | Pages |
//! |-----------|-------|
//! | `.pdf` | one per PDF page, via `pdf-extract` |
//! | `.txt`, `.md` | split on form feed (`\x0c`) |
//!
//! Pages are numbered from 1 in document order. Unknown extensions are
//! treated as plain text.

use anyhow::{Context, Result};
use debator_core::models::PageText;
use std::path::Path;

const FORM_FEED: char = '\x0c';

/// Read `path` into ordered page texts.
///
/// An unreadable or unparseable document is an error. A document with no
/// extractable text yields pages whose text is empty.
pub fn read_pages(path: &Path) -> Result<Vec<PageText>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read paper: {}", path.display()))?;

    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if is_pdf {
        pdf_pages(&bytes).with_context(|| format!("Failed to extract PDF text: {}", path.display()))
    } else {
        let text = String::from_utf8_lossy(&bytes);
        Ok(text_pages(&text))
    }
}

fn pdf_pages(bytes: &[u8]) -> Result<Vec<PageText>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(number_pages(pages))
}

/// Split plain text into pages at form feeds.
pub fn text_pages(text: &str) -> Vec<PageText> {
    if text.is_empty() {
        return Vec::new();
    }
    number_pages(text.split(FORM_FEED).map(str::to_string))
}

fn number_pages(pages: impl IntoIterator<Item = String>) -> Vec<PageText> {
    pages
        .into_iter()
        .zip(1u32..)
        .map(|(text, page)| PageText::new(page, text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_form_feed_pages() {
        let pages = text_pages("intro text\x0cmethods text\x0c\x0cresults");
        assert_eq!(pages.len(), 4);
        assert_eq!(pages[0], PageText::new(1, "intro text"));
        assert_eq!(pages[1].page, 2);
        assert!(pages[2].text.is_empty());
        assert_eq!(pages[3], PageText::new(4, "results"));
    }

    #[test]
    fn test_single_page_text() {
        let pages = text_pages("no page breaks here");
        assert_eq!(pages, vec![PageText::new(1, "no page breaks here")]);
    }

    #[test]
    fn test_empty_text() {
        assert!(text_pages("").is_empty());
    }

    #[test]
    fn test_read_text_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("paper.txt");
        std::fs::write(&path, "one\x0ctwo").unwrap();
        let pages = read_pages(&path).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].text, "two");
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = read_pages(Path::new("/nonexistent/paper.pdf")).unwrap_err();
        assert!(err.to_string().contains("Failed to read paper"));
    }

    #[test]
    fn test_invalid_pdf_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("paper.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        assert!(read_pages(&path).is_err());
    }
}
