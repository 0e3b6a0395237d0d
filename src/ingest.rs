//! Paper ingestion: extract pages, chunk, and store in the similarity index.
//!
//! ```text
//! paper ──▶ source::read_pages ──▶ chunk_pages ──▶ SimilarityIndex::upsert (batched)
//! ```
//!
//! The collection is reset before anything is stored, so each run replaces
//! the previous paper entirely.

use anyhow::Result;
use debator_core::chunk::{chunk_pages, ChunkParams, ChunkStrategy};
use debator_core::index::SimilarityIndex;
use debator_core::models::{DocumentChunk, PageText};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::progress::{IngestProgressEvent, IngestProgressReporter, ProgressMode};
use crate::source;
use crate::sqlite_index::SqliteIndex;

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Reset the index and store every chunk of `pages` in batches of
/// `batch_size`. Returns the number of chunks stored.
pub async fn ingest_pages(
    index: &dyn SimilarityIndex,
    pages: &[PageText],
    params: ChunkParams,
    strategy: ChunkStrategy,
    batch_size: usize,
    progress: &dyn IngestProgressReporter,
) -> Result<usize> {
    index.reset().await?;

    let chunks: Vec<DocumentChunk> = chunk_pages(pages, params, strategy).collect();
    if chunks.is_empty() {
        return Ok(0);
    }

    let total = chunks.len() as u64;
    let mut stored = 0usize;
    for batch in chunks.chunks(batch_size.max(1)) {
        stored += index.upsert(batch).await?;
        progress.report(IngestProgressEvent::Storing {
            n: stored as u64,
            total,
        });
    }

    Ok(stored)
}

/// `debator ingest`.
pub async fn run_ingest(cfg: &Config, batch_size: usize, progress: ProgressMode) -> Result<()> {
    let reporter = progress.reporter();

    reporter.report(IngestProgressEvent::Extracting {
        path: cfg.paper.path.display().to_string(),
    });
    let pages = source::read_pages(&cfg.paper.path)?;
    tracing::info!(pages = pages.len(), path = %cfg.paper.path.display(), "extracted paper");

    let embedder = create_embedder(&cfg.embedding)?;
    let index = SqliteIndex::open(&cfg.index_path(), embedder).await?;

    let stored = ingest_pages(
        &index,
        &pages,
        cfg.chunk_params(),
        cfg.retrieval.chunk_strategy,
        batch_size,
        reporter.as_ref(),
    )
    .await?;

    if stored == 0 {
        println!("No chunks to ingest.");
    } else {
        println!(
            "Ingestion complete. Stored {} chunks in collection '{}'.",
            stored,
            index.collection_name()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use debator_core::embedding::HashEmbedder;
    use debator_core::index::memory::InMemoryIndex;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<IngestProgressEvent>>,
    }

    impl IngestProgressReporter for Recorder {
        fn report(&self, event: IngestProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[tokio::test]
    async fn test_batches_and_progress() {
        let index = InMemoryIndex::new(HashEmbedder::new(64));
        let pages = vec![PageText::new(1, words(10)), PageText::new(2, words(10))];
        let recorder = Recorder::default();

        // 5 chunks per page with size 2, no overlap.
        let stored = ingest_pages(
            &index,
            &pages,
            ChunkParams::new(2, 0),
            ChunkStrategy::Page,
            4,
            &recorder,
        )
        .await
        .unwrap();

        assert_eq!(stored, 10);
        assert_eq!(index.len(), 10);
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![
                IngestProgressEvent::Storing { n: 4, total: 10 },
                IngestProgressEvent::Storing { n: 8, total: 10 },
                IngestProgressEvent::Storing { n: 10, total: 10 },
            ]
        );
    }

    #[tokio::test]
    async fn test_reingest_replaces_previous_paper() {
        let index = InMemoryIndex::new(HashEmbedder::new(64));
        let params = ChunkParams::new(3, 0);

        ingest_pages(
            &index,
            &[PageText::new(1, words(9))],
            params,
            ChunkStrategy::Page,
            100,
            &Recorder::default(),
        )
        .await
        .unwrap();
        assert_eq!(index.len(), 3);

        ingest_pages(
            &index,
            &[PageText::new(1, words(3))],
            params,
            ChunkStrategy::Page,
            100,
            &Recorder::default(),
        )
        .await
        .unwrap();
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_paper_stores_nothing() {
        let index = InMemoryIndex::new(HashEmbedder::new(64));
        index
            .upsert(&[DocumentChunk {
                chunk_id: "p1-c0".to_string(),
                content: "stale".to_string(),
                page: 1,
            }])
            .await
            .unwrap();

        let stored = ingest_pages(
            &index,
            &[PageText::new(1, "   \n "), PageText::new(2, "")],
            ChunkParams::default(),
            ChunkStrategy::Page,
            100,
            &Recorder::default(),
        )
        .await
        .unwrap();

        assert_eq!(stored, 0);
        assert!(index.is_empty());
    }
}
