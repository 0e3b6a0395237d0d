//! In-memory [`SimilarityIndex`] for tests and embedding-only runs.
//!
//! Records live in a `HashMap` keyed by chunk id behind a `std::sync::RwLock`.
//! Search is brute-force cosine similarity over every stored vector.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::{cosine_similarity, Embedder};
use crate::models::DocumentChunk;

use super::{IndexError, SimilarityIndex};

struct StoredChunk {
    chunk: DocumentChunk,
    vector: Vec<f32>,
    /// Insertion sequence, used to break score ties deterministically.
    seq: u64,
}

#[derive(Default)]
struct Records {
    chunks: HashMap<String, StoredChunk>,
    next_seq: u64,
}

/// In-memory index over an [`Embedder`].
pub struct InMemoryIndex<E> {
    embedder: E,
    records: RwLock<Records>,
}

impl<E: Embedder> InMemoryIndex<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            records: RwLock::new(Records::default()),
        }
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.read().map(|r| r.chunks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Records>, IndexError> {
        self.records
            .read()
            .map_err(|_| IndexError::Storage("index lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Records>, IndexError> {
        self.records
            .write()
            .map_err(|_| IndexError::Storage("index lock poisoned".to_string()))
    }
}

#[async_trait]
impl<E: Embedder> SimilarityIndex for InMemoryIndex<E> {
    async fn reset(&self) -> Result<(), IndexError> {
        let mut records = self.write()?;
        records.chunks.clear();
        Ok(())
    }

    async fn upsert(&self, chunks: &[DocumentChunk]) -> Result<usize, IndexError> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(IndexError::Embedding(format!(
                "expected {} vectors, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let mut records = self.write()?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let seq = match records.chunks.get(&chunk.chunk_id) {
                Some(existing) => existing.seq,
                None => {
                    records.next_seq += 1;
                    records.next_seq
                }
            };
            records.chunks.insert(
                chunk.chunk_id.clone(),
                StoredChunk {
                    chunk: chunk.clone(),
                    vector,
                    seq,
                },
            );
        }
        Ok(chunks.len())
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<DocumentChunk>, IndexError> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed_query(query).await?;

        let records = self.read()?;
        let mut scored: Vec<(f32, u64, &DocumentChunk)> = records
            .chunks
            .values()
            .map(|s| (cosine_similarity(&query_vec, &s.vector), s.seq, &s.chunk))
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, _, chunk)| chunk.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;

    fn chunk(id: &str, page: u32, content: &str) -> DocumentChunk {
        DocumentChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            page,
        }
    }

    fn index() -> InMemoryIndex<HashEmbedder> {
        InMemoryIndex::new(HashEmbedder::new(1024))
    }

    #[tokio::test]
    async fn test_search_empty_index() {
        let idx = index();
        assert!(idx.similarity_search("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_twice_leaves_empty() {
        let idx = index();
        idx.upsert(&[chunk("p1-c0", 1, "mitochondria produce energy")])
            .await
            .unwrap();
        idx.reset().await.unwrap();
        assert!(idx.is_empty());
        idx.reset().await.unwrap();
        assert!(idx.is_empty());
        assert!(idx.similarity_search("energy", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_same_id_last_write_wins() {
        let idx = index();
        assert_eq!(idx.upsert(&[chunk("p1-c0", 1, "old text")]).await.unwrap(), 1);
        assert_eq!(idx.upsert(&[chunk("p1-c0", 1, "new text")]).await.unwrap(), 1);
        assert_eq!(idx.len(), 1);
        let hits = idx.similarity_search("text", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "new text");
    }

    #[tokio::test]
    async fn test_ranked_and_truncated_to_k() {
        let idx = index();
        idx.upsert(&[
            chunk("p1-c0", 1, "Orbital mechanics of distant comets."),
            chunk("p2-c0", 2, "Cell growth accelerates in warm media."),
            chunk("p3-c0", 3, "Tidal forces and planetary rings."),
        ])
        .await
        .unwrap();

        let hits = idx.similarity_search("cell growth", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].page, 2);
    }
}
