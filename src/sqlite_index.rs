//! SQLite-backed [`SimilarityIndex`].
//!
//! One table holds every collection:
//!
//! ```sql
//! CREATE TABLE chunks (
//!     collection TEXT NOT NULL,
//!     chunk_id   TEXT NOT NULL,
//!     content    TEXT NOT NULL,
//!     page       INTEGER NOT NULL,
//!     embedding  BLOB NOT NULL,
//!     seq        INTEGER NOT NULL,
//!     PRIMARY KEY (collection, chunk_id)
//! );
//! ```
//!
//! Embeddings are little-endian `f32` BLOBs. Search loads the collection's
//! vectors and ranks by cosine similarity; ties keep insertion order (`seq`).
//!
//! An index whose storage could not be opened is *detached*: `reset` is a
//! no-op, `upsert` fails with [`IndexError::Uninitialized`], and
//! `similarity_search` returns no chunks.

use anyhow::Result;
use async_trait::async_trait;
use debator_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use debator_core::index::{IndexError, SimilarityIndex, COLLECTION_NAME};
use debator_core::models::DocumentChunk;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::Arc;

use crate::db;

pub struct SqliteIndex {
    pool: Option<SqlitePool>,
    embedder: Arc<dyn Embedder>,
    collection: String,
}

impl SqliteIndex {
    /// Open (or create) the index file and its schema.
    pub async fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let pool = db::connect(path).await?;
        ensure_schema(&pool).await?;
        Ok(Self {
            pool: Some(pool),
            embedder,
            collection: COLLECTION_NAME.to_string(),
        })
    }

    /// An index with no storage behind it.
    pub fn detached(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            pool: None,
            embedder,
            collection: COLLECTION_NAME.to_string(),
        }
    }

    /// Open the index for reading, falling back to a detached index (with a
    /// warning) when storage is unavailable.
    pub async fn open_or_detach(path: &Path, embedder: Arc<dyn Embedder>) -> Self {
        match Self::open(path, Arc::clone(&embedder)).await {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %format!("{:#}", e),
                    "similarity index unavailable; continuing without retrieval"
                );
                Self::detached(embedder)
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.pool.is_some()
    }

    /// Number of chunks stored in this index's collection.
    pub async fn count(&self) -> Result<i64, IndexError> {
        let Some(pool) = &self.pool else {
            return Ok(0);
        };
        let row = sqlx::query("SELECT COUNT(*) AS n FROM chunks WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(pool)
            .await
            .map_err(storage_error)?;
        Ok(row.get::<i64, _>("n"))
    }
}

async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS chunks (
            collection TEXT NOT NULL,
            chunk_id TEXT NOT NULL,
            content TEXT NOT NULL,
            page INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            seq INTEGER NOT NULL,
            PRIMARY KEY (collection, chunk_id)
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

fn storage_error(e: sqlx::Error) -> IndexError {
    IndexError::Storage(e.to_string())
}

#[async_trait]
impl SimilarityIndex for SqliteIndex {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn reset(&self) -> Result<(), IndexError> {
        let Some(pool) = &self.pool else {
            return Ok(());
        };
        sqlx::query("DELETE FROM chunks WHERE collection = ?")
            .bind(&self.collection)
            .execute(pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn upsert(&self, chunks: &[DocumentChunk]) -> Result<usize, IndexError> {
        let pool = self.pool.as_ref().ok_or(IndexError::Uninitialized)?;
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(IndexError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let mut tx = pool.begin().await.map_err(storage_error)?;

        let next_seq: i64 = sqlx::query("SELECT COALESCE(MAX(seq), -1) + 1 AS next FROM chunks")
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_error)?
            .get("next");

        for (offset, (chunk, vector)) in chunks.iter().zip(&vectors).enumerate() {
            // Replacing an id keeps its original seq.
            sqlx::query(
                "INSERT INTO chunks (collection, chunk_id, content, page, embedding, seq)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(collection, chunk_id) DO UPDATE SET
                    content = excluded.content,
                    page = excluded.page,
                    embedding = excluded.embedding",
            )
            .bind(&self.collection)
            .bind(&chunk.chunk_id)
            .bind(&chunk.content)
            .bind(chunk.page as i64)
            .bind(vec_to_blob(vector))
            .bind(next_seq + offset as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)?;
        tracing::debug!(count = chunks.len(), collection = %self.collection, "upserted chunks");
        Ok(chunks.len())
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<DocumentChunk>, IndexError> {
        let Some(pool) = &self.pool else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT chunk_id, content, page, embedding FROM chunks
             WHERE collection = ? ORDER BY seq",
        )
        .bind(&self.collection)
        .fetch_all(pool)
        .await
        .map_err(storage_error)?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_query(query).await?;

        let mut scored: Vec<(f32, DocumentChunk)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let score = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                let chunk = DocumentChunk {
                    chunk_id: row.get("chunk_id"),
                    content: row.get("content"),
                    page: row.get::<i64, _>("page") as u32,
                };
                (score, chunk)
            })
            .collect();

        // Stable sort: equal scores keep seq order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, chunk)| chunk).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debator_core::embedding::HashEmbedder;
    use tempfile::TempDir;

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(HashEmbedder::new(256))
    }

    fn chunk(id: &str, page: u32, content: &str) -> DocumentChunk {
        DocumentChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            page,
        }
    }

    async fn open(tmp: &TempDir) -> SqliteIndex {
        SqliteIndex::open(&tmp.path().join("index.sqlite"), embedder())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_and_search() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp).await;

        let stored = index
            .upsert(&[
                chunk("p1-c0", 1, "mitochondria produce energy for the cell"),
                chunk("p2-c0", 2, "cells divide faster under nutrient stress"),
                chunk("p3-c0", 3, "the telescope observed distant galaxies"),
            ])
            .await
            .unwrap();
        assert_eq!(stored, 3);

        let results = index.similarity_search("why do cells divide faster", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, "p2-c0");
        assert_eq!(results[0].page, 2);
    }

    #[tokio::test]
    async fn test_upsert_same_id_keeps_one_record() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp).await;

        index.upsert(&[chunk("p1-c0", 1, "first version")]).await.unwrap();
        index.upsert(&[chunk("p1-c0", 1, "second version")]).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let results = index.similarity_search("version", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "second version");
    }

    #[tokio::test]
    async fn test_reset_twice_leaves_empty() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp).await;

        index.upsert(&[chunk("p1-c0", 1, "text")]).await.unwrap();
        index.reset().await.unwrap();
        index.reset().await.unwrap();

        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.similarity_search("text", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reopen_recovers_chunks() {
        let tmp = TempDir::new().unwrap();
        {
            let index = open(&tmp).await;
            index
                .upsert(&[chunk("p4-c0", 4, "persisted across runs")])
                .await
                .unwrap();
        }

        let reopened = open(&tmp).await;
        let results = reopened.similarity_search("persisted", 3).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].page, 4);
    }

    #[tokio::test]
    async fn test_empty_index_search() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp).await;
        assert!(index.similarity_search("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detached_index() {
        let index = SqliteIndex::detached(embedder());
        assert!(!index.is_attached());
        assert!(index.reset().await.is_ok());
        assert!(index.similarity_search("q", 3).await.unwrap().is_empty());
        let err = index.upsert(&[chunk("p1-c0", 1, "x")]).await.unwrap_err();
        assert!(matches!(err, IndexError::Uninitialized));
    }

    #[tokio::test]
    async fn test_collection_name() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(open(&tmp).await.collection_name(), "debate");
    }
}
