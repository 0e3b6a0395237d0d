//! Similarity index abstraction.
//!
//! The [`SimilarityIndex`] trait is the minimal contract the debate needs
//! from a vector store: reset the collection, upsert chunks, and answer
//! "k most similar chunks to this text". Implementations own embedding and
//! persistence; callers only see [`DocumentChunk`]s.
//!
//! # Failure semantics
//!
//! | Operation | Uninitialized index |
//! |-----------|---------------------|
//! | [`reset`](SimilarityIndex::reset) | no-op |
//! | [`upsert`](SimilarityIndex::upsert) | [`IndexError::Uninitialized`] |
//! | [`similarity_search`](SimilarityIndex::similarity_search) | empty result |

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::DocumentChunk;

/// Fixed name of the collection holding the ingested paper.
pub const COLLECTION_NAME: &str = "debate";

/// Errors raised by index implementations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("similarity index is not initialized")]
    Uninitialized,
    #[error("index storage error: {0}")]
    Storage(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
}

/// Storage and nearest-neighbor retrieval of document chunks.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Name of the collection this index reads and writes.
    fn collection_name(&self) -> &str {
        COLLECTION_NAME
    }

    /// Remove the stored collection. Idempotent.
    async fn reset(&self) -> Result<(), IndexError>;

    /// Store chunks, replacing any existing record with the same id.
    ///
    /// Returns the number of chunks written.
    async fn upsert(&self, chunks: &[DocumentChunk]) -> Result<usize, IndexError>;

    /// Up to `k` chunks ordered from most to least similar to `query`.
    ///
    /// Returns an empty vector when the index holds no chunks.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<DocumentChunk>, IndexError>;
}
