//! Vector store abstraction.
//!
//! The [`VectorStore`] trait holds chunks with their embedding vectors and
//! answers nearest-neighbour queries. Backends are pluggable: the app crate
//! provides a SQLite store, and [`memory::InMemoryVectorStore`] serves tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, RetrievedChunk};

/// Persistent chunk + vector collection.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](VectorStore::add) | Upsert chunks with their vectors |
/// | [`query`](VectorStore::query) | `k` nearest chunks to a vector |
/// | [`count`](VectorStore::count) | Number of stored chunks |
/// | [`stale_chunk_ids`](VectorStore::stale_chunk_ids) | Chunks needing (re-)embedding |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace each chunk (keyed by `chunk_id`) with its vector.
    ///
    /// `chunks` and `vectors` must have the same length.
    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Up to `k` chunks ordered by ascending cosine distance to `vector`.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>>;

    /// Number of chunks currently stored.
    async fn count(&self) -> Result<usize>;

    /// Ids of `chunks` whose stored text hash differs from the given chunk
    /// or that have no stored vector.
    ///
    /// The default reports every chunk as stale.
    async fn stale_chunk_ids(&self, chunks: &[Chunk]) -> Result<Vec<String>> {
        Ok(chunks.iter().map(|c| c.chunk_id.clone()).collect())
    }
}

/// Reject mismatched `add` inputs before touching a backend.
pub fn check_lengths(chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
    if chunks.len() != vectors.len() {
        anyhow::bail!(
            "chunk/vector count mismatch: {} chunks, {} vectors",
            chunks.len(),
            vectors.len()
        );
    }
    Ok(())
}
