//! In-memory [`VectorStore`] implementation for tests and dry runs.
//!
//! Uses a `HashMap` behind `std::sync::RwLock` for thread safety. Queries
//! are brute-force cosine distance over all stored vectors.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::models::{Chunk, RetrievedChunk};

use super::{check_lengths, VectorStore};

struct StoredChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// In-memory vector store.
pub struct InMemoryVectorStore {
    entries: RwLock<HashMap<String, StoredChunk>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory vector store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        check_lengths(chunks, vectors)?;
        let mut entries = self.entries.write().map_err(poisoned)?;
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            entries.insert(
                chunk.chunk_id.clone(),
                StoredChunk {
                    chunk: chunk.clone(),
                    vector: vector.clone(),
                },
            );
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let entries = self.entries.read().map_err(poisoned)?;
        let mut scored: Vec<RetrievedChunk> = entries
            .values()
            .map(|e| RetrievedChunk {
                id: e.chunk.chunk_id.clone(),
                text: e.chunk.text.clone(),
                source_filename: e.chunk.source_filename.clone(),
                distance: cosine_distance(vector, &e.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }

    async fn stale_chunk_ids(&self, chunks: &[Chunk]) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(chunks
            .iter()
            .filter(|c| {
                entries
                    .get(&c.chunk_id)
                    .map_or(true, |e| e.chunk.hash != c.hash)
            })
            .map(|c| c.chunk_id.clone())
            .collect())
    }
}
