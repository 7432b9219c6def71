//! Similarity retrieval for a text query.

use anyhow::Result;

use loyalty_monitor_core::embedding::Embedder;
use loyalty_monitor_core::models::RetrievedChunk;
use loyalty_monitor_core::store::VectorStore;

use crate::embedding::embed_query;

/// Embed `query` once and return the `k` nearest stored chunks.
pub async fn retrieve(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    query: &str,
    k: usize,
) -> Result<Vec<RetrievedChunk>> {
    let vector = embed_query(embedder, query).await?;
    store.query(&vector, k).await
}
