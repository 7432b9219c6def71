//! Embedding and storing chunks.

use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::{debug, info};

use loyalty_monitor_core::embedding::Embedder;
use loyalty_monitor_core::models::Chunk;
use loyalty_monitor_core::store::VectorStore;

/// Counts from one indexing pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub embedded: usize,
    /// Chunks whose stored text and vector were already current.
    pub unchanged: usize,
}

/// Embed the chunks the store reports as stale and add them, in batches.
///
/// Any batch failure aborts indexing: the store keeps earlier batches, and
/// the next run picks up from the stale set.
pub async fn index_chunks(
    chunks: &[Chunk],
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    batch_size: usize,
) -> Result<IndexStats> {
    let stale: HashSet<String> = store.stale_chunk_ids(chunks).await?.into_iter().collect();
    let pending: Vec<Chunk> = chunks
        .iter()
        .filter(|c| stale.contains(&c.chunk_id))
        .cloned()
        .collect();

    let mut stats = IndexStats {
        embedded: 0,
        unchanged: chunks.len() - pending.len(),
    };

    for batch in pending.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await.with_context(|| {
            format!(
                "Embedding failed for batch starting at {}",
                batch[0].chunk_id
            )
        })?;
        store
            .add(batch, &vectors)
            .await
            .context("Failed to store embedded chunks")?;
        stats.embedded += batch.len();
        debug!(done = stats.embedded, total = pending.len(), "embedded batch");
    }

    info!(
        embedded = stats.embedded,
        unchanged = stats.unchanged,
        model = embedder.model_name(),
        "indexed chunks"
    );
    Ok(stats)
}
