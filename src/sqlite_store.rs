//! SQLite-backed [`VectorStore`] implementation.
//!
//! Chunks live in `chunks`, their embeddings in `chunk_vectors` as
//! little-endian f32 BLOBs. Queries are brute-force cosine distance over
//! the vectors stored for the store's embedding model.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use loyalty_monitor_core::embedding::{cosine_distance, decode_vector, encode_vector};
use loyalty_monitor_core::models::{Chunk, RetrievedChunk};
use loyalty_monitor_core::store::{check_lengths, VectorStore};

/// SQLite implementation of the [`VectorStore`] trait.
///
/// Vectors are tagged with the embedding model name so that switching
/// models never mixes incompatible vectors in one query.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    model: String,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool, model: impl Into<String>) -> Self {
        Self {
            pool,
            model: model.into(),
        }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        check_lengths(chunks, vectors)?;
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT INTO chunks (chunk_id, source_filename, text, hash, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(chunk_id) DO UPDATE SET
                    source_filename = excluded.source_filename,
                    text = excluded.text,
                    hash = excluded.hash,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.source_filename)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to store chunk {}", chunk.chunk_id))?;

            sqlx::query(
                r#"
                INSERT INTO chunk_vectors (chunk_id, model, dims, embedding)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(chunk_id) DO UPDATE SET
                    model = excluded.model,
                    dims = excluded.dims,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&chunk.chunk_id)
            .bind(&self.model)
            .bind(vector.len() as i64)
            .bind(encode_vector(vector))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to store vector for chunk {}", chunk.chunk_id))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.chunk_id, c.source_filename, c.text, v.embedding
            FROM chunk_vectors v
            JOIN chunks c ON c.chunk_id = v.chunk_id
            WHERE v.model = ?
            "#,
        )
        .bind(&self.model)
        .fetch_all(&self.pool)
        .await?;

        let mut scored = rows
            .iter()
            .map(|row| -> Result<RetrievedChunk> {
                let id: String = row.get("chunk_id");
                let blob: Vec<u8> = row.get("embedding");
                let stored = decode_vector(&blob)
                    .with_context(|| format!("Corrupt vector for chunk {}", id))?;
                Ok(RetrievedChunk {
                    distance: cosine_distance(vector, &stored),
                    id,
                    text: row.get("text"),
                    source_filename: row.get("source_filename"),
                })
            })
            .collect::<Result<Vec<RetrievedChunk>>>()?;

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
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    async fn stale_chunk_ids(&self, chunks: &[Chunk]) -> Result<Vec<String>> {
        let mut stale = Vec::new();
        for chunk in chunks {
            let stored: Option<String> = sqlx::query_scalar(
                r#"
                SELECT c.hash
                FROM chunks c
                JOIN chunk_vectors v ON v.chunk_id = c.chunk_id
                WHERE c.chunk_id = ? AND v.model = ?
                "#,
            )
            .bind(&chunk.chunk_id)
            .bind(&self.model)
            .fetch_optional(&self.pool)
            .await?;

            if stored.as_deref() != Some(chunk.hash.as_str()) {
                stale.push(chunk.chunk_id.clone());
            }
        }
        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::apply_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store(model: &str) -> SqliteVectorStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        apply_schema(&pool).await.unwrap();
        SqliteVectorStore::new(pool, model)
    }

    #[tokio::test]
    async fn test_add_query_count() {
        let store = memory_store("m").await;
        let chunks = vec![
            Chunk::new("q4.pdf", 0, "retention fell"),
            Chunk::new("q4.pdf", 1, "engagement rose"),
        ];
        store
            .add(&chunks, &[vec![1.0, 0.0], vec![0.0, 1.0]])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let hits = store.query(&[0.9, 0.1], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "q4.pdf_chunk_0");
        assert_eq!(hits[0].source_filename, "q4.pdf");
        assert_eq!(hits[0].text, "retention fell");
    }

    #[tokio::test]
    async fn test_upsert_is_keyed_by_chunk_id() {
        let store = memory_store("m").await;
        store
            .add(&[Chunk::new("a.md", 0, "v1")], &[vec![1.0]])
            .await
            .unwrap();
        store
            .add(&[Chunk::new("a.md", 0, "v2")], &[vec![1.0]])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.query(&[1.0], 5).await.unwrap()[0].text, "v2");
    }

    #[tokio::test]
    async fn test_stale_chunk_ids() {
        let store = memory_store("m").await;
        let kept = Chunk::new("a.md", 0, "unchanged");
        store.add(&[kept.clone()], &[vec![1.0]]).await.unwrap();

        let edited = Chunk::new("a.md", 0, "edited");
        let fresh = Chunk::new("b.md", 0, "new");
        assert!(store.stale_chunk_ids(&[kept.clone()]).await.unwrap().is_empty());
        assert_eq!(
            store.stale_chunk_ids(&[edited, fresh]).await.unwrap(),
            vec!["a.md_chunk_0", "b.md_chunk_0"]
        );

        // Vectors from another model do not count.
        let other = SqliteVectorStore::new(store.pool.clone(), "other");
        assert_eq!(
            other.stale_chunk_ids(&[kept]).await.unwrap(),
            vec!["a.md_chunk_0"]
        );
        assert!(other.query(&[1.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_length_mismatch() {
        let store = memory_store("m").await;
        assert!(store
            .add(&[Chunk::new("a.md", 0, "x")], &[])
            .await
            .is_err());
    }
}
