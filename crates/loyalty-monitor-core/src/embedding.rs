//! Embedding collaborator trait and vector utilities.
//!
//! [`Embedder`] is the boundary to whatever turns text into vectors. The
//! pipeline treats vectors as opaque: it only stores them and hands them
//! back to the vector store for similarity queries.
//!
//! Concrete providers (OpenAI, Ollama, fastembed) live in the
//! `loyalty-monitor` app crate.

use anyhow::{bail, Result};
use async_trait::async_trait;

/// Text embedding backend.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;
    /// Vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed each text, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Serialize an embedding for storage: each component as 4 little-endian
/// bytes, in order.
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`encode_vector`].
///
/// A stored vector whose byte length is not a multiple of 4 is corrupt and
/// rejected rather than silently truncated.
pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        bail!(
            "stored vector has {} bytes, not a whole number of f32 components",
            bytes.len()
        );
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Cosine distance between a query vector and a stored chunk vector.
///
/// `0.0` means the same direction, `2.0` the opposite one; retrieval ranks
/// ascending. Vectors of different dimensionality (for instance written by
/// another model) and zero vectors are scored `1.0`, the distance of
/// unrelated text, so they never outrank a real match.
pub fn cosine_distance(query: &[f32], stored: &[f32]) -> f32 {
    if query.len() != stored.len() || query.is_empty() {
        return 1.0;
    }

    let (dot, qq, ss) = query
        .iter()
        .zip(stored)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, qq, ss), (q, s)| {
            (dot + q * s, qq + q * q, ss + s * s)
        });

    let norm = qq.sqrt() * ss.sqrt();
    if norm < f32::EPSILON {
        return 1.0;
    }
    1.0 - dot / norm
}
