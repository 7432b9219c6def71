//! Core data models used throughout Loyalty Monitor.
//!
//! These types represent the chunks, retrieval rows, and proposed report
//! updates that flow through the ingestion and assessment pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Source label used when a retrieved chunk carries no filename.
pub const UNKNOWN_SOURCE: &str = "Unknown Source";

/// A chunk of one source document's text.
///
/// Created by the chunker, read by the embedding and storage steps, never
/// mutated. `chunk_id` is `"<source_filename>_chunk_<index>"` and is unique
/// within a single ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub source_filename: String,
    pub text: String,
    /// SHA-256 of `text`, used for embedding staleness detection.
    pub hash: String,
}

impl Chunk {
    pub fn new(source_filename: &str, index: usize, text: &str) -> Self {
        Self {
            chunk_id: chunk_id(source_filename, index),
            source_filename: source_filename.to_string(),
            text: text.to_string(),
            hash: content_hash(text),
        }
    }
}

/// Build the identifier for the `index`-th chunk of `source_filename`.
pub fn chunk_id(source_filename: &str, index: usize) -> String {
    format!("{}_chunk_{}", source_filename, index)
}

/// Hex SHA-256 of a chunk's text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// One ranked row returned by a vector-store query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub source_filename: String,
    /// Cosine distance to the query vector; smaller is closer.
    pub distance: f32,
}

/// Review status of a [`ProposedUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UpdateStatus::Pending => "pending",
            UpdateStatus::Approved => "approved",
            UpdateStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// A revised section body proposed by the assessment step for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedUpdate {
    pub id: String,
    pub metric: String,
    pub update_text: String,
    /// Filename of the best-ranked chunk that informed the update.
    pub source: String,
    pub status: UpdateStatus,
    pub created_at: DateTime<Utc>,
}
