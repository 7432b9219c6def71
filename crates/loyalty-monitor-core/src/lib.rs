//! # Loyalty Monitor Core
//!
//! Shared, I/O-free logic for Loyalty Monitor: data models, the tokenizer
//! boundary, token-window chunking, report section editing, the assessment
//! prompt protocol, and the collaborator traits (embedder, completer,
//! vector store) the application wires together.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Every function here is a pure transformation over in-memory text and is
//! safe to call concurrently on independent inputs.

pub mod chunk;
pub mod completion;
pub mod embedding;
pub mod metrics;
pub mod models;
pub mod prompt;
pub mod section;
pub mod store;
pub mod tokenize;
