//! # Loyalty Monitor
//!
//! Keeps a baseline brand-loyalty report current as new source documents
//! arrive.
//!
//! New documents are chunked, embedded, and stored in a local SQLite vector
//! index. For every tracked metric the most relevant excerpts are retrieved
//! and a language model decides whether the metric's section in the report
//! needs revising. Revisions are recorded as pending proposals; approving
//! one rewrites that section of the report in place.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │ Input docs  │──▶│ Chunk+Embed │──▶│  SQLite  │
//! │ md/txt/pdf  │   │             │   │ vectors  │
//! └─────────────┘   └─────────────┘   └────┬─────┘
//!                                          │ retrieve per metric
//!                                          ▼
//!                   ┌─────────────┐   ┌──────────┐
//!                   │  Proposals  │◀──│  Assess  │
//!                   │   (JSON)    │   │  (LLM)   │
//!                   └──────┬──────┘   └──────────┘
//!                          │ approve
//!                          ▼
//!                   ┌─────────────┐
//!                   │   Report    │
//!                   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lmon init                     # create the index database
//! lmon index                    # chunk + embed new documents
//! lmon run                      # assess every metric, record proposals
//! lmon proposals list
//! lmon proposals approve "Retention Rate"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`ingest`] | Input directory scan and chunking |
//! | [`extract`] | Text extraction (Markdown, text, PDF) |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Chat completion providers |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`pipeline`] | End-to-end update run |
//! | [`report`] | Serialized report writes |
//! | [`proposals`] | Review ledger |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod assess;
pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod http;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod pipeline;
pub mod proposals;
pub mod report;
pub mod retrieve;
pub mod sqlite_store;
pub mod tokenizer;
