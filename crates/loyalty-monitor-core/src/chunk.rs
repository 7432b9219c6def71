//! Token-window text chunker.
//!
//! Splits document text into overlapping windows of at most `max_tokens`
//! tokens, as counted by a [`Tokenizer`]. Consecutive windows share
//! `overlap` tokens so context carries across chunk boundaries.
//!
//! # Algorithm
//!
//! 1. Empty text yields no chunks.
//! 2. Tokenize the text into spans.
//! 3. Starting at token 0, emit the window `[start, min(start + max, total))`.
//! 4. Stop once a window reaches the last token.
//! 5. Otherwise advance `start` by `max - overlap`, clamped to
//!    `[end - max + 1, end - overlap]`.
//! 6. If the clamped cursor makes no forward progress, stop and report
//!    [`ChunkWarning::OverlapTooLarge`]. This is a configuration problem,
//!    not a failure: the chunks emitted so far are still returned.
//!
//! # Example
//!
//! ```rust
//! use loyalty_monitor_core::chunk::chunk_text;
//! use loyalty_monitor_core::tokenize::WordTokenizer;
//!
//! let out = chunk_text(&WordTokenizer, "one two three four five", 2, 1).unwrap();
//! assert_eq!(out.pieces, vec!["one two", "two three", "three four", "four five"]);
//! assert!(out.warning.is_none());
//! ```

use std::ops::Range;

use anyhow::Result;

use crate::models::Chunk;
use crate::tokenize::{decode_window, Tokenizer};

/// Non-fatal chunking problems, returned alongside the chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkWarning {
    /// The window cursor could not advance; only `emitted` chunks were produced.
    OverlapTooLarge {
        max_tokens: usize,
        overlap: usize,
        emitted: usize,
    },
    /// `max_tokens` was zero, so no window can hold a token.
    ZeroWindow,
}

impl std::fmt::Display for ChunkWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkWarning::OverlapTooLarge {
                max_tokens,
                overlap,
                emitted,
            } => write!(
                f,
                "chunk cursor could not advance: overlap ({}) is too large for max_tokens ({}); stopped after {} chunk(s)",
                overlap, max_tokens, emitted
            ),
            ChunkWarning::ZeroWindow => write!(f, "max_tokens is 0; no chunks produced"),
        }
    }
}

/// Token windows planned over a document of `total_tokens` tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPlan {
    pub windows: Vec<Range<usize>>,
    /// True when planning stopped because the cursor could not advance.
    pub stalled: bool,
}

/// Plan the token windows for a document without touching its text.
pub fn plan_windows(total_tokens: usize, max_tokens: usize, overlap: usize) -> WindowPlan {
    let mut windows = Vec::new();
    if total_tokens == 0 || max_tokens == 0 {
        return WindowPlan {
            windows,
            stalled: false,
        };
    }

    // Signed so that `max - overlap` may go negative without wrapping.
    let max = max_tokens as i64;
    let overlap = overlap as i64;
    let total = total_tokens as i64;
    let mut start: i64 = 0;

    loop {
        let end = (start + max).min(total);
        windows.push(start as usize..end as usize);

        if end == total {
            return WindowPlan {
                windows,
                stalled: false,
            };
        }

        let mut next = start + (max - overlap);
        next = next.max(end - max + 1);
        next = next.min(end - overlap);

        // `next == end` is a valid cursor at zero overlap.
        if next <= start {
            return WindowPlan {
                windows,
                stalled: true,
            };
        }
        start = next;
    }
}

/// Output of [`chunk_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedText {
    /// Decoded chunk texts, in order.
    pub pieces: Vec<String>,
    /// Token range covered by each piece.
    pub windows: Vec<Range<usize>>,
    pub total_tokens: usize,
    pub warning: Option<ChunkWarning>,
}

/// Split `text` into overlapping token windows.
///
/// Every piece except the last holds exactly `max_tokens` tokens; the last
/// holds between 1 and `max_tokens`. The only error is a tokenizer failure.
pub fn chunk_text(
    tokenizer: &dyn Tokenizer,
    text: &str,
    max_tokens: usize,
    overlap: usize,
) -> Result<ChunkedText> {
    if text.is_empty() {
        return Ok(ChunkedText {
            pieces: Vec::new(),
            windows: Vec::new(),
            total_tokens: 0,
            warning: None,
        });
    }

    let spans = tokenizer.encode(text)?;
    if max_tokens == 0 {
        return Ok(ChunkedText {
            pieces: Vec::new(),
            windows: Vec::new(),
            total_tokens: spans.len(),
            warning: Some(ChunkWarning::ZeroWindow),
        });
    }

    let plan = plan_windows(spans.len(), max_tokens, overlap);
    let pieces = plan
        .windows
        .iter()
        .map(|w| decode_window(text, &spans[w.clone()]).to_string())
        .collect::<Vec<_>>();

    let warning = plan.stalled.then_some(ChunkWarning::OverlapTooLarge {
        max_tokens,
        overlap,
        emitted: pieces.len(),
    });

    Ok(ChunkedText {
        pieces,
        windows: plan.windows,
        total_tokens: spans.len(),
        warning,
    })
}

/// Chunks of one source document, with ids assigned.
#[derive(Debug, Clone)]
pub struct DocumentChunks {
    pub chunks: Vec<Chunk>,
    pub warning: Option<ChunkWarning>,
}

/// Chunk one document and wrap each piece in a [`Chunk`] record.
///
/// Chunk ids are `"<source_filename>_chunk_<i>"` with `i` counting from 0
/// in window order.
pub fn chunk_document(
    tokenizer: &dyn Tokenizer,
    source_filename: &str,
    text: &str,
    max_tokens: usize,
    overlap: usize,
) -> Result<DocumentChunks> {
    let out = chunk_text(tokenizer, text, max_tokens, overlap)?;
    let chunks = out
        .pieces
        .iter()
        .enumerate()
        .map(|(i, piece)| Chunk::new(source_filename, i, piece))
        .collect();
    Ok(DocumentChunks {
        chunks,
        warning: out.warning,
    })
}
