//! Tokenizer boundary for the chunker.
//!
//! A [`Tokenizer`] maps text to an ordered list of token byte spans. The
//! chunker counts and windows tokens through these spans and "decodes" a
//! window by slicing the original text from the first token's start to the
//! last token's end, so every chunk is a verbatim substring of its input.
//!
//! One named scheme must be used across a whole pipeline so that chunk
//! boundaries are reproducible run-to-run. The built-in scheme is
//! [`WordTokenizer`] (`"words"`); the application can plug in others.

use std::ops::Range;

use anyhow::Result;

/// Byte range of one token inside the text it was produced from.
pub type TokenSpan = Range<usize>;

/// A fixed, deterministic tokenization scheme.
pub trait Tokenizer: Send + Sync {
    /// Scheme name, e.g. `"words"`.
    fn name(&self) -> &str;

    /// Tokenize `text` into ordered, non-overlapping byte spans.
    ///
    /// Spans must lie on UTF-8 character boundaries of `text`.
    fn encode(&self, text: &str) -> Result<Vec<TokenSpan>>;

    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> Result<usize> {
        Ok(self.encode(text)?.len())
    }
}

/// Whitespace-delimited word tokenizer.
///
/// A token is a maximal run of non-whitespace characters. Whitespace
/// between tokens belongs to no token, so a window decodes with its inner
/// whitespace intact and without leading or trailing whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl WordTokenizer {
    pub const NAME: &'static str = "words";
}

impl Tokenizer for WordTokenizer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn encode(&self, text: &str) -> Result<Vec<TokenSpan>> {
        let mut spans = Vec::new();
        let mut start: Option<usize> = None;

        for (i, ch) in text.char_indices() {
            match (ch.is_whitespace(), start) {
                (true, Some(s)) => {
                    spans.push(s..i);
                    start = None;
                }
                (false, None) => start = Some(i),
                _ => {}
            }
        }
        if let Some(s) = start {
            spans.push(s..text.len());
        }

        Ok(spans)
    }
}

/// Decode the contiguous token window `spans` back into text.
///
/// Returns the substring of `text` covering the first through last span,
/// or `""` for an empty window.
pub fn decode_window<'a>(text: &'a str, spans: &[TokenSpan]) -> &'a str {
    match (spans.first(), spans.last()) {
        (Some(first), Some(last)) => &text[first.start..last.end],
        _ => "",
    }
}
