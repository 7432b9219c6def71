//! Tokenizer scheme selection.
//!
//! `[chunking].tokenizer` names one scheme for the whole pipeline:
//! - `"words"`: whitespace-delimited words (always available);
//! - `"hf:<path>"`: a HuggingFace `tokenizer.json` (feature `hf-tokenizer`).

use anyhow::{bail, Result};

use loyalty_monitor_core::tokenize::{Tokenizer, WordTokenizer};

#[cfg(feature = "hf-tokenizer")]
use loyalty_monitor_core::tokenize::TokenSpan;

/// Build the tokenizer named by `scheme`.
pub fn create_tokenizer(scheme: &str) -> Result<Box<dyn Tokenizer>> {
    if scheme == WordTokenizer::NAME {
        return Ok(Box::new(WordTokenizer));
    }
    if let Some(path) = scheme.strip_prefix("hf:") {
        return hf_tokenizer(scheme, path);
    }
    bail!(
        "Unknown tokenizer scheme: '{}'. Use \"words\" or \"hf:<path to tokenizer.json>\".",
        scheme
    )
}

#[cfg(feature = "hf-tokenizer")]
fn hf_tokenizer(scheme: &str, path: &str) -> Result<Box<dyn Tokenizer>> {
    Ok(Box::new(HfTokenizer::from_file(scheme, path)?))
}

#[cfg(not(feature = "hf-tokenizer"))]
fn hf_tokenizer(_scheme: &str, _path: &str) -> Result<Box<dyn Tokenizer>> {
    bail!("HuggingFace tokenizers require --features hf-tokenizer")
}

/// Subword tokenizer loaded from a HuggingFace `tokenizer.json`.
///
/// Token spans are the byte offsets reported by the tokenizer; special
/// tokens are not added, and zero-width tokens are dropped.
#[cfg(feature = "hf-tokenizer")]
pub struct HfTokenizer {
    name: String,
    inner: tokenizers::Tokenizer,
}

#[cfg(feature = "hf-tokenizer")]
impl HfTokenizer {
    pub fn from_file(name: &str, path: &str) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer {}: {}", path, e))?;
        Ok(Self {
            name: name.to_string(),
            inner,
        })
    }
}

#[cfg(feature = "hf-tokenizer")]
impl Tokenizer for HfTokenizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, text: &str) -> Result<Vec<TokenSpan>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let mut spans: Vec<TokenSpan> = Vec::with_capacity(encoding.len());
        for &(start, end) in encoding.get_offsets() {
            if start >= end || !text.is_char_boundary(start) || !text.is_char_boundary(end) {
                continue;
            }
            // Keep spans ordered and disjoint.
            if spans.last().is_some_and(|last| start < last.end) {
                continue;
            }
            spans.push(start..end);
        }
        Ok(spans)
    }
}
