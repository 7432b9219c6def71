//! Input document ingestion.
//!
//! Walks the input directory, extracts text from each matching file, and
//! chunks it with the configured tokenizer. Files that cannot be read or
//! yield no text are logged and skipped; they never abort the run.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use loyalty_monitor_core::chunk::chunk_document;
use loyalty_monitor_core::models::Chunk;
use loyalty_monitor_core::tokenize::Tokenizer;

use crate::config::Config;
use crate::extract::extract_text;

/// Outcome of one ingestion pass.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub chunks: Vec<Chunk>,
    pub files_seen: usize,
    pub files_skipped: usize,
    /// Documents whose chunking stopped early (overlap too large).
    pub truncated_documents: usize,
}

/// Matching files under `dir`, sorted by relative path.
///
/// A missing directory is not an error: it is logged and yields no files.
pub fn scan_input_dir(dir: &Path, include_globs: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        warn!(dir = %dir.display(), "input directory does not exist");
        return Ok(Vec::new());
    }

    let include_set = build_globset(include_globs)?;
    let exclude_set = build_globset(&["**/.git/**".to_string(), "**/.*".to_string()])?;

    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        files.push((rel_str, path.to_path_buf()));
    }

    // Sort for deterministic chunk order
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files.into_iter().map(|(_, p)| p).collect())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .literal_separator(false)
            .build()
            .with_context(|| format!("Invalid glob pattern: {}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Extract and chunk every input document.
///
/// Chunk ids are built from the file name, so two files with the same name
/// in different sub-directories would collide; the later one is skipped.
pub fn ingest_documents(config: &Config, tokenizer: &dyn Tokenizer) -> Result<IngestReport> {
    let files = scan_input_dir(&config.paths.input_dir, &config.paths.include_globs)?;
    let mut report = IngestReport {
        files_seen: files.len(),
        ..IngestReport::default()
    };
    let mut names = HashSet::new();

    for path in &files {
        let file_name = match path.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => continue,
        };
        if !names.insert(file_name.clone()) {
            warn!(file = %path.display(), "duplicate file name in input directory; skipping");
            report.files_skipped += 1;
            continue;
        }

        let text = match extract_text(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping input file");
                report.files_skipped += 1;
                continue;
            }
        };

        let doc = chunk_document(
            tokenizer,
            &file_name,
            &text,
            config.chunking.max_tokens,
            config.chunking.overlap_tokens,
        )
        .with_context(|| format!("Failed to chunk {}", path.display()))?;

        if let Some(warning) = doc.warning {
            warn!(file = %file_name, "{}", warning);
            report.truncated_documents += 1;
        }
        report.chunks.extend(doc.chunks);
    }

    info!(
        files = report.files_seen,
        skipped = report.files_skipped,
        chunks = report.chunks.len(),
        "ingested input documents"
    );
    Ok(report)
}
