//! `lmon` command implementations.
//!
//! Each `run_*` function backs one CLI command and prints its result to
//! stdout. Diagnostics go through `tracing` to stderr.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::warn;

use loyalty_monitor_core::chunk::chunk_text;
use loyalty_monitor_core::metrics::parse_metric_names;
use loyalty_monitor_core::models::{chunk_id, ProposedUpdate};
use loyalty_monitor_core::prompt::Assessment;

use crate::config::Config;
use crate::extract::extract_text;
use crate::pipeline::Pipeline;
use crate::proposals::ProposalLedger;
use crate::report::ReportFile;
use crate::tokenizer::create_tokenizer;

/// Where `section set` takes its new body from.
pub enum SectionBody<'a> {
    Text(&'a str),
    File(&'a Path),
}

pub fn run_metrics(config: &Config) -> Result<()> {
    let path = &config.paths.metrics;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read metrics file: {}", path.display()))?;
    let names = parse_metric_names(&content);
    if names.is_empty() {
        println!("No metrics defined.");
        return Ok(());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

/// Dry-run chunking of one file: ids and token counts, nothing stored.
pub fn run_chunk(
    config: &Config,
    file: &Path,
    max_tokens: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    let tokenizer = create_tokenizer(&config.chunking.tokenizer)?;
    let max_tokens = max_tokens.unwrap_or(config.chunking.max_tokens);
    let overlap = overlap.unwrap_or(config.chunking.overlap_tokens);

    let text = extract_text(file).with_context(|| format!("Cannot chunk {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.display().to_string());

    let out = chunk_text(tokenizer.as_ref(), &text, max_tokens, overlap)?;
    if let Some(warning) = &out.warning {
        warn!(file = %name, "{}", warning);
    }

    println!("chunk {}", name);
    println!("  tokenizer: {}", tokenizer.name());
    println!("  tokens: {}", out.total_tokens);
    println!("  chunks: {}", out.pieces.len());
    for (i, window) in out.windows.iter().enumerate() {
        println!(
            "  {}  tokens {}..{} ({})",
            chunk_id(&name, i),
            window.start,
            window.end,
            window.len()
        );
    }
    if let Some(warning) = out.warning {
        println!("  warning: {}", warning);
    }
    Ok(())
}

pub async fn run_index(config: &Config) -> Result<()> {
    let pipeline = Pipeline::from_config(config.clone()).await?;
    let (ingested, stats) = pipeline.index().await?;

    println!("index");
    println!("  files: {}", ingested.files_seen);
    println!("  skipped: {}", ingested.files_skipped);
    println!("  chunks: {}", ingested.chunks.len());
    println!("  embedded: {}", stats.embedded);
    println!("  unchanged: {}", stats.unchanged);
    if ingested.truncated_documents > 0 {
        println!("  truncated documents: {}", ingested.truncated_documents);
    }
    Ok(())
}

pub async fn run_retrieve(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let pipeline = Pipeline::from_config(config.clone()).await?;
    let results = pipeline.retrieve(query, k).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, hit) in results.iter().enumerate() {
        println!("{}. [{:.4}] {}", i + 1, hit.distance, hit.id);
        println!("    source: {}", hit.source_filename);
        println!("    excerpt: \"{}\"", preview(&hit.text, 160));
        println!();
    }
    Ok(())
}

pub async fn run_section_show(config: &Config, metric: &str) -> Result<()> {
    let editor = config.report.editor()?;
    let report = ReportFile::new(config.paths.report.clone());
    match report.section(&editor, metric).await? {
        Some(body) if body.is_empty() => println!("(empty)"),
        Some(body) => println!("{}", body),
        None => bail!(
            "Section '{}' not found in {}",
            metric,
            config.paths.report.display()
        ),
    }
    Ok(())
}

pub async fn run_section_set(config: &Config, metric: &str, body: SectionBody<'_>) -> Result<()> {
    let text = match body {
        SectionBody::Text(t) => t.to_string(),
        SectionBody::File(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
    };

    let editor = config.report.editor()?;
    let report = ReportFile::new(config.paths.report.clone());
    if !report.apply_update(&editor, metric, &text).await? {
        bail!(
            "Section '{}' not found in {}",
            metric,
            config.paths.report.display()
        );
    }
    println!("Updated section '{}'.", metric);
    Ok(())
}

pub async fn run_section_list(config: &Config) -> Result<()> {
    let editor = config.report.editor()?;
    let report = ReportFile::new(config.paths.report.clone());
    let text = report.read().await?;
    let marker = editor.grammar().marker;

    for heading in editor.headings(&text) {
        println!(
            "{}{} {}",
            "  ".repeat(heading.level.saturating_sub(1)),
            marker.to_string().repeat(heading.level),
            heading.title
        );
    }
    Ok(())
}

pub async fn run_assess(config: &Config, metric: &str) -> Result<()> {
    let pipeline = Pipeline::from_config(config.clone()).await?;
    let result = pipeline.assess(metric).await?;

    println!("assess {}", metric);
    println!("  retrieved: {}", result.retrieved.len());
    for hit in &result.retrieved {
        println!("    [{:.4}] {}", hit.distance, hit.id);
    }
    match result.assessment {
        Assessment::NoUpdate => println!("  result: no update needed"),
        Assessment::Revised(text) => {
            println!("  result: revision proposed");
            println!();
            println!("{}", text);
        }
    }
    Ok(())
}

pub async fn run_summarize(config: &Config, metric: &str) -> Result<()> {
    let pipeline = Pipeline::from_config(config.clone()).await?;
    match pipeline.summarize(metric).await? {
        Some(summary) => println!("{}", summary),
        None => println!("No relevant context for '{}'.", metric),
    }
    Ok(())
}

/// Full pipeline; new proposals are merged into the ledger.
pub async fn run_pipeline(config: &Config) -> Result<()> {
    let pipeline = Pipeline::from_config(config.clone()).await?;
    let proposals = pipeline.run().await?;

    let mut ledger = ProposalLedger::load(&config.paths.proposals)?;
    let added = ledger.merge(proposals);
    ledger.save()?;

    println!("run");
    println!("  proposals: {}", added);
    println!("  pending: {}", ledger.pending().count());
    println!("  ledger: {}", config.paths.proposals.display());
    Ok(())
}

pub fn run_proposals_list(config: &Config, all: bool) -> Result<()> {
    let ledger = ProposalLedger::load(&config.paths.proposals)?;
    let shown: Vec<&ProposedUpdate> = if all {
        ledger.all().iter().collect()
    } else {
        ledger.pending().collect()
    };

    if shown.is_empty() {
        println!("No proposals.");
        return Ok(());
    }
    for p in shown {
        println!(
            "[{}] {} ({})",
            p.status,
            p.metric,
            p.created_at.format("%Y-%m-%d %H:%M")
        );
        println!("    source: {}", p.source);
        println!("    update: \"{}\"", preview(&p.update_text, 200));
        println!();
    }
    Ok(())
}

pub async fn run_proposals_approve(config: &Config, metric: &str) -> Result<()> {
    let editor = config.report.editor()?;
    let report = ReportFile::new(config.paths.report.clone());
    let mut ledger = ProposalLedger::load(&config.paths.proposals)?;

    let approved = ledger.approve(metric, &report, &editor).await?;
    println!("Approved update for '{}'.", approved.metric);
    Ok(())
}

pub fn run_proposals_reject(config: &Config, metric: &str) -> Result<()> {
    let mut ledger = ProposalLedger::load(&config.paths.proposals)?;
    let rejected = ledger.reject(metric)?;
    ledger.save()?;
    println!("Rejected update for '{}'.", rejected.metric);
    Ok(())
}

/// First `max` characters of `text` on one line.
fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{}...", cut)
}
