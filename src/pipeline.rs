//! End-to-end update pipeline.
//!
//! A [`Pipeline`] owns every collaborator a run needs. They are built once,
//! either from config ([`Pipeline::from_config`]) or handed in directly
//! ([`Pipeline::new`]), and are never re-initialized behind the caller's
//! back.
//!
//! # Run
//!
//! ```text
//! metrics file ──▶ metric names
//! input dir ──▶ extract ──▶ chunk ──▶ embed ──▶ vector store
//! per metric: retrieve top_k ──▶ assess against report section
//!             ──▶ ProposedUpdate (pending)
//! ```
//!
//! A missing or empty metrics table, or an input directory with nothing to
//! chunk, ends the run with no proposals. Indexing failures abort the run.
//! Retrieval and assessment failures only skip the affected metric.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use loyalty_monitor_core::completion::{Completer, CompletionOptions};
use loyalty_monitor_core::embedding::Embedder;
use loyalty_monitor_core::metrics::parse_metric_names;
use loyalty_monitor_core::models::{ProposedUpdate, RetrievedChunk, UpdateStatus, UNKNOWN_SOURCE};
use loyalty_monitor_core::prompt::Assessment;
use loyalty_monitor_core::section::SectionEditor;
use loyalty_monitor_core::store::VectorStore;
use loyalty_monitor_core::tokenize::Tokenizer;

use crate::assess::{assess_metric, summarize_metric};
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::index::{index_chunks, IndexStats};
use crate::ingest::{ingest_documents, IngestReport};
use crate::llm::{completion_options, create_completer};
use crate::report::ReportFile;
use crate::retrieve::retrieve;
use crate::sqlite_store::SqliteVectorStore;
use crate::tokenizer::create_tokenizer;
use crate::{db, migrate};

/// Result of assessing one metric.
#[derive(Debug, Clone)]
pub struct MetricAssessment {
    pub metric: String,
    pub retrieved: Vec<RetrievedChunk>,
    pub assessment: Assessment,
}

pub struct Pipeline {
    config: Config,
    tokenizer: Box<dyn Tokenizer>,
    embedder: Box<dyn Embedder>,
    completer: Box<dyn Completer>,
    store: Box<dyn VectorStore>,
    report: ReportFile,
    editor: SectionEditor,
    options: CompletionOptions,
}

impl Pipeline {
    /// Assemble a pipeline from already constructed collaborators.
    ///
    /// The report handle and section editor are derived from `config`.
    pub fn new(
        config: Config,
        tokenizer: Box<dyn Tokenizer>,
        embedder: Box<dyn Embedder>,
        completer: Box<dyn Completer>,
        store: Box<dyn VectorStore>,
    ) -> Result<Self> {
        let editor = config.report.editor()?;
        let report = ReportFile::new(config.paths.report.clone());
        let options = completion_options(&config.llm);
        Ok(Self {
            config,
            tokenizer,
            embedder,
            completer,
            store,
            report,
            editor,
            options,
        })
    }

    /// Build every collaborator from `config`: tokenizer, embedding and
    /// completion providers, and the SQLite vector store (schema applied).
    pub async fn from_config(config: Config) -> Result<Self> {
        let tokenizer = create_tokenizer(&config.chunking.tokenizer)?;
        let embedder = create_embedder(&config.embedding)?;
        let completer = create_completer(&config.llm)?;

        let pool = db::connect(&config).await?;
        migrate::apply_schema(&pool)
            .await
            .context("Failed to prepare index schema")?;
        let store = SqliteVectorStore::new(pool, embedder.model_name());

        Self::new(config, tokenizer, embedder, completer, Box::new(store))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn report(&self) -> &ReportFile {
        &self.report
    }

    pub fn editor(&self) -> &SectionEditor {
        &self.editor
    }

    pub fn store(&self) -> &dyn VectorStore {
        self.store.as_ref()
    }

    /// Metric names from the configured metrics table.
    pub async fn load_metrics(&self) -> Result<Vec<String>> {
        let path = &self.config.paths.metrics;
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read metrics file: {}", path.display()))?;
        Ok(parse_metric_names(&content))
    }

    /// Extract and chunk the input directory without embedding anything.
    pub fn ingest(&self) -> Result<IngestReport> {
        ingest_documents(&self.config, self.tokenizer.as_ref())
    }

    /// Ingest the input directory and embed whatever the store does not
    /// already hold.
    pub async fn index(&self) -> Result<(IngestReport, IndexStats)> {
        let ingested = self.ingest()?;
        if ingested.chunks.is_empty() {
            return Ok((ingested, IndexStats::default()));
        }
        let stats = self.index_ingested(&ingested).await?;
        Ok((ingested, stats))
    }

    async fn index_ingested(&self, ingested: &IngestReport) -> Result<IndexStats> {
        index_chunks(
            &ingested.chunks,
            self.embedder.as_ref(),
            self.store.as_ref(),
            self.config.embedding.batch_size,
        )
        .await
        .context("Indexing failed")
    }

    /// The `k` stored chunks nearest to `query` (default `retrieval.top_k`).
    pub async fn retrieve(&self, query: &str, k: Option<usize>) -> Result<Vec<RetrievedChunk>> {
        let k = k.unwrap_or(self.config.retrieval.top_k);
        retrieve(self.embedder.as_ref(), self.store.as_ref(), query, k).await
    }

    /// Retrieve context for `metric` and assess it against the current
    /// report.
    pub async fn assess(&self, metric: &str) -> Result<MetricAssessment> {
        let report_text = self.report.read().await?;
        self.assess_against(&report_text, metric).await
    }

    async fn assess_against(&self, report_text: &str, metric: &str) -> Result<MetricAssessment> {
        let retrieved = self
            .retrieve(metric, None)
            .await
            .with_context(|| format!("Retrieval failed for metric '{}'", metric))?;
        let assessment = assess_metric(
            report_text,
            metric,
            &retrieved,
            &self.editor,
            self.completer.as_ref(),
            &self.options,
        )
        .await?;
        Ok(MetricAssessment {
            metric: metric.to_string(),
            retrieved,
            assessment,
        })
    }

    /// Summarize what the index says about `metric`.
    pub async fn summarize(&self, metric: &str) -> Result<Option<String>> {
        let retrieved = self.retrieve(metric, None).await?;
        summarize_metric(metric, &retrieved, self.completer.as_ref(), &self.options).await
    }

    /// Run the full pipeline and return the proposed updates.
    pub async fn run(&self) -> Result<Vec<ProposedUpdate>> {
        let metrics = self.load_metrics().await?;
        if metrics.is_empty() {
            warn!(file = %self.config.paths.metrics.display(), "no metrics defined; nothing to do");
            return Ok(Vec::new());
        }
        info!(count = metrics.len(), "loaded metrics");

        let ingested = self.ingest()?;
        if ingested.files_seen == 0 {
            warn!(dir = %self.config.paths.input_dir.display(), "no input documents found");
            return Ok(Vec::new());
        }
        if ingested.chunks.is_empty() {
            warn!("input documents produced no chunks");
            return Ok(Vec::new());
        }

        self.index_ingested(&ingested).await?;

        let report_text = self.report.read().await?;
        let mut proposals = Vec::new();

        for metric in &metrics {
            let result = match self.assess_against(&report_text, metric).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(metric = %metric, error = %format!("{:#}", e), "skipping metric");
                    continue;
                }
            };

            if result.retrieved.is_empty() {
                warn!(metric = %metric, "no relevant context retrieved; skipping");
                continue;
            }

            match result.assessment {
                Assessment::NoUpdate => {
                    info!(metric = %metric, "no significant change");
                }
                Assessment::Revised(text) => {
                    info!(metric = %metric, "proposing update");
                    proposals.push(propose(metric, text, &result.retrieved));
                }
            }
        }

        info!(
            metrics = metrics.len(),
            proposals = proposals.len(),
            "pipeline finished"
        );
        Ok(proposals)
    }
}

/// A pending proposal attributed to the top-ranked retrieved chunk.
pub fn propose(metric: &str, update_text: String, retrieved: &[RetrievedChunk]) -> ProposedUpdate {
    let source = retrieved
        .first()
        .map(|c| c.source_filename.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_SOURCE)
        .to_string();
    ProposedUpdate {
        id: uuid::Uuid::new_v4().to_string(),
        metric: metric.to_string(),
        update_text,
        source,
        status: UpdateStatus::Pending,
        created_at: Utc::now(),
    }
}
