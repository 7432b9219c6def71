//! Pipeline runs against in-memory collaborators.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use loyalty_monitor::config::Config;
use loyalty_monitor::pipeline::Pipeline;
use loyalty_monitor::proposals::ProposalLedger;
use loyalty_monitor_core::completion::{Completer, CompletionOptions, Message};
use loyalty_monitor_core::embedding::Embedder;
use loyalty_monitor_core::models::UpdateStatus;
use loyalty_monitor_core::prompt::NO_UPDATE_MARKER;
use loyalty_monitor_core::store::memory::InMemoryVectorStore;
use loyalty_monitor_core::store::VectorStore;
use loyalty_monitor_core::tokenize::WordTokenizer;

const VOCAB: &[&str] = &["retention", "promoter", "purchase", "price"];

/// Bag-of-keywords vectors: one dimension per vocabulary word plus a
/// constant so no vector is all zeros.
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keywords"
    }
    fn dims(&self) -> usize {
        VOCAB.len() + 1
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let words: Vec<&str> = lower
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                    .collect();
                let mut v: Vec<f32> = VOCAB
                    .iter()
                    .map(|k| words.iter().filter(|w| **w == *k).count() as f32)
                    .collect();
                v.push(0.1);
                v
            })
            .collect())
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }
    fn dims(&self) -> usize {
        1
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("provider unavailable")
    }
}

/// Replies per metric; a metric with no scripted reply fails.
struct ScriptedCompleter {
    replies: HashMap<String, String>,
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Completer for ScriptedCompleter {
    fn model_name(&self) -> &str {
        "scripted"
    }
    async fn complete(&self, messages: &[Message], _options: &CompletionOptions) -> Result<String> {
        let prompt = &messages[0].content;
        for (metric, reply) in &self.replies {
            if prompt.contains(&format!("**Metric Name:** {}", metric)) {
                self.calls.lock().unwrap().push(metric.clone());
                return Ok(reply.clone());
            }
        }
        bail!("no scripted reply")
    }
}

const REPORT: &str = "# Brand Loyalty Report\n\n\
### A. Retention Rate\nRetention is 80%.\n\n\
### B. Net Promoter Score\nNPS is 42.\n\n\
### C. Repeat Purchase Rate\nRepeat purchases at 30%.\n";

const METRICS: &str = "| Metric | Definition |\n\
|:---|:---|\n\
| **Retention Rate** | Share of customers kept |\n\
| **Net Promoter Score** | Promoters minus detractors |\n\
| **Repeat Purchase Rate** | Customers buying twice |\n";

fn workspace(metrics: &str) -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("input")).unwrap();
    fs::write(root.join("report.md"), REPORT).unwrap();
    fs::write(root.join("metrics.md"), metrics).unwrap();

    let toml = format!(
        r#"
[paths]
report = "{root}/report.md"
metrics = "{root}/metrics.md"
input_dir = "{root}/input"
proposals = "{root}/proposals.json"

[db]
path = "{root}/index.sqlite"

[retrieval]
top_k = 2
"#,
        root = root.display()
    );
    let config: Config = toml::from_str(&toml).unwrap();
    (tmp, config)
}

fn add_inputs(tmp: &TempDir) {
    let input = tmp.path().join("input");
    fs::write(
        input.join("q4.md"),
        "Retention dropped after the price change. Retention is now 65%.",
    )
    .unwrap();
    fs::write(
        input.join("survey.txt"),
        "Promoter share grew; promoter comments were positive.",
    )
    .unwrap();
}

fn scripted(replies: &[(&str, &str)]) -> (Box<dyn Completer>, Arc<Mutex<Vec<String>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let completer = ScriptedCompleter {
        replies: replies
            .iter()
            .map(|(m, r)| (m.to_string(), r.to_string()))
            .collect(),
        calls: Arc::clone(&calls),
    };
    (Box::new(completer), calls)
}

fn pipeline(config: Config, embedder: Box<dyn Embedder>, completer: Box<dyn Completer>) -> Pipeline {
    Pipeline::new(
        config,
        Box::new(WordTokenizer),
        embedder,
        completer,
        Box::new(InMemoryVectorStore::new()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_no_metrics_yields_nothing() {
    let (tmp, config) = workspace("# Metrics\n\nNone yet.\n");
    add_inputs(&tmp);
    let (completer, calls) = scripted(&[]);
    let p = pipeline(config, Box::new(KeywordEmbedder), completer);

    assert!(p.run().await.unwrap().is_empty());
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(p.store().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_no_input_yields_nothing() {
    let (_tmp, config) = workspace(METRICS);
    let (completer, calls) = scripted(&[("Retention Rate", "x")]);
    let p = pipeline(config, Box::new(KeywordEmbedder), completer);

    assert!(p.run().await.unwrap().is_empty());
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_metrics_file_is_error() {
    let (tmp, config) = workspace(METRICS);
    fs::remove_file(tmp.path().join("metrics.md")).unwrap();
    let (completer, _) = scripted(&[]);
    let p = pipeline(config, Box::new(KeywordEmbedder), completer);
    assert!(p.run().await.is_err());
}

#[tokio::test]
async fn test_run_proposes_revised_metrics_only() {
    let (tmp, config) = workspace(METRICS);
    add_inputs(&tmp);
    let (completer, calls) = scripted(&[
        ("Retention Rate", "  Retention fell to 65% after the price change (q4.md).\n"),
        ("Net Promoter Score", NO_UPDATE_MARKER),
    ]);
    let p = pipeline(config, Box::new(KeywordEmbedder), completer);

    let proposals = p.run().await.unwrap();

    // Repeat Purchase Rate has no scripted reply: its failure is skipped.
    assert_eq!(proposals.len(), 1);
    let retention = &proposals[0];
    assert_eq!(retention.metric, "Retention Rate");
    assert_eq!(
        retention.update_text,
        "Retention fell to 65% after the price change (q4.md)."
    );
    assert_eq!(retention.source, "q4.md");
    assert_eq!(retention.status, UpdateStatus::Pending);

    let mut called = calls.lock().unwrap().clone();
    called.sort();
    assert_eq!(called, vec!["Net Promoter Score", "Retention Rate"]);

    assert_eq!(p.store().count().await.unwrap(), 2);
    // Run never writes the report.
    assert_eq!(fs::read_to_string(tmp.path().join("report.md")).unwrap(), REPORT);
}

#[tokio::test]
async fn test_source_is_top_ranked_chunk() {
    let (tmp, config) = workspace(METRICS);
    add_inputs(&tmp);
    let (completer, _) = scripted(&[("Net Promoter Score", "NPS up on promoter growth.")]);
    let p = pipeline(config, Box::new(KeywordEmbedder), completer);

    let proposals = p.run().await.unwrap();
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].metric, "Net Promoter Score");
    assert_eq!(proposals[0].source, "survey.txt");
}

#[tokio::test]
async fn test_embedding_failure_aborts_run() {
    let (tmp, config) = workspace(METRICS);
    add_inputs(&tmp);
    let (completer, calls) = scripted(&[("Retention Rate", "x")]);
    let p = pipeline(config, Box::new(FailingEmbedder), completer);

    let err = p.run().await.unwrap_err();
    assert!(format!("{:#}", err).contains("provider unavailable"));
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_retrieve_and_summarize() {
    let (tmp, config) = workspace(METRICS);
    add_inputs(&tmp);
    let (completer, _) = scripted(&[]);
    let p = pipeline(config, Box::new(KeywordEmbedder), completer);

    let (ingested, stats) = p.index().await.unwrap();
    assert_eq!(ingested.files_seen, 2);
    assert_eq!(stats.embedded, 2);

    let hits = p.retrieve("retention", Some(1)).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "q4.md_chunk_0");

    let hits = p.retrieve("promoter", None).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].source_filename, "survey.txt");
    assert!(hits[0].distance <= hits[1].distance);
}

#[tokio::test]
async fn test_run_then_approve_updates_report() {
    let (tmp, config) = workspace(METRICS);
    add_inputs(&tmp);
    let ledger_path = config.paths.proposals.clone();
    let (completer, _) = scripted(&[
        ("Retention Rate", "Retention fell to 65% (q4.md)."),
        ("Net Promoter Score", NO_UPDATE_MARKER),
        ("Repeat Purchase Rate", NO_UPDATE_MARKER),
    ]);
    let p = pipeline(config, Box::new(KeywordEmbedder), completer);

    let mut ledger = ProposalLedger::load(&ledger_path).unwrap();
    ledger.merge(p.run().await.unwrap());
    ledger.save().unwrap();

    let mut ledger = ProposalLedger::load(&ledger_path).unwrap();
    assert_eq!(ledger.pending().count(), 1);
    ledger
        .approve("Retention Rate", p.report(), p.editor())
        .await
        .unwrap();

    let report = fs::read_to_string(tmp.path().join("report.md")).unwrap();
    assert_eq!(
        report,
        REPORT.replace("Retention is 80%.", "Retention fell to 65% (q4.md).")
    );
}
