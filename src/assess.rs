//! Per-metric significance assessment and summaries.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use loyalty_monitor_core::completion::{Completer, CompletionOptions, Message};
use loyalty_monitor_core::models::RetrievedChunk;
use loyalty_monitor_core::prompt::{
    assessment_prompt, format_context, parse_assessment, summary_prompt, Assessment,
};
use loyalty_monitor_core::section::SectionEditor;

/// Ask the model whether `retrieved` warrants revising `metric`'s section.
///
/// With nothing retrieved the answer is [`Assessment::NoUpdate`] and the
/// model is not called. A metric with no section in the report is assessed
/// against an empty baseline.
pub async fn assess_metric(
    report_text: &str,
    metric: &str,
    retrieved: &[RetrievedChunk],
    editor: &SectionEditor,
    completer: &dyn Completer,
    options: &CompletionOptions,
) -> Result<Assessment> {
    if retrieved.is_empty() {
        debug!(metric, "no retrieved chunks; nothing to assess");
        return Ok(Assessment::NoUpdate);
    }

    let current = match editor.extract(report_text, metric) {
        Some(body) => body,
        None => {
            warn!(metric, "metric section not found in report; treating as empty");
            String::new()
        }
    };

    let prompt = assessment_prompt(metric, &current, &format_context(retrieved));
    let reply = completer
        .complete(&[Message::user(prompt)], options)
        .await
        .with_context(|| format!("Assessment request failed for metric '{}'", metric))?;

    Ok(parse_assessment(&reply))
}

/// Summarize what `retrieved` says about `metric`.
///
/// Returns `None` without calling the model when nothing was retrieved.
pub async fn summarize_metric(
    metric: &str,
    retrieved: &[RetrievedChunk],
    completer: &dyn Completer,
    options: &CompletionOptions,
) -> Result<Option<String>> {
    if retrieved.is_empty() {
        return Ok(None);
    }
    let prompt = summary_prompt(metric, &format_context(retrieved));
    let reply = completer
        .complete(&[Message::user(prompt)], options)
        .await
        .with_context(|| format!("Summary request failed for metric '{}'", metric))?;
    Ok(Some(reply.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a fixed reply and records the prompts it was sent.
    struct ScriptedCompleter {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedCompleter {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Completer for ScriptedCompleter {
        fn model_name(&self) -> &str {
            "scripted"
        }
        async fn complete(&self, messages: &[Message], _options: &CompletionOptions) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push(messages[0].content.clone());
            Ok(self.reply.clone())
        }
    }

    const REPORT: &str = "### A. Retention\nRetention is 80%.\n\n### B. Engagement\nStable.\n";

    fn hit(text: &str, source: &str) -> RetrievedChunk {
        RetrievedChunk {
            id: format!("{}_chunk_0", source),
            text: text.to_string(),
            source_filename: source.to_string(),
            distance: 0.1,
        }
    }

    #[tokio::test]
    async fn test_empty_retrieval_skips_model() {
        let completer = ScriptedCompleter::new("should not be used");
        let out = assess_metric(
            REPORT,
            "Retention",
            &[],
            &SectionEditor::default(),
            &completer,
            &CompletionOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(out, Assessment::NoUpdate);
        assert!(completer.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_revised_reply() {
        let completer = ScriptedCompleter::new("  Retention fell to 65% (q4.pdf).\n");
        let out = assess_metric(
            REPORT,
            "Retention",
            &[hit("Retention dropped 15%.", "q4.pdf")],
            &SectionEditor::default(),
            &completer,
            &CompletionOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(
            out,
            Assessment::Revised("Retention fell to 65% (q4.pdf).".to_string())
        );

        let prompts = completer.prompts.lock().unwrap();
        assert!(prompts[0].contains("Retention is 80%."));
        assert!(prompts[0].contains("--- Excerpt 1 (Source: q4.pdf) ---"));
    }

    #[tokio::test]
    async fn test_marker_reply() {
        let completer = ScriptedCompleter::new("NO_UPDATE_NEEDED");
        let out = assess_metric(
            REPORT,
            "Engagement",
            &[hit("Sentiment positive.", "social.txt")],
            &SectionEditor::default(),
            &completer,
            &CompletionOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(out, Assessment::NoUpdate);
    }

    #[tokio::test]
    async fn test_missing_section_uses_empty_baseline() {
        let completer = ScriptedCompleter::new("New section text.");
        assess_metric(
            REPORT,
            "Advocacy",
            &[hit("Referrals up.", "memo.md")],
            &SectionEditor::default(),
            &completer,
            &CompletionOptions::default(),
        )
        .await
        .unwrap();
        let prompts = completer.prompts.lock().unwrap();
        assert!(prompts[0].contains("```text\n\n```"));
    }

    #[tokio::test]
    async fn test_summarize() {
        let completer = ScriptedCompleter::new(" Summary. ");
        let opts = CompletionOptions::default();
        assert_eq!(
            summarize_metric("Churn", &[], &completer, &opts).await.unwrap(),
            None
        );
        assert_eq!(
            summarize_metric("Churn", &[hit("x", "a.md")], &completer, &opts)
                .await
                .unwrap()
                .as_deref(),
            Some("Summary.")
        );
    }
}
