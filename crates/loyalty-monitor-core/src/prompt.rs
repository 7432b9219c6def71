//! Assessment prompt protocol.
//!
//! Builds the prompts sent to the completion model and interprets its
//! replies. A reply is either a revised section body or the exact
//! [`NO_UPDATE_MARKER`] string.

use crate::models::{RetrievedChunk, UNKNOWN_SOURCE};

/// Reply that means "the current section is still accurate".
pub const NO_UPDATE_MARKER: &str = "NO_UPDATE_NEEDED";

/// Interpreted model reply for one metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assessment {
    NoUpdate,
    /// Revised section body, trimmed.
    Revised(String),
}

/// Render retrieved chunks as numbered, source-attributed excerpts.
///
/// ```rust
/// use loyalty_monitor_core::models::RetrievedChunk;
/// use loyalty_monitor_core::prompt::format_context;
///
/// let chunks = vec![RetrievedChunk {
///     id: "q4.pdf_chunk_0".into(),
///     text: "Retention fell 15%.".into(),
///     source_filename: "q4.pdf".into(),
///     distance: 0.05,
/// }];
/// assert_eq!(
///     format_context(&chunks),
///     "--- Excerpt 1 (Source: q4.pdf) ---\nRetention fell 15%."
/// );
/// ```
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let source = if chunk.source_filename.is_empty() {
            UNKNOWN_SOURCE
        } else {
            chunk.source_filename.as_str()
        };
        out.push_str(&format!("--- Excerpt {} (Source: {}) ---\n", i + 1, source));
        out.push_str(&chunk.text);
        out.push_str("\n\n");
    }
    out.trim().to_string()
}

/// Prompt asking whether `context` warrants revising the section for `metric`.
pub fn assessment_prompt(metric: &str, current_section: &str, context: &str) -> String {
    format!(
        r#"You are analyzing updates for a Brand Loyalty Monitoring Report.
Your task is to determine if new information warrants an update to a specific metric section in the report.

**Metric Name:** {metric}

**Current Report Section Content:**
```text
{current_section}
```

**Newly Retrieved Context:**
Here are relevant excerpts retrieved from new documents. Each includes its source filename.
```text
{context}
```

**Instructions:**
1. **Compare:** Analyze the `Newly Retrieved Context` against the `Current Report Section Content` for the metric **{metric}**.
2. **Assess Significance:** Determine if the new information provides a *significant* update (new data points, trends, substantial changes, contradicting information) compared to the current content. Minor wording changes or information already captured are NOT significant.
3. **Output:**
   * **If a significant update IS warranted:** Synthesize the key information from the `Newly Retrieved Context` and integrate it with the `Current Report Section Content` where appropriate to produce a *revised* paragraph for the report section. Keep it concise and reflect the *latest* significant information. Cite the source filename(s) from the retrieved context (e.g., "According to report1.pdf...", "Source: report2.md").
   * **If NO significant update is warranted:** Respond ONLY with the exact phrase: `{marker}`

**Response:**
"#,
        metric = metric,
        current_section = current_section,
        context = context,
        marker = NO_UPDATE_MARKER,
    )
}

/// Prompt asking for a plain summary of `context` for `metric`.
pub fn summary_prompt(metric: &str, context: &str) -> String {
    format!(
        r#"You are summarizing information relevant to brand loyalty metrics.

**Context:**
The following text excerpts were retrieved for the brand loyalty metric: **{metric}**.
Each excerpt names its source file.

```text
{context}
```

**Task:**
Synthesize the key information from the context above specifically regarding the **{metric}** metric.
Write one concise summary paragraph.

**Important:**
- Use ONLY the provided context excerpts.
- Extract information directly relevant to **{metric}**.
- Cite the source filename(s) for the information used (e.g., "According to report1.pdf...", "report2.md mentions...").
- If the context contains no relevant information for the metric, say so clearly.

**Summary:**
"#,
        metric = metric,
        context = context,
    )
}

/// Interpret a completion reply.
///
/// The reply is trimmed; an exact match of [`NO_UPDATE_MARKER`] or an empty
/// reply is [`Assessment::NoUpdate`], anything else is a revised body.
pub fn parse_assessment(response: &str) -> Assessment {
    let trimmed = response.trim();
    if trimmed.is_empty() || trimmed == NO_UPDATE_MARKER {
        Assessment::NoUpdate
    } else {
        Assessment::Revised(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str, source: &str) -> RetrievedChunk {
        RetrievedChunk {
            id: id.to_string(),
            text: text.to_string(),
            source_filename: source.to_string(),
            distance: 0.1,
        }
    }

    #[test]
    fn test_format_context_numbers_and_sources() {
        let chunks = vec![
            chunk("a", "Customer retention seems high.", "survey_q3.pdf"),
            chunk("b", "NPS improved slightly.", "internal_memo.md"),
        ];
        assert_eq!(
            format_context(&chunks),
            "--- Excerpt 1 (Source: survey_q3.pdf) ---\nCustomer retention seems high.\n\n--- Excerpt 2 (Source: internal_memo.md) ---\nNPS improved slightly."
        );
    }

    #[test]
    fn test_format_context_unknown_source() {
        let out = format_context(&[chunk("a", "text", "")]);
        assert!(out.starts_with("--- Excerpt 1 (Source: Unknown Source) ---"));
    }

    #[test]
    fn test_format_context_empty() {
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_assessment_prompt_contents() {
        let p = assessment_prompt("Retention", "Old text.", "--- Excerpt 1 (Source: q4.pdf) ---\nNew.");
        assert!(p.contains("**Metric Name:** Retention"));
        assert!(p.contains("```text\nOld text.\n```"));
        assert!(p.contains("(Source: q4.pdf)"));
        assert!(p.contains("`NO_UPDATE_NEEDED`"));
    }

    #[test]
    fn test_summary_prompt_contents() {
        let p = summary_prompt("Churn", "ctx");
        assert!(p.contains("**Churn**"));
        assert!(p.contains("```text\nctx\n```"));
        assert!(!p.contains(NO_UPDATE_MARKER));
    }

    #[test]
    fn test_parse_assessment() {
        assert_eq!(parse_assessment("NO_UPDATE_NEEDED"), Assessment::NoUpdate);
        assert_eq!(parse_assessment("  NO_UPDATE_NEEDED\n"), Assessment::NoUpdate);
        assert_eq!(parse_assessment("   "), Assessment::NoUpdate);
        assert_eq!(
            parse_assessment("\nRetention fell 15% (q4.pdf).\n"),
            Assessment::Revised("Retention fell 15% (q4.pdf).".to_string())
        );
        // Marker embedded in prose is an update, not a refusal.
        assert!(matches!(
            parse_assessment("NO_UPDATE_NEEDED because nothing changed"),
            Assessment::Revised(_)
        ));
    }
}
