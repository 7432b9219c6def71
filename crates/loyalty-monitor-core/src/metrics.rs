//! Metric catalogue parsing.
//!
//! Metrics are listed in a Markdown table whose first column holds the
//! metric name in bold:
//!
//! ```text
//! | Metric | Definition |
//! | :--- | :--- |
//! | **Customer Retention Rate** | Share of customers retained ... |
//! ```

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

fn first_cell_bold() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\|[ \t]*\*\*(.*?)\*\*[ \t]*\|").expect("static metric regex")
    })
}

/// Metric names from the bold first-column cells of every table row.
///
/// Names are trimmed; empty names, alignment rows and repeats are skipped.
/// Order of first appearance is preserved.
pub fn parse_metric_names(markdown: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for caps in first_cell_bold().captures_iter(markdown) {
        let name = caps[1].trim();
        if name.is_empty() || name.starts_with(":---") {
            continue;
        }
        if seen.insert(name.to_string()) {
            names.push(name.to_string());
        }
    }

    names
}
