//! Report section editor.
//!
//! Locates a named section inside a Markdown-like report by its heading,
//! extracts the section body, and splices a replacement body in place while
//! leaving every byte outside the body untouched.
//!
//! A heading is a line that starts with a run of marker characters (`#` by
//! default). The run length is the heading *level*. A section's body runs
//! from the line after its heading to the next heading of the same or a
//! shallower level, or to the end of the report. Deeper headings inside the
//! body belong to it, so nested sub-sections never cut a section short.
//!
//! Headings may carry an enumerator before the name (`### A. Retention`,
//! `### III.1 Retention`). Which enumerators are accepted is controlled by
//! [`PrefixRule`].
//!
//! # Example
//!
//! ```rust
//! use loyalty_monitor_core::section::{extract_section, replace_section};
//!
//! let report = "### A. Retention\nOld text.\n\n### B. Engagement\nOther.\n";
//! assert_eq!(extract_section(report, "Retention").as_deref(), Some("Old text."));
//!
//! let updated = replace_section(report, "Retention", "New data point.").unwrap();
//! assert_eq!(updated, "### A. Retention\nNew data point.\n\n### B. Engagement\nOther.\n");
//! ```

use anyhow::{bail, Context, Result};
use regex::Regex;

/// One uppercase letter or digit followed by `.`, `)` or `:` (`A.`, `3)`).
const SINGLE_TOKEN_PREFIX: &str = r"[A-Z0-9][.):]";

/// Dotted multi-level numbering: `III.1`, `III.1.`, `2.3.4`, `A.`.
const OUTLINE_PREFIX: &str = r"(?:[IVXLCDM]+|[A-Z]|[0-9]+)(?:\.(?:[IVXLCDM]+|[A-Z]|[0-9]+))*[.):]?";

/// Which enumerators may precede a section name in its heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixRule {
    /// The name must follow the heading markers directly.
    None,
    /// A single uppercase letter or digit plus a separator.
    SingleToken,
    /// Multi-level dotted numbering, including roman numerals.
    Outline,
    /// A caller-supplied regex fragment matching the whole enumerator.
    Custom(String),
}

impl PrefixRule {
    fn pattern(&self) -> Option<&str> {
        match self {
            PrefixRule::None => None,
            PrefixRule::SingleToken => Some(SINGLE_TOKEN_PREFIX),
            PrefixRule::Outline => Some(OUTLINE_PREFIX),
            PrefixRule::Custom(p) => Some(p.as_str()),
        }
    }
}

/// Heading syntax of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingGrammar {
    /// Character repeated at line start to mark a heading.
    pub marker: char,
    pub prefix: PrefixRule,
    /// Only match section headings at exactly this level; `None` matches any.
    pub level: Option<usize>,
}

impl Default for HeadingGrammar {
    fn default() -> Self {
        Self {
            marker: '#',
            prefix: PrefixRule::SingleToken,
            level: None,
        }
    }
}

/// Byte layout of a located section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpan {
    /// Marker run length of the matched heading.
    pub level: usize,
    /// Start of the heading line.
    pub heading_start: usize,
    /// First byte after the heading line.
    pub body_start: usize,
    /// Start of the next equal-or-shallower heading, or the report length.
    pub body_end: usize,
}

/// A heading line found by [`SectionEditor::headings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: usize,
    /// Heading text after the markers, trimmed.
    pub title: String,
    /// Byte offset of the heading line.
    pub offset: usize,
}

/// Locates, extracts, and replaces named sections under one [`HeadingGrammar`].
#[derive(Debug, Clone)]
pub struct SectionEditor {
    grammar: HeadingGrammar,
}

impl Default for SectionEditor {
    fn default() -> Self {
        Self {
            grammar: HeadingGrammar::default(),
        }
    }
}

impl SectionEditor {
    /// Build an editor, validating the grammar.
    ///
    /// # Errors
    ///
    /// Fails if the marker is whitespace, the level is zero, or a custom
    /// prefix fragment is not a valid regex.
    pub fn new(grammar: HeadingGrammar) -> Result<Self> {
        if grammar.marker.is_whitespace() {
            bail!("heading marker must not be whitespace");
        }
        if grammar.level == Some(0) {
            bail!("heading level must be >= 1");
        }
        if let PrefixRule::Custom(fragment) = &grammar.prefix {
            if fragment.trim().is_empty() {
                bail!("custom heading prefix pattern is empty");
            }
            Regex::new(&format!("^(?:{})$", fragment))
                .with_context(|| format!("invalid heading prefix pattern: {}", fragment))?;
        }
        Ok(Self { grammar })
    }

    pub fn grammar(&self) -> &HeadingGrammar {
        &self.grammar
    }

    fn heading_regex(&self, name: &str) -> Option<Regex> {
        let marker = regex::escape(&self.grammar.marker.to_string());
        let marks = match self.grammar.level {
            Some(level) => format!("(?:{}){{{}}}", marker, level),
            None => format!("(?:{})+", marker),
        };
        let prefix = self
            .grammar
            .prefix
            .pattern()
            .map(|p| format!("(?:(?:{})[ \\t]+)?", p))
            .unwrap_or_default();
        let pattern = format!(
            r"(?m)^(?P<marks>{})[ \t]+{}(?i:{})[ \t]*\r?(?:\n|\z)",
            marks,
            prefix,
            regex::escape(name)
        );
        Regex::new(&pattern).ok()
    }

    /// Marker run length of `line` if it is a heading line.
    fn heading_level(&self, line: &str) -> Option<usize> {
        let mut run = 0;
        let mut rest = line;
        while let Some(stripped) = rest.strip_prefix(self.grammar.marker) {
            run += 1;
            rest = stripped;
        }
        if run == 0 {
            return None;
        }
        match rest.chars().next() {
            None => Some(run),
            Some(c) if c.is_whitespace() => Some(run),
            Some(_) => None,
        }
    }

    /// Find the section headed by `name` (case-insensitive).
    ///
    /// Returns `None` for an empty report, an empty name, or when no
    /// heading matches.
    pub fn locate(&self, report: &str, name: &str) -> Option<SectionSpan> {
        let name = name.trim();
        if report.is_empty() || name.is_empty() {
            return None;
        }

        let re = self.heading_regex(name)?;
        let caps = re.captures(report)?;
        let whole = caps.get(0)?;
        let level = caps.name("marks")?.as_str().chars().count();
        let body_start = whole.end();

        Some(SectionSpan {
            level,
            heading_start: whole.start(),
            body_start,
            body_end: self.next_heading_at_or_above(report, body_start, level),
        })
    }

    fn next_heading_at_or_above(&self, report: &str, from: usize, level: usize) -> usize {
        let mut pos = from;
        while pos < report.len() {
            let line_end = report[pos..]
                .find('\n')
                .map(|i| pos + i + 1)
                .unwrap_or(report.len());
            if let Some(run) = self.heading_level(&report[pos..line_end]) {
                if run <= level {
                    return pos;
                }
            }
            pos = line_end;
        }
        report.len()
    }

    /// Extract the trimmed body of the section headed by `name`.
    ///
    /// `Some("")` means the heading exists with nothing under it; `None`
    /// means no such heading.
    pub fn extract(&self, report: &str, name: &str) -> Option<String> {
        let span = self.locate(report, name)?;
        Some(report[span.body_start..span.body_end].trim().to_string())
    }

    /// Replace the body of the section headed by `name`.
    ///
    /// The heading line and everything outside the body are preserved byte
    /// for byte. Returns `None` (and the caller keeps its text) when the
    /// heading is not found.
    pub fn replace(&self, report: &str, name: &str, new_body: &str) -> Option<String> {
        let span = self.locate(report, name)?;
        let body = normalize_body(new_body);
        let head = &report[..span.body_start];
        let tail = &report[span.body_end..];

        let mut out = String::with_capacity(head.len() + body.len() + tail.len() + 1);
        out.push_str(head);
        // Heading on the last line with no newline after it.
        if !head.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&body);
        out.push_str(tail);
        Some(out)
    }

    /// All heading lines in `report`, in document order.
    pub fn headings(&self, report: &str) -> Vec<Heading> {
        let mut out = Vec::new();
        let mut offset = 0;
        for line in report.split_inclusive('\n') {
            if let Some(level) = self.heading_level(line) {
                let title = line
                    .trim_start_matches(self.grammar.marker)
                    .trim()
                    .to_string();
                out.push(Heading {
                    level,
                    title,
                    offset,
                });
            }
            offset += line.len();
        }
        out
    }
}

/// Normalize a replacement body before splicing.
///
/// Non-empty bodies are trimmed and end with exactly two newlines, leaving
/// one blank line before the next heading. Empty bodies become a single
/// newline so the heading is not glued to the next one.
pub fn normalize_body(new_body: &str) -> String {
    let trimmed = new_body.trim();
    if trimmed.is_empty() {
        "\n".to_string()
    } else {
        format!("{}\n\n", trimmed)
    }
}

/// [`SectionEditor::extract`] with the default grammar.
pub fn extract_section(report: &str, name: &str) -> Option<String> {
    SectionEditor::default().extract(report, name)
}

/// [`SectionEditor::replace`] with the default grammar.
pub fn replace_section(report: &str, name: &str, new_body: &str) -> Option<String> {
    SectionEditor::default().replace(report, name, new_body)
}
