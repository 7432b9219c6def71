//! Plain-text extraction for input documents.
//!
//! Markdown and text files are read as UTF-8; PDFs go through
//! `pdf-extract`. Extraction never panics: a failure is returned as an
//! [`ExtractError`] and the ingestion step skips the file.

use std::path::Path;

/// Document kinds the ingester understands, by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Markdown,
    Text,
    Pdf,
}

impl DocumentKind {
    /// Kind for `path`, matching the extension case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some(DocumentKind::Markdown),
            "txt" => Some(DocumentKind::Text),
            "pdf" => Some(DocumentKind::Pdf),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ExtractError {
    UnsupportedType(String),
    Io(std::io::Error),
    Pdf(String),
    /// Extraction succeeded but produced only whitespace.
    Empty,
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedType(p) => write!(f, "unsupported file type: {}", p),
            ExtractError::Io(e) => write!(f, "read failed: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Empty => write!(f, "no text extracted"),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract the text of the document at `path`.
pub fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let kind = DocumentKind::from_path(path)
        .ok_or_else(|| ExtractError::UnsupportedType(path.display().to_string()))?;

    let text = match kind {
        DocumentKind::Markdown | DocumentKind::Text => {
            std::fs::read_to_string(path).map_err(ExtractError::Io)?
        }
        DocumentKind::Pdf => {
            let bytes = std::fs::read(path).map_err(ExtractError::Io)?;
            extract_pdf(&bytes)?
        }
    };

    if text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(text)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn kind_from_extension_is_case_insensitive() {
        assert_eq!(
            DocumentKind::from_path(Path::new("a/Q4.PDF")),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("notes.Markdown")),
            Some(DocumentKind::Markdown)
        );
        assert_eq!(DocumentKind::from_path(Path::new("x.docx")), None);
        assert_eq!(DocumentKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn reads_markdown_verbatim() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("q4.md");
        std::fs::write(&path, "# Q4\n\nRetention fell.\n").unwrap();
        assert_eq!(extract_text(&path).unwrap(), "# Q4\n\nRetention fell.\n");
    }

    #[test]
    fn empty_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blank.txt");
        std::fs::write(&path, "  \n").unwrap();
        assert!(matches!(extract_text(&path), Err(ExtractError::Empty)));
    }

    /// Single-page PDF drawing `phrase` in Helvetica, with a valid xref.
    fn minimal_pdf(phrase: &str) -> Vec<u8> {
        let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
        let mut out = Vec::new();
        let mut offsets = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        offsets.push(out.len());
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        offsets.push(out.len());
        out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        offsets.push(out.len());
        out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content.len(),
                content
            )
            .as_bytes(),
        );
        offsets.push(out.len());
        out.extend_from_slice(
            b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
        );
        let xref_start = out.len();
        out.extend_from_slice(b"xref\n0 6\n");
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
        out.extend_from_slice(b"%%EOF\n");
        out
    }

    #[test]
    fn reads_pdf_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("q4.pdf");
        std::fs::write(&path, minimal_pdf("Retention fell to 65 percent")).unwrap();
        let text = extract_text(&path).unwrap();
        assert!(text.contains("Retention fell to 65 percent"), "got: {:?}", text);
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        assert!(matches!(extract_text(&path), Err(ExtractError::Pdf(_))));
    }

    #[test]
    fn unsupported_type_returns_error() {
        let err = extract_text(Path::new("slides.pptx")).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedType(_)));
    }

    #[test]
    fn non_utf8_text_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("latin1.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x41]).unwrap();
        assert!(matches!(extract_text(&path), Err(ExtractError::Io(_))));
    }
}
