//! Format-aware text extraction.
//!
//! Every supported format implements the same contract: raw bytes in, plain
//! text plus a page count out. Page provenance for paginated formats is
//! tagged inline as `[Page N]` markers, which the segmenter later strips
//! into structured metadata.

pub mod docx;
pub mod pdf;
pub mod text;

use serde::{Deserialize, Serialize};

use crate::types::RagError;

pub use docx::DocxExtractor;
pub use pdf::PdfExtractor;
pub use text::PlainTextExtractor;

/// Words assumed per page when a format has no native page boundaries.
pub(crate) const WORDS_PER_PAGE: usize = 500;

/// Declared format of an uploaded document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Txt,
    Md,
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Resolves the format from a file name's extension.
    pub fn from_file_name(file_name: &str) -> Result<Self, RagError> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "txt" => Ok(Self::Txt),
            "md" => Ok(Self::Md),
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            other => Err(RagError::UnsupportedFormat(if other.is_empty() {
                format!("'{file_name}' has no file extension")
            } else {
                other.to_string()
            })),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Md => "md",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extraction output: the document's text and how many pages it has.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: u32,
}

/// The per-format extraction contract.
pub trait FormatExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, RagError>;
}

/// Extracts `bytes` according to the declared `format`.
pub fn extract(bytes: &[u8], format: DocumentFormat) -> Result<ExtractedText, RagError> {
    match format {
        DocumentFormat::Txt | DocumentFormat::Md => PlainTextExtractor.extract(bytes),
        DocumentFormat::Pdf => PdfExtractor.extract(bytes),
        DocumentFormat::Docx => DocxExtractor.extract(bytes),
    }
}

/// `max(1, words / 500)`: the estimate used by formats without native
/// pagination.
pub(crate) fn estimate_page_count(text: &str) -> u32 {
    let words = text.split_whitespace().count();
    ((words / WORDS_PER_PAGE).max(1)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_extensions() {
        assert_eq!(
            DocumentFormat::from_file_name("notes.TXT").unwrap(),
            DocumentFormat::Txt
        );
        assert_eq!(
            DocumentFormat::from_file_name("report.v2.pdf").unwrap(),
            DocumentFormat::Pdf
        );
    }

    #[test]
    fn rejects_unknown_extensions() {
        let err = DocumentFormat::from_file_name("archive.zip").unwrap_err();
        assert_eq!(err.kind(), "unsupported_format");
        let err = DocumentFormat::from_file_name("no_extension").unwrap_err();
        assert_eq!(err.kind(), "unsupported_format");
    }

    #[test]
    fn page_estimate_floors_at_one() {
        assert_eq!(estimate_page_count("a few words only"), 1);
        let long = "word ".repeat(1200);
        assert_eq!(estimate_page_count(&long), 2);
    }
}
