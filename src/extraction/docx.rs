//! DOCX extraction via paragraph traversal.

use docx_rs::{DocumentChild, read_docx};

use super::{ExtractedText, FormatExtractor, estimate_page_count};
use crate::types::RagError;

/// Concatenates non-blank paragraph text in document order.
///
/// DOCX carries no reliable page boundaries (pagination is a rendering
/// concern), so the page count is estimated from word count like plain text.
pub struct DocxExtractor;

impl FormatExtractor for DocxExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, RagError> {
        let docx = read_docx(bytes)
            .map_err(|err| RagError::Extraction(format!("failed to parse docx: {err}")))?;

        let mut text = String::new();
        for child in &docx.document.children {
            if let DocumentChild::Paragraph(paragraph) = child {
                let paragraph_text = paragraph.raw_text();
                if !paragraph_text.trim().is_empty() {
                    text.push_str(&paragraph_text);
                    text.push('\n');
                }
            }
        }

        let page_count = estimate_page_count(&text);
        Ok(ExtractedText { text, page_count })
    }
}
