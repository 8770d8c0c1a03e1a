//! PDF extraction with per-page failure recovery.

use lopdf::Document;

use super::{ExtractedText, FormatExtractor};
use crate::types::RagError;

/// Extracts PDF text page by page.
///
/// A page that cannot be read is logged and skipped; one bad page never
/// aborts the document. The reported page count is the document's full page
/// count regardless of how many pages yielded text. Pages that do yield
/// text are tagged with an inline `[Page N]` marker for provenance.
pub struct PdfExtractor;

impl FormatExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, RagError> {
        let document = Document::load_mem(bytes)
            .map_err(|err| RagError::Extraction(format!("failed to parse pdf: {err}")))?;

        let pages = document.get_pages();
        let page_count = pages.len() as u32;

        let mut text = String::new();
        for &number in pages.keys() {
            match document.extract_text(&[number]) {
                Ok(page_text) if !page_text.trim().is_empty() => {
                    text.push_str(&format!("\n[Page {number}]\n{page_text}\n"));
                }
                Ok(_) => {
                    tracing::debug!(page = number, "pdf page produced no text");
                }
                Err(err) => {
                    tracing::warn!(page = number, error = %err, "skipping unreadable pdf page");
                }
            }
        }

        Ok(ExtractedText { text, page_count })
    }
}
