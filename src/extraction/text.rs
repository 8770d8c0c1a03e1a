//! Plain text and markdown extraction.

use super::{ExtractedText, FormatExtractor, estimate_page_count};
use crate::types::RagError;

/// Reads bytes as UTF-8, replacing invalid sequences instead of rejecting
/// the document. Page count is estimated from word count.
pub struct PlainTextExtractor;

impl FormatExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, RagError> {
        let text = String::from_utf8_lossy(bytes).into_owned();
        let page_count = estimate_page_count(&text);
        Ok(ExtractedText { text, page_count })
    }
}
