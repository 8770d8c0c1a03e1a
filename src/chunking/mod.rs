//! Token-bounded passage segmentation with overlap.
//!
//! The [`Chunker`] turns extracted document text into an ordered batch of
//! passages sized for embedding: sentences are accumulated greedily under a
//! token budget, and each chunk after the first is seeded with the decoded
//! trailing tokens of its predecessor so context survives the boundary.

pub mod segmenter;
pub mod tokenizer;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::types::RagError;

pub use segmenter::{Segmenter, Sentence};
pub use tokenizer::TokenCounter;

/// A chunk produced from one document, before any ids are assigned.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkDraft {
    /// Dense, zero-based position within the document.
    pub chunk_index: usize,
    pub text: String,
    /// Pages the chunk text spans; sorted, non-empty, `[1]` when unknown.
    pub page_numbers: Vec<u32>,
    /// Token count of the final chunk text.
    pub token_count: usize,
}

pub struct Chunker {
    counter: Arc<TokenCounter>,
    segmenter: Segmenter,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(counter: Arc<TokenCounter>, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            counter,
            segmenter: Segmenter::new(),
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn from_config(counter: Arc<TokenCounter>, config: &RagConfig) -> Self {
        Self::new(counter, config.chunk_size, config.chunk_overlap)
    }

    /// Segments `text` into ordered chunks. Recomputes from scratch on every
    /// call; empty or sentence-free input yields an empty batch (the caller
    /// decides whether that is an error).
    ///
    /// A single sentence whose token count alone exceeds the budget is
    /// emitted whole rather than truncated mid-sentence: the size check only
    /// fires against a non-empty buffer.
    pub fn chunk(&self, text: &str) -> Result<Vec<ChunkDraft>, RagError> {
        let sentences = self.segmenter.segment(text);

        let mut chunks: Vec<ChunkDraft> = Vec::new();
        let mut buffer = String::new();
        let mut buffer_tokens = 0usize;
        let mut buffer_pages: BTreeSet<u32> = BTreeSet::new();

        for sentence in sentences {
            let sentence_tokens = self.counter.count(&sentence.text);

            if buffer_tokens + sentence_tokens > self.chunk_size && !buffer.is_empty() {
                let closed = self.close(&buffer, &buffer_pages, chunks.len());
                let overlap = self.counter.tail(&closed.text, self.chunk_overlap)?;
                // The tail comes from the end of the closed chunk, so it
                // belongs to that chunk's last page.
                let carried_page = closed.page_numbers.last().copied().unwrap_or(1);
                chunks.push(closed);

                buffer = format!("{} {}", overlap, sentence.text);
                buffer_tokens = self.counter.count(&buffer);
                buffer_pages = std::iter::once(carried_page)
                    .chain(sentence.pages.iter().copied())
                    .collect();
            } else {
                if buffer.is_empty() {
                    buffer = sentence.text.clone();
                } else {
                    buffer.push(' ');
                    buffer.push_str(&sentence.text);
                }
                buffer_tokens += sentence_tokens;
                buffer_pages.extend(sentence.pages.iter().copied());
            }
        }

        if !buffer.trim().is_empty() {
            let closed = self.close(&buffer, &buffer_pages, chunks.len());
            chunks.push(closed);
        }

        Ok(chunks)
    }

    fn close(&self, buffer: &str, pages: &BTreeSet<u32>, chunk_index: usize) -> ChunkDraft {
        let text = buffer.trim().to_string();
        let token_count = self.counter.count(&text);
        let page_numbers = if pages.is_empty() {
            vec![1]
        } else {
            pages.iter().copied().collect()
        };
        ChunkDraft {
            chunk_index,
            text,
            page_numbers,
            token_count,
        }
    }
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(chunk_size: usize, chunk_overlap: usize) -> Chunker {
        let counter = Arc::new(TokenCounter::new().unwrap());
        Chunker::new(counter, chunk_size, chunk_overlap)
    }

    fn filler_text(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("the quick brown fox number {i} jumps over the lazy dog."))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = chunker(500, 50);
        assert!(chunker.chunk("").unwrap().is_empty());
        assert!(chunker.chunk("   \n ").unwrap().is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = chunker(500, 50);
        let chunks = chunker.chunk("A single short sentence.").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "A single short sentence");
        assert_eq!(chunks[0].page_numbers, vec![1]);
        assert!(chunks[0].token_count > 0);
    }

    #[test]
    fn indices_are_dense_and_token_bound_holds() {
        let chunker = chunker(60, 10);
        let chunks = chunker.chunk(&filler_text(40)).unwrap();
        assert!(chunks.len() > 2);
        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, position);
            assert!(
                chunk.token_count <= 60,
                "chunk {} has {} tokens",
                position,
                chunk.token_count
            );
        }
    }

    #[test]
    fn consecutive_chunks_share_the_overlap_tail() {
        let chunker = chunker(60, 10);
        let counter = TokenCounter::new().unwrap();
        let chunks = chunker.chunk(&filler_text(40)).unwrap();
        assert!(chunks.len() >= 2);
        for pair in chunks.windows(2) {
            let tail = counter.tail(&pair[0].text, 10).unwrap();
            assert!(
                pair[1].text.starts_with(tail.trim_start()),
                "chunk {} does not open with the previous tail",
                pair[1].chunk_index
            );
        }
    }

    #[test]
    fn zero_overlap_reconstructs_the_sentence_sequence() {
        let chunker = chunker(60, 0);
        let text = filler_text(40);
        let chunks = chunker.chunk(&text).unwrap();

        let rejoined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let expected = text.replace('.', "");
        assert_eq!(rejoined, expected.trim());
    }

    #[test]
    fn oversized_sentence_is_emitted_whole() {
        let chunker = chunker(20, 5);
        let giant = format!("word {}.", "filler ".repeat(60).trim_end());
        let text = format!("{giant} And a small trailing sentence.");
        let chunks = chunker.chunk(&text).unwrap();

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].token_count > 20, "oversized sentence not kept intact");
        assert!(chunks[1].text.contains("small trailing sentence"));
    }

    #[test]
    fn page_numbers_follow_markers_across_chunks() {
        let chunker = chunker(25, 5);
        let text = format!(
            "\n[Page 1]\n{}\n[Page 2]\n{}",
            "alpha beta gamma delta epsilon zeta. ".repeat(4),
            "eta theta iota kappa lambda mu. ".repeat(4),
        );
        let chunks = chunker.chunk(&text).unwrap();
        assert!(chunks.len() >= 2);
        assert_eq!(chunks.first().unwrap().page_numbers, vec![1]);
        assert!(chunks.last().unwrap().page_numbers.contains(&2));
        for chunk in &chunks {
            assert!(!chunk.page_numbers.is_empty());
            assert!(!chunk.text.contains("[Page"));
        }
    }
}
