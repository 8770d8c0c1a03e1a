//! Text normalization and sentence segmentation with page provenance.
//!
//! Extractors tag page breaks inline as `[Page N]`. The segmenter strips
//! those markers before any token counting or storage, but keeps page
//! attribution as structured spans over the normalized text so every
//! sentence knows which page(s) it came from.

use std::collections::BTreeSet;

use regex::Regex;

/// A normalized sentence plus the pages its text spans.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sentence {
    pub text: String,
    /// Sorted, deduplicated; `[1]` when the source carried no markers.
    pub pages: Vec<u32>,
}

/// Byte range of the normalized text attributed to one page.
#[derive(Clone, Copy, Debug)]
struct PageSpan {
    start: usize,
    end: usize,
    page: u32,
}

pub struct Segmenter {
    marker: Regex,
}

impl Segmenter {
    pub fn new() -> Self {
        Self {
            // Same marker shape the extractors emit.
            marker: Regex::new(r"\[Page (\d+)\]").expect("static regex"),
        }
    }

    /// Splits `text` into sentences on `.`, `!`, `?` terminator runs.
    ///
    /// Whitespace runs collapse to single spaces, markers are removed, and
    /// empty fragments are dropped. Terminators themselves are not part of
    /// the sentence text.
    pub fn segment(&self, text: &str) -> Vec<Sentence> {
        let (normalized, spans) = self.normalize(text);
        split_sentences(&normalized, &spans)
    }

    /// Collapses whitespace and strips markers, returning the cleaned text
    /// and the page spans covering it. Text before the first marker (or all
    /// text when there are no markers) belongs to page 1.
    fn normalize(&self, text: &str) -> (String, Vec<PageSpan>) {
        let mut normalized = String::with_capacity(text.len());
        let mut spans = Vec::new();
        let mut page = 1u32;
        let mut cursor = 0usize;

        for captures in self.marker.captures_iter(text) {
            let matched = captures.get(0).expect("whole match");
            push_piece(&text[cursor..matched.start()], page, &mut normalized, &mut spans);
            page = captures[1].parse().unwrap_or(page);
            cursor = matched.end();
        }
        push_piece(&text[cursor..], page, &mut normalized, &mut spans);

        (normalized, spans)
    }
}

/// Appends one whitespace-collapsed piece of page text, recording its span.
fn push_piece(piece: &str, page: u32, out: &mut String, spans: &mut Vec<PageSpan>) {
    let mut words = piece.split_whitespace().peekable();
    if words.peek().is_none() {
        return;
    }
    if !out.is_empty() {
        out.push(' ');
    }
    let start = out.len();
    let mut first = true;
    for word in words {
        if !first {
            out.push(' ');
        }
        out.push_str(word);
        first = false;
    }
    spans.push(PageSpan {
        start,
        end: out.len(),
        page,
    });
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

fn split_sentences(normalized: &str, spans: &[PageSpan]) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut start = 0usize;

    let flush = |start: usize, end: usize, sentences: &mut Vec<Sentence>| {
        let raw = &normalized[start..end];
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        let lead = raw.len() - raw.trim_start().len();
        let sent_start = start + lead;
        let sent_end = sent_start + trimmed.len();
        sentences.push(Sentence {
            text: trimmed.to_string(),
            pages: pages_for_range(spans, sent_start, sent_end),
        });
    };

    for (idx, ch) in normalized.char_indices() {
        if matches!(ch, '.' | '!' | '?') {
            flush(start, idx, &mut sentences);
            start = idx + ch.len_utf8();
        }
    }
    flush(start, normalized.len(), &mut sentences);

    sentences
}

fn pages_for_range(spans: &[PageSpan], start: usize, end: usize) -> Vec<u32> {
    let pages: BTreeSet<u32> = spans
        .iter()
        .filter(|span| span.start < end && span.end > start)
        .map(|span| span.page)
        .collect();
    if pages.is_empty() {
        vec![1]
    } else {
        pages.into_iter().collect()
    }
}
