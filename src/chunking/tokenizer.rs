//! Token measurement on the `cl100k_base` vocabulary.

use tiktoken_rs::CoreBPE;

use crate::types::RagError;

/// Measures text in model tokens and decodes overlap tails.
///
/// Construct once and share via `Arc`; building the BPE tables is not cheap.
pub struct TokenCounter {
    bpe: CoreBPE,
}

impl TokenCounter {
    pub fn new() -> Result<Self, RagError> {
        let bpe =
            tiktoken_rs::cl100k_base().map_err(|err| RagError::Tokenizer(err.to_string()))?;
        Ok(Self { bpe })
    }

    /// Number of tokens in `text`.
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// The text of the last `n` tokens of `text`, decoded back to a string.
    ///
    /// Returns the whole text when it holds `n` tokens or fewer. Token-level
    /// truncation can begin mid-word; consumers rely on the exact decoded
    /// tail, so no word realignment is applied.
    pub fn tail(&self, text: &str, n: usize) -> Result<String, RagError> {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= n {
            return Ok(text.to_string());
        }
        self.bpe
            .decode(tokens[tokens.len() - n..].to_vec())
            .map_err(|err| RagError::Tokenizer(err.to_string()))
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter").finish_non_exhaustive()
    }
}
