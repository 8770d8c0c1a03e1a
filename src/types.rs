//! Shared error taxonomy for the retrieval pipeline.

use uuid::Uuid;

use crate::records::DocumentStatus;

/// Errors surfaced by the pipeline and its components.
///
/// Every variant carries a stable machine-checkable kind (see
/// [`RagError::kind`]) plus human-readable detail. Ingest-time failures are
/// terminal for that attempt and are additionally recorded on the document;
/// the core never retries on its own.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// The declared document format has no extractor.
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// Whole-file extraction failed (I/O or parse).
    #[error("text extraction failed: {0}")]
    Extraction(String),

    /// Chunking produced nothing to index.
    #[error("no chunks generated")]
    EmptyChunkResult,

    /// The embedding capability failed for a batch or query.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The document is not in the `processed` state required for querying.
    #[error("document is not ready for querying (status: {0})")]
    NotReady(DocumentStatus),

    /// Retrieval returned zero passages for the question.
    #[error("no relevant content found")]
    NoRelevantContent,

    /// The document id is unknown to the record store.
    #[error("document not found: {0}")]
    DocumentNotFound(Uuid),

    /// The token model could not be initialised or used.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// The embedding store could not be loaded or flushed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The document/chunk record store rejected an operation.
    #[error("record store error: {0}")]
    Records(String),

    /// Underlying I/O failure outside the embedding store.
    #[error("io error: {0}")]
    Io(String),
}

impl RagError {
    /// Stable identifier for the error category, independent of the
    /// free-text detail. Suitable for API payloads and assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::UnsupportedFormat(_) => "unsupported_format",
            RagError::Extraction(_) => "extraction_failed",
            RagError::EmptyChunkResult => "empty_chunk_result",
            RagError::Embedding(_) => "embedding_failed",
            RagError::NotReady(_) => "not_ready",
            RagError::NoRelevantContent => "no_relevant_content",
            RagError::DocumentNotFound(_) => "document_not_found",
            RagError::Tokenizer(_) => "tokenizer_error",
            RagError::Storage(_) => "storage_error",
            RagError::Records(_) => "record_store_error",
            RagError::Io(_) => "io_error",
        }
    }
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(RagError::EmptyChunkResult.kind(), "empty_chunk_result");
        assert_eq!(
            RagError::Embedding("boom".into()).kind(),
            "embedding_failed"
        );
        assert_eq!(RagError::NoRelevantContent.kind(), "no_relevant_content");
    }

    #[test]
    fn io_errors_convert() {
        let err: RagError = std::io::Error::other("disk gone").into();
        assert_eq!(err.kind(), "io_error");
        assert!(err.to_string().contains("disk gone"));
    }
}
