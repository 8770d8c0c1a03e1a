//! ```text
//! Upload bytes ──► extraction (txt/md, pdf, docx) ──► text + page markers
//!                                   │
//!                                   ▼
//!              chunking (normalize ► sentences ► token budget + overlap)
//!                                   │
//!                                   ├─► RecordStore (document + chunk rows)
//!                                   └─► EmbeddingIndex ◄── EmbeddingClient
//!                                            │
//! Question ──► EmbeddingIndex::search ───────┘
//!                      │
//!                      ▼
//!              AnswerGenerator ──► answer + confidence + sources
//! ```
//!
//! `ragmill` is a retrieval-augmented question-answering pipeline over
//! uploaded documents. The [`pipeline::RetrievalPipeline`] owns the flow;
//! the embedding and generation capabilities and the metadata store are
//! injected trait objects, so deployments pick their own backends and tests
//! substitute deterministic doubles.

pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod extraction;
pub mod generation;
pub mod index;
pub mod pipeline;
pub mod records;
pub mod types;

pub use chunking::{ChunkDraft, Chunker, TokenCounter};
pub use config::{EmbeddingConfig, GenerationConfig, RagConfig};
pub use embeddings::{EmbeddingClient, MockEmbeddingClient, OpenAiEmbeddings};
pub use extraction::{DocumentFormat, ExtractedText};
pub use generation::{
    AnswerGenerator, GeneratedAnswer, GenerationRequest, OpenAiGenerator, RetrievedPassage,
    SourcePreview,
};
pub use index::{EmbeddingIndex, IndexStats, ScoredChunk};
pub use pipeline::{DocumentUpload, PipelineStats, QueryResponse, RetrievalPipeline};
pub use records::{
    ChunkRecord, DocumentRecord, DocumentStatus, MemoryRecordStore, RecordStore,
};
pub use types::RagError;
