//! Pipeline orchestration: ingest and query flows.
//!
//! ```text
//! ingest:  bytes ──► extraction ──► chunking ──► EmbeddingIndex::add
//!                                         │               │
//!                                         └── chunk rows ─┴─► RecordStore
//!                                             (atomic with status flip)
//!
//! query:   question ──► EmbeddingIndex::search ──► AnswerGenerator
//!                                 │                      │
//!                                 └──── ranked passages ─┴─► QueryResponse
//! ```
//!
//! Ingest is all-or-nothing at document granularity: a document ends up
//! either fully processed (chunk rows and index entries in lockstep) or in
//! the `error` state with neither.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use crate::chunking::{Chunker, TokenCounter};
use crate::config::RagConfig;
use crate::extraction::{self, DocumentFormat};
use crate::generation::{AnswerGenerator, GenerationRequest, RetrievedPassage, SourcePreview};
use crate::index::{EmbeddingIndex, IndexStats};
use crate::records::{ChunkRecord, DocumentRecord, DocumentStatus, RecordStore};
use crate::types::RagError;

/// A document handed to [`RetrievalPipeline::ingest`].
#[derive(Clone, Debug)]
pub struct DocumentUpload {
    /// Defaults to the file stem when `None`.
    pub title: Option<String>,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// The answer to one query, with provenance.
#[derive(Clone, Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub confidence: f32,
    pub reasoning: String,
    pub sources: Vec<SourcePreview>,
    pub document_title: String,
    pub chunks_used: usize,
    /// Wall-clock seconds, rounded to two decimals.
    pub processing_time: f64,
}

/// Combined index and record-store statistics.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct PipelineStats {
    pub index: IndexStats,
    pub total_documents: usize,
    pub processed_documents: usize,
    pub total_chunks: usize,
}

/// Coordinates extraction, chunking, indexing, retrieval, and generation.
///
/// All collaborators are injected (no globals), so tests can substitute the
/// capabilities freely.
pub struct RetrievalPipeline {
    records: Arc<dyn RecordStore>,
    index: Arc<EmbeddingIndex>,
    generator: Arc<dyn AnswerGenerator>,
    chunker: Chunker,
}

impl RetrievalPipeline {
    pub fn new(
        config: RagConfig,
        records: Arc<dyn RecordStore>,
        index: Arc<EmbeddingIndex>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Result<Self, RagError> {
        let counter = Arc::new(TokenCounter::new()?);
        let chunker = Chunker::from_config(counter, &config);
        Ok(Self {
            records,
            index,
            generator,
            chunker,
        })
    }

    /// Ingests one document synchronously end-to-end.
    ///
    /// On failure the document record is left in the `error` state with the
    /// failure detail, and the error is also returned to the caller. The
    /// core never retries; that is caller policy.
    pub async fn ingest(&self, upload: DocumentUpload) -> Result<DocumentRecord, RagError> {
        let format = DocumentFormat::from_file_name(&upload.file_name)?;
        let document = DocumentRecord::new(
            upload.title.clone(),
            upload.file_name.clone(),
            format,
            upload.bytes.len() as u64,
        );
        let document_id = document.id;

        self.records.insert_document(document).await?;
        self.records
            .set_status(document_id, DocumentStatus::Processing, None)
            .await?;

        match self.process(document_id, format, &upload.bytes).await {
            Ok(()) => {
                let processed = self
                    .records
                    .document(document_id)
                    .await?
                    .ok_or(RagError::DocumentNotFound(document_id))?;
                Ok(processed)
            }
            Err(err) => {
                tracing::error!(%document_id, error = %err, "document processing failed");
                if let Err(store_err) = self
                    .records
                    .set_status(document_id, DocumentStatus::Error, Some(err.to_string()))
                    .await
                {
                    tracing::error!(%document_id, error = %store_err, "failed to record error status");
                }
                Err(err)
            }
        }
    }

    async fn process(
        &self,
        document_id: Uuid,
        format: DocumentFormat,
        bytes: &[u8],
    ) -> Result<(), RagError> {
        let extracted = extraction::extract(bytes, format)?;
        self.records
            .set_page_count(document_id, extracted.page_count)
            .await?;

        let chunks = self.chunker.chunk(&extracted.text)?;
        if chunks.is_empty() {
            return Err(RagError::EmptyChunkResult);
        }
        tracing::info!(%document_id, chunks = chunks.len(), pages = extracted.page_count, "chunked document");

        let keys = self.index.add(document_id, &chunks).await?;

        let now = chrono::Utc::now();
        let chunk_records: Vec<ChunkRecord> = chunks
            .iter()
            .zip(&keys)
            .map(|(chunk, key)| ChunkRecord {
                document_id,
                chunk_index: chunk.chunk_index,
                text: chunk.text.clone(),
                page_numbers: chunk.page_numbers.clone(),
                embedding_key: key.clone(),
                token_count: chunk.token_count,
                created_at: now,
            })
            .collect();

        self.records
            .complete_document(document_id, chunk_records)
            .await?;
        tracing::info!(%document_id, "document processed");
        Ok(())
    }

    /// Answers `question` against one processed document.
    pub async fn query(
        &self,
        document_id: Uuid,
        question: &str,
        top_k: usize,
    ) -> Result<QueryResponse, RagError> {
        let start = Instant::now();

        let document = self
            .records
            .document(document_id)
            .await?
            .ok_or(RagError::DocumentNotFound(document_id))?;
        if document.status != DocumentStatus::Processed {
            return Err(RagError::NotReady(document.status));
        }

        let hits = self.index.search(question, document_id, top_k).await?;
        if hits.is_empty() {
            return Err(RagError::NoRelevantContent);
        }

        let passages: Vec<RetrievedPassage> = hits
            .into_iter()
            .map(|hit| RetrievedPassage {
                chunk_index: hit.chunk_index,
                text: hit.text,
                page_numbers: hit.page_numbers,
                similarity: hit.similarity,
                token_count: hit.token_count,
            })
            .collect();
        let chunks_used = passages.len();

        let request = GenerationRequest {
            question: question.to_string(),
            document_title: document.title.clone(),
            passages,
        };
        let generated = self.generator.answer(&request).await;

        let processing_time = (start.elapsed().as_secs_f64() * 100.0).round() / 100.0;
        tracing::info!(%document_id, chunks_used, processing_time, "query answered");

        Ok(QueryResponse {
            answer: generated.answer,
            confidence: generated.confidence,
            reasoning: generated.reasoning,
            sources: generated.sources,
            document_title: document.title,
            chunks_used,
            processing_time,
        })
    }

    /// Deletes a document everywhere: index vectors first, then the record
    /// rows (which cascade to chunks). Returns how many vectors were
    /// removed.
    pub async fn delete_document(&self, document_id: Uuid) -> Result<usize, RagError> {
        let removed = self.index.delete(document_id).await?;
        if !self.records.delete_document(document_id).await? {
            return Err(RagError::DocumentNotFound(document_id));
        }
        Ok(removed)
    }

    pub async fn document(&self, document_id: Uuid) -> Result<DocumentRecord, RagError> {
        self.records
            .document(document_id)
            .await?
            .ok_or(RagError::DocumentNotFound(document_id))
    }

    pub async fn documents(&self) -> Result<Vec<DocumentRecord>, RagError> {
        self.records.documents().await
    }

    /// Chunk rows for a processed document.
    pub async fn chunks(&self, document_id: Uuid) -> Result<Vec<ChunkRecord>, RagError> {
        self.records.chunks(document_id).await
    }

    pub async fn stats(&self) -> Result<PipelineStats, RagError> {
        let counts = self.records.counts().await?;
        Ok(PipelineStats {
            index: self.index.stats().await,
            total_documents: counts.total_documents,
            processed_documents: counts.processed_documents,
            total_chunks: counts.total_chunks,
        })
    }
}
