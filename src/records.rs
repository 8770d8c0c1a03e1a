//! Document and chunk metadata records.
//!
//! The pipeline treats metadata persistence as an external collaborator
//! behind the [`RecordStore`] trait; [`MemoryRecordStore`] is the reference
//! implementation. Implementations must make
//! [`RecordStore::complete_document`] atomic: either all chunk rows and the
//! status flip land, or none do.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::extraction::DocumentFormat;
use crate::types::RagError;

/// Lifecycle of an ingested document.
///
/// Transitions only ever run uploading → processing → {processed | error}.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploading,
    Processing,
    Processed,
    Error,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DocumentStatus::Uploading => "uploading",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub title: String,
    pub file_name: String,
    pub format: DocumentFormat,
    pub file_size: u64,
    pub page_count: u32,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// A fresh record in the `uploading` state. The title falls back to the
    /// file stem when none is given.
    pub fn new(
        title: Option<String>,
        file_name: impl Into<String>,
        format: DocumentFormat,
        file_size: u64,
    ) -> Self {
        let file_name = file_name.into();
        let title = title.unwrap_or_else(|| {
            file_name
                .rsplit_once('.')
                .map(|(stem, _)| stem.to_string())
                .unwrap_or_else(|| file_name.clone())
        });
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            file_name,
            format,
            file_size,
            page_count: 0,
            status: DocumentStatus::Uploading,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One immutable chunk row, written in a batch during ingest and destroyed
/// only with its parent document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub text: String,
    pub page_numbers: Vec<u32>,
    /// Opaque key of the matching entry in the embedding index.
    pub embedding_key: String,
    pub token_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RecordCounts {
    pub total_documents: usize,
    pub processed_documents: usize,
    pub total_chunks: usize,
}

/// CRUD surface over document and chunk metadata.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_document(&self, document: DocumentRecord) -> Result<(), RagError>;

    async fn document(&self, id: Uuid) -> Result<Option<DocumentRecord>, RagError>;

    /// All documents, newest first.
    async fn documents(&self) -> Result<Vec<DocumentRecord>, RagError>;

    async fn set_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error_message: Option<String>,
    ) -> Result<(), RagError>;

    async fn set_page_count(&self, id: Uuid, page_count: u32) -> Result<(), RagError>;

    /// Atomically inserts the chunk batch and flips the document to
    /// `processed`, clearing any prior error detail.
    async fn complete_document(&self, id: Uuid, chunks: Vec<ChunkRecord>) -> Result<(), RagError>;

    /// Chunk rows for a document, ordered by chunk index.
    async fn chunks(&self, document_id: Uuid) -> Result<Vec<ChunkRecord>, RagError>;

    /// Removes the document and, by cascade, its chunk rows. Returns whether
    /// the document existed.
    async fn delete_document(&self, id: Uuid) -> Result<bool, RagError>;

    async fn counts(&self) -> Result<RecordCounts, RagError>;
}

#[derive(Default)]
struct MemoryInner {
    documents: HashMap<Uuid, DocumentRecord>,
    chunks: HashMap<Uuid, Vec<ChunkRecord>>,
}

/// In-memory record store.
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_document<T>(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut DocumentRecord) -> T,
    ) -> Result<T, RagError> {
        let mut inner = self.inner.write();
        let document = inner
            .documents
            .get_mut(&id)
            .ok_or(RagError::DocumentNotFound(id))?;
        let value = apply(document);
        document.updated_at = Utc::now();
        Ok(value)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_document(&self, document: DocumentRecord) -> Result<(), RagError> {
        let mut inner = self.inner.write();
        if inner.documents.contains_key(&document.id) {
            return Err(RagError::Records(format!(
                "document {} already exists",
                document.id
            )));
        }
        inner.documents.insert(document.id, document);
        Ok(())
    }

    async fn document(&self, id: Uuid) -> Result<Option<DocumentRecord>, RagError> {
        Ok(self.inner.read().documents.get(&id).cloned())
    }

    async fn documents(&self) -> Result<Vec<DocumentRecord>, RagError> {
        let mut documents: Vec<DocumentRecord> =
            self.inner.read().documents.values().cloned().collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error_message: Option<String>,
    ) -> Result<(), RagError> {
        self.with_document(id, |document| {
            document.status = status;
            document.error_message = error_message;
        })
    }

    async fn set_page_count(&self, id: Uuid, page_count: u32) -> Result<(), RagError> {
        self.with_document(id, |document| {
            document.page_count = page_count;
        })
    }

    async fn complete_document(&self, id: Uuid, chunks: Vec<ChunkRecord>) -> Result<(), RagError> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let document = inner
            .documents
            .get_mut(&id)
            .ok_or(RagError::DocumentNotFound(id))?;
        document.status = DocumentStatus::Processed;
        document.error_message = None;
        document.updated_at = Utc::now();
        inner.chunks.insert(id, chunks);
        Ok(())
    }

    async fn chunks(&self, document_id: Uuid) -> Result<Vec<ChunkRecord>, RagError> {
        let mut chunks = self
            .inner
            .read()
            .chunks
            .get(&document_id)
            .cloned()
            .unwrap_or_default();
        chunks.sort_by_key(|chunk| chunk.chunk_index);
        Ok(chunks)
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool, RagError> {
        let mut inner = self.inner.write();
        let existed = inner.documents.remove(&id).is_some();
        inner.chunks.remove(&id);
        Ok(existed)
    }

    async fn counts(&self) -> Result<RecordCounts, RagError> {
        let inner = self.inner.read();
        Ok(RecordCounts {
            total_documents: inner.documents.len(),
            processed_documents: inner
                .documents
                .values()
                .filter(|document| document.status == DocumentStatus::Processed)
                .count(),
            total_chunks: inner.chunks.values().map(Vec::len).sum(),
        })
    }
}
