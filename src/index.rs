//! Durable embedding index with document-scoped cosine search.
//!
//! The store is a single serialized key→record mapping, loaded fully when
//! the index is opened and flushed fully on every mutation. Flushes write
//! to a sibling temp file and atomically rename over the live file, so a
//! crash mid-flush never corrupts previously durable records. This
//! whole-file discipline is fine at moderate scale; past that, see the
//! scale-up notes in DESIGN.md.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::chunking::ChunkDraft;
use crate::embeddings::EmbeddingClient;
use crate::types::RagError;

/// One stored chunk embedding with its retrieval metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorRecord {
    pub embedding: Vec<f32>,
    pub text: String,
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub page_numbers: Vec<u32>,
    pub token_count: usize,
}

/// A search hit: stored metadata plus the similarity to the query.
#[derive(Clone, Debug)]
pub struct ScoredChunk {
    pub key: String,
    pub chunk_index: usize,
    pub text: String,
    pub page_numbers: Vec<u32>,
    pub token_count: usize,
    pub similarity: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total_records: usize,
    pub distinct_documents: usize,
}

/// File-backed vector store keyed by `"<document_id>_<chunk_index>"`.
///
/// The deterministic key means re-adding a chunk index overwrites its
/// record instead of duplicating it. Mutating operations serialize behind
/// the write lock and flush before returning; reads see consistent
/// snapshots.
pub struct EmbeddingIndex {
    path: PathBuf,
    embedder: Arc<dyn EmbeddingClient>,
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl EmbeddingIndex {
    /// Opens the index at `path`, loading any existing store file.
    ///
    /// A missing file starts an empty index; an unreadable one is a
    /// [`RagError::Storage`] rather than silent data loss.
    pub async fn open(
        path: impl Into<PathBuf>,
        embedder: Arc<dyn EmbeddingClient>,
    ) -> Result<Self, RagError> {
        let path = path.into();
        let records = if tokio::fs::try_exists(&path).await? {
            let data = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str(&data).map_err(|err| {
                RagError::Storage(format!("corrupt store at {}: {err}", path.display()))
            })?
        } else {
            HashMap::new()
        };
        tracing::debug!(path = %path.display(), records = records.len(), "opened embedding index");
        Ok(Self {
            path,
            embedder,
            records: RwLock::new(records),
        })
    }

    /// The store key for a chunk.
    pub fn key_for(document_id: Uuid, chunk_index: usize) -> String {
        format!("{document_id}_{chunk_index}")
    }

    /// Embeds and stores a chunk batch, returning keys in input order.
    ///
    /// All-or-nothing: every chunk is embedded first, and nothing is
    /// committed unless the whole batch succeeded.
    pub async fn add(
        &self,
        document_id: Uuid,
        chunks: &[ChunkDraft],
    ) -> Result<Vec<String>, RagError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "embedded {} of {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let mut keys = Vec::with_capacity(chunks.len());
        let mut records = self.records.write().await;
        for (chunk, embedding) in chunks.iter().zip(vectors) {
            let key = Self::key_for(document_id, chunk.chunk_index);
            records.insert(
                key.clone(),
                VectorRecord {
                    embedding,
                    text: chunk.text.clone(),
                    document_id,
                    chunk_index: chunk.chunk_index,
                    page_numbers: chunk.page_numbers.clone(),
                    token_count: chunk.token_count,
                },
            );
            keys.push(key);
        }
        self.flush(&records).await?;
        tracing::info!(%document_id, chunks = keys.len(), "added chunks to embedding index");
        Ok(keys)
    }

    /// Ranks this document's stored chunks against `query`.
    ///
    /// Vectors from other documents are never compared. Results are sorted
    /// by descending similarity, ties broken by ascending chunk index, and
    /// truncated to `k`.
    pub async fn search(
        &self,
        query: &str,
        document_id: Uuid,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        let query_embedding = self.embedder.embed_one(query).await?;

        let records = self.records.read().await;
        let mut hits: Vec<ScoredChunk> = records
            .iter()
            .filter(|(_, record)| record.document_id == document_id)
            .map(|(key, record)| ScoredChunk {
                key: key.clone(),
                chunk_index: record.chunk_index,
                text: record.text.clone(),
                page_numbers: record.page_numbers.clone(),
                token_count: record.token_count,
                similarity: cosine_similarity(&query_embedding, &record.embedding),
            })
            .collect();
        drop(records);

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Removes every record for `document_id`, returning how many were
    /// removed. Unknown documents are a no-op returning 0.
    pub async fn delete(&self, document_id: Uuid) -> Result<usize, RagError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.document_id != document_id);
        let removed = before - records.len();
        if removed > 0 {
            self.flush(&records).await?;
        }
        tracing::info!(%document_id, removed, "deleted document from embedding index");
        Ok(removed)
    }

    pub async fn stats(&self) -> IndexStats {
        let records = self.records.read().await;
        let documents: HashSet<Uuid> = records.values().map(|record| record.document_id).collect();
        IndexStats {
            total_records: records.len(),
            distinct_documents: documents.len(),
        }
    }

    /// Clears the entire store. Destructive; intended for maintenance and
    /// tests only.
    pub async fn reset(&self) -> Result<(), RagError> {
        let mut records = self.records.write().await;
        records.clear();
        self.flush(&records).await?;
        tracing::warn!(path = %self.path.display(), "embedding index has been reset");
        Ok(())
    }

    async fn flush(&self, records: &HashMap<String, VectorRecord>) -> Result<(), RagError> {
        let serialized = serde_json::to_string(records)
            .map_err(|err| RagError::Storage(err.to_string()))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, serialized).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(records = records.len(), "flushed embedding store");
        Ok(())
    }
}

/// Cosine similarity; zero-magnitude vectors compare as 0.0 by definition.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
