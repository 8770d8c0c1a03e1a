//! The embedding capability: batch and single-text vectorisation.
//!
//! The pipeline only ever talks to the [`EmbeddingClient`] trait; the crate
//! ships an OpenAI-compatible HTTP implementation and a deterministic mock
//! for tests and offline runs.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::types::RagError;

/// Turns text into fixed-length vectors.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embeds a batch, returning one vector per input in the same order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Embeds a single text (typically a query).
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("empty embedding response".to_string()))
    }
}

/// OpenAI-compatible `/embeddings` client.
///
/// Batches larger than `batch_limit` are split into sequential requests; a
/// failure in any sub-request fails the whole call, and callers commit
/// nothing on failure.
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    batch_limit: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, RagError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| RagError::Embedding("embedding API key is not set".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| RagError::Embedding(err.to_string()))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            batch_limit: config.batch_limit.max(1),
        })
    }

    async fn request_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: batch,
            })
            .send()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?
            .error_for_status()
            .map_err(|err| RagError::Embedding(err.to_string()))?;

        let mut payload: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?;

        if payload.data.len() != batch.len() {
            return Err(RagError::Embedding(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                payload.data.len()
            )));
        }
        payload.data.sort_by_key(|datum| datum.index);
        Ok(payload.data.into_iter().map(|datum| datum.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_limit) {
            vectors.extend(self.request_batch(batch).await?);
        }
        Ok(vectors)
    }
}

/// Deterministic offline embedder: a hashed bag-of-words over a fixed
/// number of dimensions, L2-normalised.
///
/// Texts sharing vocabulary land near each other, which is enough for
/// exercising ranking behaviour without a model.
pub struct MockEmbeddingClient {
    dimensions: usize,
}

impl MockEmbeddingClient {
    pub fn new() -> Self {
        Self { dimensions: 256 }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text.split_whitespace() {
            let mut hash: u64 = 5381;
            for byte in word.to_lowercase().bytes() {
                hash = hash.wrapping_mul(33).wrapping_add(u64::from(byte));
            }
            vector[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for MockEmbeddingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn client_for(server: &MockServer, batch_limit: usize) -> OpenAiEmbeddings {
        OpenAiEmbeddings::new(&EmbeddingConfig {
            api_base: server.base_url(),
            api_key: Some("test-key".to_string()),
            batch_limit,
            ..EmbeddingConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn embeds_a_batch_in_input_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .header("authorization", "Bearer test-key")
                    .json_body_partial(r#"{"model": "text-embedding-ada-002"}"#);
                then.status(200).json_body(json!({
                    "data": [
                        {"index": 1, "embedding": [0.0, 1.0]},
                        {"index": 0, "embedding": [1.0, 0.0]}
                    ]
                }));
            })
            .await;

        let client = client_for(&server, 128);
        let vectors = client
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        // Out-of-order response items are re-sorted by index.
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn splits_batches_at_the_limit() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({
                    "data": [{"index": 0, "embedding": [0.5]}]
                }));
            })
            .await;

        let client = client_for(&server, 1);
        let texts: Vec<String> = (0..3).map(|i| format!("text {i}")).collect();
        let vectors = client.embed_batch(&texts).await.unwrap();

        assert_eq!(vectors.len(), 3);
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn upstream_errors_map_to_embedding_failed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(500).body("upstream down");
            })
            .await;

        let client = client_for(&server, 128);
        let err = client.embed_one("query").await.unwrap_err();
        assert_eq!(err.kind(), "embedding_failed");
    }

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let mock = MockEmbeddingClient::new();
        let inputs = vec![
            "hello world".to_string(),
            "goodbye world".to_string(),
            "hello world".to_string(),
        ];

        let first = mock.embed_batch(&inputs).await.unwrap();
        let second = mock.embed_batch(&inputs).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0], first[2]);
        assert_ne!(first[0], first[1]);
    }

    #[tokio::test]
    async fn mock_vectors_are_unit_length() {
        let mock = MockEmbeddingClient::new();
        let vector = mock.embed_one("a handful of ordinary words").await.unwrap();
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
