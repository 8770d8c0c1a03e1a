//! Process-wide tunables for chunking, the embedding store, and the
//! OpenAI-compatible capability endpoints.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration for a [`RetrievalPipeline`](crate::pipeline::RetrievalPipeline).
///
/// All fields have working defaults; deployments typically override only the
/// API credentials via [`RagConfig::from_env`].
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in tokens.
    pub chunk_size: usize,
    /// Tokens carried over from the end of one chunk into the next.
    pub chunk_overlap: usize,
    /// Character cap for source previews attached to answers.
    pub preview_chars: usize,
    /// Path of the serialized embedding store.
    pub store_path: PathBuf,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            preview_chars: 200,
            store_path: PathBuf::from("embeddings_data.json"),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

/// Settings for the embedding capability endpoint.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible API (no trailing slash).
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Maximum texts per upstream request; larger batches are split.
    pub batch_limit: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "text-embedding-ada-002".to_string(),
            batch_limit: 128,
            timeout_secs: 30,
        }
    }
}

/// Settings for the answer-generation capability endpoint.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            max_tokens: 1000,
            temperature: 0.2,
            timeout_secs: 60,
        }
    }
}

impl RagConfig {
    /// Builds a configuration from the process environment.
    ///
    /// Loads `.env` if present (ignored when missing), then applies:
    /// `OPENAI_API_KEY` (both capabilities), `RAGMILL_API_BASE`,
    /// `RAGMILL_STORE_PATH`, `RAGMILL_CHUNK_SIZE`, `RAGMILL_CHUNK_OVERLAP`.
    /// A missing API key is not an error here; the OpenAI-backed clients
    /// reject construction without one.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.embedding.api_key = Some(key.clone());
            config.generation.api_key = Some(key);
        }
        if let Ok(base) = std::env::var("RAGMILL_API_BASE") {
            config.embedding.api_base = base.clone();
            config.generation.api_base = base;
        }
        if let Ok(path) = std::env::var("RAGMILL_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Ok(size) = std::env::var("RAGMILL_CHUNK_SIZE")
            && let Ok(size) = size.parse()
        {
            config.chunk_size = size;
        }
        if let Ok(overlap) = std::env::var("RAGMILL_CHUNK_OVERLAP")
            && let Ok(overlap) = overlap.parse()
        {
            config.chunk_overlap = overlap;
        }
        config
    }
}
