//! Walks the full pipeline offline: ingest a plain-text document, inspect
//! the chunk layout, then ask questions against it.
//!
//! Uses the deterministic mock embedder and a trivial local generator, so
//! the demo runs without credentials or network access:
//!
//! ```bash
//! cargo run --example qa_session
//! ```
//!
//! To run against a real OpenAI-compatible endpoint instead, construct
//! `OpenAiEmbeddings` / `OpenAiGenerator` from `RagConfig::from_env()`.

use std::sync::Arc;

use async_trait::async_trait;

use ragmill::generation::format_sources;
use ragmill::{
    AnswerGenerator, DocumentUpload, EmbeddingIndex, GeneratedAnswer, GenerationRequest,
    MemoryRecordStore, MockEmbeddingClient, RagConfig, RetrievalPipeline,
};

/// Offline stand-in for the LLM: answers with the best-matching passage.
struct ExtractiveGenerator;

#[async_trait]
impl AnswerGenerator for ExtractiveGenerator {
    async fn answer(&self, request: &GenerationRequest) -> GeneratedAnswer {
        match request.passages.first() {
            Some(top) => GeneratedAnswer {
                answer: format!("The most relevant passage says: \"{}\"", top.text),
                confidence: if top.similarity > 0.1 { 0.8 } else { 0.2 },
                reasoning: format!(
                    "Selected the highest-similarity passage (chunk {}, similarity {:.3}).",
                    top.chunk_index, top.similarity
                ),
                sources: format_sources(&request.passages, 200),
            },
            None => GeneratedAnswer {
                answer: "No context was retrieved for this question.".to_string(),
                confidence: 0.0,
                reasoning: String::new(),
                sources: Vec::new(),
            },
        }
    }
}

const SAMPLE_DOCUMENT: &str = "\
The northern lighthouse was built in 1884 on the basalt cliffs. \
Its lamp burned whale oil for the first decade of service. \
Keepers lived in the stone cottage beside the tower with their families. \
Supply boats arrived twice a month when the weather allowed a landing. \
The light was converted to electricity in 1923 after the great storm. \
A fresnel lens from Paris replaced the original reflector array that year. \
The station was automated in 1971 and the last keeper departed in spring. \
Today the cottage hosts a small museum about coastal navigation history.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store_dir = tempfile::tempdir()?;
    let records = Arc::new(MemoryRecordStore::new());
    let index = Arc::new(
        EmbeddingIndex::open(
            store_dir.path().join("embeddings_data.json"),
            Arc::new(MockEmbeddingClient::new()),
        )
        .await?,
    );
    let pipeline = RetrievalPipeline::new(
        RagConfig {
            chunk_size: 60,
            chunk_overlap: 10,
            ..RagConfig::default()
        },
        records,
        index,
        Arc::new(ExtractiveGenerator),
    )?;

    let document = pipeline
        .ingest(DocumentUpload {
            title: Some("Lighthouse History".to_string()),
            file_name: "lighthouse.txt".to_string(),
            bytes: SAMPLE_DOCUMENT.as_bytes().to_vec(),
        })
        .await?;

    println!(
        "Ingested \"{}\" ({}, {} page(s), status: {})",
        document.title, document.format, document.page_count, document.status
    );
    for chunk in pipeline.chunks(document.id).await? {
        println!(
            "  chunk {} [{} tokens, pages {:?}]: {}...",
            chunk.chunk_index,
            chunk.token_count,
            chunk.page_numbers,
            chunk.text.chars().take(60).collect::<String>()
        );
    }

    for question in [
        "When was the lighthouse converted to electricity?",
        "What happened to the last keeper?",
    ] {
        let response = pipeline.query(document.id, question, 2).await?;
        println!("\nQ: {question}");
        println!("A: {} (confidence {:.2})", response.answer, response.confidence);
        for source in &response.sources {
            println!(
                "   source: chunk {} similarity {:.3}",
                source.chunk_index, source.similarity
            );
        }
    }

    let stats = pipeline.stats().await?;
    println!(
        "\nStore: {} vectors across {} document(s)",
        stats.index.total_records, stats.index.distinct_documents
    );

    Ok(())
}
