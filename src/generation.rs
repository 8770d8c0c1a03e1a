//! The answer-generation capability.
//!
//! Generation is deliberately infallible at the trait boundary: any internal
//! failure is absorbed into a degraded-but-valid answer (confidence 0.0,
//! empty sources) rather than propagated. Callers detect degradation only
//! through that signature; this is a contract, not an accident.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::types::RagError;

/// A retrieved passage handed to the generator as context.
#[derive(Clone, Debug)]
pub struct RetrievedPassage {
    pub chunk_index: usize,
    pub text: String,
    pub page_numbers: Vec<u32>,
    pub similarity: f32,
    pub token_count: usize,
}

/// Everything the generator needs to answer one question.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub question: String,
    pub document_title: String,
    pub passages: Vec<RetrievedPassage>,
}

/// A formatted citation attached to an answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourcePreview {
    pub chunk_index: usize,
    pub page_numbers: Vec<u32>,
    pub text_preview: String,
    /// Rounded to three decimals.
    pub similarity: f32,
    pub token_count: usize,
}

/// The generator's output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub confidence: f32,
    pub reasoning: String,
    pub sources: Vec<SourcePreview>,
}

/// Synthesises an answer from a question and retrieved passages.
///
/// Implementations must not fail: degrade instead (see module docs).
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn answer(&self, request: &GenerationRequest) -> GeneratedAnswer;
}

/// Formats passages into bounded source previews.
pub fn format_sources(passages: &[RetrievedPassage], preview_chars: usize) -> Vec<SourcePreview> {
    passages
        .iter()
        .map(|passage| SourcePreview {
            chunk_index: passage.chunk_index,
            page_numbers: passage.page_numbers.clone(),
            text_preview: preview_of(&passage.text, preview_chars),
            similarity: round3(passage.similarity),
            token_count: passage.token_count,
        })
        .collect()
}

fn preview_of(text: &str, preview_chars: usize) -> String {
    if text.chars().count() > preview_chars {
        let mut preview: String = text.chars().take(preview_chars).collect();
        preview.push_str("...");
        preview
    } else {
        text.to_string()
    }
}

fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

fn degraded_answer(detail: &str) -> GeneratedAnswer {
    GeneratedAnswer {
        answer: format!(
            "I apologize, but I encountered an error while processing your question: {detail}"
        ),
        confidence: 0.0,
        reasoning: String::new(),
        sources: Vec::new(),
    }
}

/// OpenAI-compatible chat-completions generator using JSON response mode.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    preview_chars: usize,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ParsedAnswer {
    answer: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    reasoning: String,
}

const SYSTEM_PROMPT: &str = r#"You are a helpful AI assistant that answers questions based on provided document context.

Your task is to:
1. Answer the user's question using ONLY the information provided in the context
2. Be accurate and concise
3. If the context doesn't contain enough information, say so clearly
4. Provide a confidence score between 0.0 and 1.0 based on how well the context supports your answer
5. Always respond in JSON format with the following structure:
{
    "answer": "Your detailed answer here",
    "confidence": 0.85,
    "reasoning": "Brief explanation of why you have this confidence level"
}

Guidelines:
- If the context clearly answers the question: confidence 0.8-1.0
- If the context partially answers the question: confidence 0.4-0.7
- If the context barely relates to the question: confidence 0.1-0.3
- If the context doesn't help at all: confidence 0.0"#;

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig, preview_chars: usize) -> Result<Self, RagError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| RagError::Io("generation API key is not set".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| RagError::Io(err.to_string()))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            preview_chars,
        })
    }

    fn user_prompt(request: &GenerationRequest) -> String {
        let mut context = String::new();
        for (position, passage) in request.passages.iter().enumerate() {
            let page_info = if passage.page_numbers.is_empty() {
                String::new()
            } else {
                let pages: Vec<String> = passage
                    .page_numbers
                    .iter()
                    .map(|page| page.to_string())
                    .collect();
                format!(" (Page {})", pages.join(", "))
            };
            context.push_str(&format!(
                "[Context {}]{}:\n{}\n\n",
                position + 1,
                page_info,
                passage.text
            ));
        }

        format!(
            "Document: \"{}\"\n\nContext:\n{}\nQuestion: {}\n\nPlease answer the question based \
             on the provided context. Remember to respond in JSON format with answer, confidence, \
             and reasoning fields.",
            request.document_title, context, request.question
        )
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<ParsedAnswer, String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": Self::user_prompt(request)},
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "response_format": {"type": "json_object"},
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| err.to_string())?
            .error_for_status()
            .map_err(|err| err.to_string())?;

        let payload: ChatResponse = response.json().await.map_err(|err| err.to_string())?;
        let content = payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| "completion returned no choices".to_string())?;

        serde_json::from_str(&content).map_err(|err| format!("malformed answer payload: {err}"))
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiGenerator {
    async fn answer(&self, request: &GenerationRequest) -> GeneratedAnswer {
        match self.complete(request).await {
            Ok(parsed) => GeneratedAnswer {
                answer: parsed.answer,
                confidence: parsed.confidence.clamp(0.0, 1.0),
                reasoning: parsed.reasoning,
                sources: format_sources(&request.passages, self.preview_chars),
            },
            Err(detail) => {
                tracing::warn!(error = %detail, "generation failed; returning degraded answer");
                degraded_answer(&detail)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn sample_request() -> GenerationRequest {
        GenerationRequest {
            question: "What is the warranty period?".to_string(),
            document_title: "Product Manual".to_string(),
            passages: vec![RetrievedPassage {
                chunk_index: 2,
                text: "The warranty period is two years from purchase".to_string(),
                page_numbers: vec![4],
                similarity: 0.876_543,
                token_count: 9,
            }],
        }
    }

    fn generator_for(server: &MockServer) -> OpenAiGenerator {
        OpenAiGenerator::new(
            &GenerationConfig {
                api_base: server.base_url(),
                api_key: Some("test-key".to_string()),
                ..GenerationConfig::default()
            },
            200,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn successful_completion_carries_sources() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({
                    "choices": [{"message": {"content":
                        "{\"answer\": \"Two years.\", \"confidence\": 0.9, \"reasoning\": \"Stated directly.\"}"
                    }}]
                }));
            })
            .await;

        let generated = generator_for(&server).answer(&sample_request()).await;

        assert_eq!(generated.answer, "Two years.");
        assert!((generated.confidence - 0.9).abs() < 1e-6);
        assert_eq!(generated.sources.len(), 1);
        assert_eq!(generated.sources[0].chunk_index, 2);
        assert_eq!(generated.sources[0].similarity, 0.877);
    }

    #[tokio::test]
    async fn upstream_failure_degrades_instead_of_erroring() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(503).body("overloaded");
            })
            .await;

        let generated = generator_for(&server).answer(&sample_request()).await;

        // The degradation signature: zero confidence, no sources.
        assert_eq!(generated.confidence, 0.0);
        assert!(generated.sources.is_empty());
        assert!(generated.answer.contains("I apologize"));
    }

    #[tokio::test]
    async fn malformed_payload_also_degrades() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({
                    "choices": [{"message": {"content": "not json at all"}}]
                }));
            })
            .await;

        let generated = generator_for(&server).answer(&sample_request()).await;
        assert_eq!(generated.confidence, 0.0);
        assert!(generated.sources.is_empty());
    }

    #[test]
    fn previews_are_bounded_and_similarity_rounded() {
        let passages = vec![RetrievedPassage {
            chunk_index: 0,
            text: "x".repeat(300),
            page_numbers: vec![1, 2],
            similarity: 0.123_456,
            token_count: 80,
        }];
        let sources = format_sources(&passages, 200);
        assert_eq!(sources[0].text_preview.chars().count(), 203);
        assert!(sources[0].text_preview.ends_with("..."));
        assert_eq!(sources[0].similarity, 0.123);
    }

    #[test]
    fn user_prompt_lists_contexts_with_pages() {
        let prompt = OpenAiGenerator::user_prompt(&sample_request());
        assert!(prompt.contains("Document: \"Product Manual\""));
        assert!(prompt.contains("[Context 1] (Page 4):"));
        assert!(prompt.contains("What is the warranty period?"));
    }
}
