use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

/// "Given text, return a vector."
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifies the vector space; persisted indexes from another model are not reused.
    fn model_name(&self) -> &str;

    /// Vector length, when known without calling the model.
    fn dimensions(&self) -> Option<usize> {
        None
    }

    /// Vector length, embedding a short sample when the model has not reported it yet.
    async fn output_dimensions(&self) -> Result<usize, ModelError> {
        match self.dimensions() {
            Some(dimensions) => Ok(dimensions),
            None => Ok(self.embed("dimensions").await?.len()),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model_name(&self) -> &str {
        "char-trigram"
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions.max(1))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        Ok(self.embed_text(text))
    }
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embeddings from an Ollama server's `/api/embeddings` endpoint.
pub struct OllamaEmbedder {
    endpoint: String,
    model: String,
    observed_dimensions: OnceLock<usize>,
    client: Client,
}

impl OllamaEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self, ModelError> {
        let base_url = base_url.into();
        Ok(Self {
            endpoint: format!("{}/api/embeddings", base_url.trim_end_matches('/')),
            model: model.into(),
            observed_dimensions: OnceLock::new(),
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> Option<usize> {
        self.observed_dimensions.get().copied()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&OllamaEmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::BackendResponse {
                backend: "ollama".to_string(),
                details: format!("{status}: {body}"),
            });
        }

        let payload: OllamaEmbeddingResponse = response.json().await?;
        if payload.embedding.is_empty() {
            return Err(ModelError::EmptyOutput(format!(
                "embedding model {} returned an empty vector",
                self.model
            )));
        }

        let _ = self.observed_dimensions.set(payload.embedding.len());
        Ok(payload.embedding)
    }
}
