use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_GENERATION_MODEL: &str = "gemma:2b";
pub const DEFAULT_NUM_CTX: u32 = 1024;

/// "Given a prompt, return text."
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_ctx: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Completions from an Ollama server's `/api/generate` endpoint, non-streaming.
pub struct OllamaGenerator {
    endpoint: String,
    model: String,
    num_ctx: u32,
    client: Client,
}

impl OllamaGenerator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        num_ctx: u32,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let base_url = base_url.into();
        Ok(Self {
            endpoint: format!("{}/api/generate", base_url.trim_end_matches('/')),
            model: model.into(),
            num_ctx,
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: GenerateOptions {
                    num_ctx: self.num_ctx,
                },
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

        let payload: GenerateResponse = response.json().await?;
        if let Some(error) = payload.error {
            return Err(ModelError::BackendResponse {
                backend: "ollama".to_string(),
                details: error,
            });
        }

        payload
            .response
            .ok_or_else(|| ModelError::EmptyOutput(format!("model {} sent no response", self.model)))
    }
}
