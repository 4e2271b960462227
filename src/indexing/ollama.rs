//! Embeddings from an Ollama-compatible `/api/embeddings` endpoint.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::{AppError, Result};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// HTTP embedder.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaEmbedder {
    /// Embedder for the `[embedding]` settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Embedding` if the HTTP client cannot be built.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|err| AppError::Embedding(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            url: format!("{}/api/embeddings", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }

    async fn request(&self, text: &str) -> Result<Option<Vec<f32>>> {
        let response = self
            .client
            .post(&self.url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|err| AppError::Embedding(format!("request failed: {err}")))?
            .error_for_status()
            .map_err(|err| AppError::Embedding(format!("service error: {err}")))?
            .json::<EmbeddingResponse>()
            .await
            .map_err(|err| AppError::Embedding(format!("invalid response: {err}")))?;

        Ok((!response.embedding.is_empty()).then_some(response.embedding))
    }
}

impl Embedder for OllamaEmbedder {
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<f32>>>> + Send + 'a>> {
        Box::pin(self.request(text))
    }
}
