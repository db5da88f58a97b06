//! Ollama local-HTTP provider. Processes one text per request.

use std::sync::OnceLock;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResponse};

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    embedding: Vec<f32>,
}

pub struct OllamaProvider {
    base_url: String,
    model_name: String,
    dimension: usize,
    client: OnceLock<reqwest::Client>,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: String, model_name: String, dimension: usize) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model_name,
            dimension,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> &reqwest::Client {
        self.client.get_or_init(reqwest::Client::new)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn generate_embeddings(&self, texts: &[String]) -> Result<EmbeddingResponse> {
        self.ensure_batch_fits(texts)?;

        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            let response = self
                .client()
                .post(format!("{}/api/embeddings", self.base_url))
                .json(&json!({
                    "model": self.model_name,
                    "prompt": text,
                }))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(EmbedError::Api {
                    status: status.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                });
            }

            let parsed: OllamaResponse = response
                .json()
                .await
                .map_err(|e| EmbedError::ResponseShape(e.to_string()))?;
            embeddings.push(parsed.embedding);
        }

        let result = EmbeddingResponse {
            embeddings,
            model_name: self.model_name.clone(),
            dimension: self.dimension,
            // Ollama does not report token usage.
            token_count: 0,
        };
        result.validate(texts.len())?;
        Ok(result)
    }

    fn batch_size(&self) -> usize {
        1
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
