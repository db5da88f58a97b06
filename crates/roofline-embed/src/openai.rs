//! OpenAI hosted provider. Larger batches; the output dimension is
//! negotiated down to the pipeline's canonical size via the `dimensions`
//! request parameter.

use std::sync::OnceLock;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResponse};

const ENDPOINT: &str = "https://api.openai.com/v1/embeddings";

#[derive(Debug, Deserialize)]
struct OpenAiData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiData>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

pub struct OpenAiProvider {
    api_key: String,
    model_name: String,
    dimension: usize,
    client: OnceLock<reqwest::Client>,
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(api_key: String, model_name: String, dimension: usize) -> Self {
        Self {
            api_key,
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
impl EmbeddingProvider for OpenAiProvider {
    async fn generate_embeddings(&self, texts: &[String]) -> Result<EmbeddingResponse> {
        self.ensure_batch_fits(texts)?;

        let response = self
            .client()
            .post(ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "input": texts,
                "model": self.model_name,
                "dimensions": self.dimension,
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

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::ResponseShape(e.to_string()))?;

        let result = EmbeddingResponse {
            embeddings: parsed.data.into_iter().map(|d| d.embedding).collect(),
            model_name: self.model_name.clone(),
            dimension: self.dimension,
            token_count: parsed.usage.map_or(0, |u| u.total_tokens),
        };
        result.validate(texts.len())?;
        Ok(result)
    }

    fn batch_size(&self) -> usize {
        100
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
