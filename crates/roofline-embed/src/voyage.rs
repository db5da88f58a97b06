//! Voyage AI hosted provider. Small batches, document input type.

use std::sync::OnceLock;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResponse};

const ENDPOINT: &str = "https://api.voyageai.com/v1/embeddings";

#[derive(Debug, Deserialize)]
struct VoyageData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct VoyageUsage {
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct VoyageResponse {
    data: Vec<VoyageData>,
    #[serde(default)]
    usage: Option<VoyageUsage>,
}

pub struct VoyageProvider {
    api_key: String,
    model_name: String,
    dimension: usize,
    client: OnceLock<reqwest::Client>,
}

impl VoyageProvider {
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
impl EmbeddingProvider for VoyageProvider {
    async fn generate_embeddings(&self, texts: &[String]) -> Result<EmbeddingResponse> {
        self.ensure_batch_fits(texts)?;

        let response = self
            .client()
            .post(ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "input": texts,
                "model": self.model_name,
                "input_type": "document",
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

        let parsed: VoyageResponse = response
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
        10
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
