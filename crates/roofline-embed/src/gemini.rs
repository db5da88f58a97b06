//! Gemini hosted provider via the batch embed-contents endpoint.
//!
//! Models that accept `outputDimensionality` are negotiated to the
//! pipeline's canonical dimension; `models/embedding-001` keeps its native
//! 768 and is rejected by the orchestrator's dimension check instead.

use std::sync::OnceLock;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResponse};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    embeddings: Vec<GeminiEmbedding>,
}

pub struct GeminiProvider {
    api_key: String,
    model_name: String,
    dimension: usize,
    client: OnceLock<reqwest::Client>,
}

impl GeminiProvider {
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

    fn supports_output_dimensionality(&self) -> bool {
        self.model_name != "models/embedding-001"
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    async fn generate_embeddings(&self, texts: &[String]) -> Result<EmbeddingResponse> {
        self.ensure_batch_fits(texts)?;

        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|text| {
                let mut request = json!({
                    "model": self.model_name,
                    "content": { "parts": [{ "text": text }] },
                });
                if self.supports_output_dimensionality() {
                    request["outputDimensionality"] = json!(self.dimension);
                }
                request
            })
            .collect();

        let url = format!(
            "{BASE_URL}/{}:batchEmbedContents?key={}",
            self.model_name, self.api_key
        );
        let response = self
            .client()
            .post(url)
            .json(&json!({ "requests": requests }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbedError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::ResponseShape(e.to_string()))?;

        let result = EmbeddingResponse {
            embeddings: parsed.embeddings.into_iter().map(|e| e.values).collect(),
            model_name: self.model_name.clone(),
            dimension: self.dimension,
            token_count: 0,
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
