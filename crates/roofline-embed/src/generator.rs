//! Batch embedding over an arbitrary number of texts.
//!
//! Chunks inputs to the provider's batch size and sleeps the configured
//! delay between batches. Blank texts are skipped (their slot stays `None`)
//! so downstream joins leave the embedding column null instead of embedding
//! empty strings.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::Result;
use crate::provider::EmbeddingProvider;

/// Outcome of embedding a full text list.
#[derive(Debug, Clone)]
pub struct BatchEmbeddings {
    /// One slot per input text; `None` where the text was blank.
    pub vectors: Vec<Option<Vec<f32>>>,
    pub token_count: u64,
    pub model_name: String,
    pub dimension: usize,
}

impl BatchEmbeddings {
    #[must_use]
    pub fn generated_count(&self) -> u64 {
        self.vectors.iter().filter(|v| v.is_some()).count() as u64
    }

    #[must_use]
    pub fn skipped_count(&self) -> u64 {
        self.vectors.iter().filter(|v| v.is_none()).count() as u64
    }
}

/// Chunks texts through a provider with rate limiting.
pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    rate_limit_delay: Duration,
}

impl EmbeddingGenerator {
    #[must_use]
    pub fn new(provider: Arc<dyn EmbeddingProvider>, rate_limit_delay: Duration) -> Self {
        Self {
            provider,
            rate_limit_delay,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed every non-blank text, preserving input order.
    pub async fn embed_all(&self, texts: &[String]) -> Result<BatchEmbeddings> {
        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut token_count = 0u64;

        // Indexes of texts worth sending.
        let candidates: Vec<usize> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, _)| i)
            .collect();

        let batch_size = self.provider.batch_size().max(1);
        for (batch_number, chunk) in candidates.chunks(batch_size).enumerate() {
            if batch_number > 0 && !self.rate_limit_delay.is_zero() {
                tokio::time::sleep(self.rate_limit_delay).await;
            }
            let batch_texts: Vec<String> = chunk.iter().map(|&i| texts[i].clone()).collect();
            let response = self.provider.generate_embeddings(&batch_texts).await?;
            token_count += response.token_count;
            for (&index, vector) in chunk.iter().zip(response.embeddings) {
                vectors[index] = Some(vector);
            }
            debug!(
                batch = batch_number,
                size = chunk.len(),
                "embedded batch"
            );
        }

        Ok(BatchEmbeddings {
            vectors,
            token_count,
            model_name: self.provider.model_name().to_string(),
            dimension: self.provider.dimension(),
        })
    }
}
