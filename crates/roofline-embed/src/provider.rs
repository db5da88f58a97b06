//! Provider trait, response contract, and factory.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use roofline_core::config::{EmbeddingProviderKind, EmbeddingSettings};

use crate::error::{EmbedError, Result};
use crate::gemini::GeminiProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::voyage::VoyageProvider;

/// One batch of generated embeddings.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub model_name: String,
    pub dimension: usize,
    pub token_count: u64,
}

impl EmbeddingResponse {
    /// Enforce the output contract: one vector per input text, every vector
    /// at the declared dimension, every value finite.
    pub fn validate(&self, requested: usize) -> Result<()> {
        if self.embeddings.len() != requested {
            return Err(EmbedError::CountMismatch {
                requested,
                returned: self.embeddings.len(),
            });
        }
        for vector in &self.embeddings {
            if vector.len() != self.dimension {
                return Err(EmbedError::DimensionMismatch {
                    declared: self.dimension,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(EmbedError::ResponseShape(
                    "embedding contains non-finite values".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Uniform interface over text→vector services.
///
/// Implementations never retry internally and never mutate `dimension` or
/// `model_name` after construction.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed up to [`Self::batch_size`] texts in one call.
    async fn generate_embeddings(&self, texts: &[String]) -> Result<EmbeddingResponse>;

    /// Largest input list a single call accepts; callers chunk above this.
    fn batch_size(&self) -> usize;

    /// Declared output dimension, immutable for the provider's lifetime.
    fn dimension(&self) -> usize;

    /// Model identifier, immutable for the provider's lifetime.
    fn model_name(&self) -> &str;

    fn ensure_batch_fits(&self, texts: &[String]) -> Result<()> {
        if texts.len() > self.batch_size() {
            return Err(EmbedError::BatchTooLarge {
                given: texts.len(),
                limit: self.batch_size(),
            });
        }
        Ok(())
    }
}

/// Native output dimension for a provider/model pair, when it cannot be
/// negotiated. Pairs that accept a requested dimension are negotiated to
/// [`crate::CANONICAL_DIMENSION`] instead.
fn native_dimension(kind: EmbeddingProviderKind, model: &str) -> usize {
    match (kind, model) {
        (EmbeddingProviderKind::Voyage, "voyage-3") => 1024,
        (EmbeddingProviderKind::Ollama, "nomic-embed-text")
        | (EmbeddingProviderKind::Gemini, "models/embedding-001") => 768,
        // OpenAI and newer Gemini models accept a dimensions parameter, so
        // they are constructed at the canonical dimension.
        (EmbeddingProviderKind::OpenAi | EmbeddingProviderKind::Gemini, _) => {
            crate::CANONICAL_DIMENSION
        }
        _ => crate::CANONICAL_DIMENSION,
    }
}

/// Build the configured provider.
///
/// # Errors
///
/// Returns [`EmbedError::MissingApiKey`] when the provider requires a key
/// and `api_key` is `None`.
pub fn create_provider(
    settings: &EmbeddingSettings,
    api_key: Option<String>,
) -> Result<Arc<dyn EmbeddingProvider>> {
    let kind = settings.provider;
    let model = settings.model_name().to_string();

    if kind.requires_api_key() && api_key.is_none() {
        return Err(EmbedError::MissingApiKey(kind.as_str().to_string()));
    }

    let dimension = native_dimension(kind, &model);
    let provider: Arc<dyn EmbeddingProvider> = match kind {
        EmbeddingProviderKind::Voyage => Arc::new(VoyageProvider::new(
            api_key.unwrap_or_default(),
            model,
            dimension,
        )),
        EmbeddingProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
            api_key.unwrap_or_default(),
            model,
            dimension,
        )),
        EmbeddingProviderKind::Gemini => Arc::new(GeminiProvider::new(
            api_key.unwrap_or_default(),
            model,
            dimension,
        )),
        EmbeddingProviderKind::Ollama => Arc::new(OllamaProvider::new(
            settings.ollama_base_url.clone(),
            model,
            dimension,
        )),
    };
    Ok(provider)
}
