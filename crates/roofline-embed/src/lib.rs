//! Text-to-vector providers behind one trait.
//!
//! Variants cover a hosted API with small batches (Voyage), hosted APIs
//! with larger batches (OpenAI, Gemini), and a local HTTP server processing
//! one text at a time (Ollama). The [`provider::create_provider`] factory
//! chooses the variant from the configuration tag. Providers surface
//! retryable errors on network failure and never retry internally; callers
//! own the policy.

pub mod error;
pub mod gemini;
pub mod generator;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod voyage;

pub use error::{EmbedError, Result};
pub use generator::{BatchEmbeddings, EmbeddingGenerator};
pub use provider::{EmbeddingProvider, EmbeddingResponse, create_provider};

/// Canonical embedding dimension across the pipeline.
///
/// The graph sink creates its vector indexes at this dimension; providers
/// declaring anything else are rejected at orchestrator startup rather than
/// silently truncated.
pub const CANONICAL_DIMENSION: usize = 1024;
