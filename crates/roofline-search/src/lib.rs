//! Hybrid retrieval core.
//!
//! A natural-language query flows through location extraction (LLM-backed
//! with a deterministic rule-based fallback), query rewrite, dense
//! embedding, a fused lexical+vector plan with the same filters pushed
//! into both sub-retrievers, retrying execution, and typed result shaping.
//! This crate reads the search cluster only; it shares no runtime state
//! with the refinement engine.

pub mod engine;
pub mod error;
pub mod executor;
pub mod location;
pub mod models;
pub mod query;

pub use engine::{HybridSearchEngine, build_client};
pub use error::{Result, SearchError};
pub use location::{LlmLocationExtractor, LocationExtractor, RuleBasedExtractor};
pub use models::{HybridSearchParams, HybridSearchResult, LocationIntent, PropertyHit};
pub use query::RrfQueryBuilder;
