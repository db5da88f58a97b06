//! The hybrid search engine: extraction → rewrite → embed → fused plan →
//! execute → shape.

use std::sync::Arc;
use std::time::Instant;

use elasticsearch::Elasticsearch;
use elasticsearch::auth::Credentials;
use elasticsearch::http::Url;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use serde_json::Value;
use tracing::{info, warn};

use roofline_core::config::ElasticsearchSettings;
use roofline_embed::EmbeddingProvider;

use crate::error::{Result, SearchError};
use crate::executor::SearchExecutor;
use crate::location::{LocationExtractor, extract_with_fallback};
use crate::models::{HybridSearchParams, HybridSearchResult, PropertyHit};
use crate::query::RrfQueryBuilder;

/// Queries slower than this log a warning.
const SLOW_QUERY_MS: u64 = 1000;

/// Build a search client from settings; basic auth comes from
/// `ES_USERNAME`/`ES_PASSWORD` when both are set.
pub fn build_client(settings: &ElasticsearchSettings) -> Result<Elasticsearch> {
    let url = Url::parse(&settings.url())
        .map_err(|e| SearchError::Config(format!("bad search url: {e}")))?;
    let mut builder = TransportBuilder::new(SingleNodeConnectionPool::new(url))
        .timeout(std::time::Duration::from_secs(settings.timeout));
    if let Some((user, password)) = ElasticsearchSettings::credentials() {
        builder = builder.auth(Credentials::Basic(user, password));
    }
    let transport = builder
        .build()
        .map_err(|e| SearchError::Config(format!("transport build failed: {e}")))?;
    Ok(Elasticsearch::new(transport))
}

/// Answers natural-language property queries over the search cluster.
pub struct HybridSearchEngine {
    executor: SearchExecutor,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Box<dyn LocationExtractor>,
}

impl HybridSearchEngine {
    #[must_use]
    pub fn new(
        client: Elasticsearch,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Box<dyn LocationExtractor>,
    ) -> Self {
        Self {
            executor: SearchExecutor::new(client, "properties"),
            embedder,
            extractor,
        }
    }

    /// Run one hybrid query end to end.
    pub async fn search(&self, mut params: HybridSearchParams) -> Result<HybridSearchResult> {
        let started = Instant::now();

        // 1. Location extraction (with deterministic fallback), unless the
        //    caller supplied an intent.
        if params.location_intent.is_none() {
            params.location_intent =
                Some(extract_with_fallback(self.extractor.as_ref(), &params.query_text).await);
        }
        let intent = params
            .location_intent
            .clone()
            .unwrap_or_else(|| crate::models::LocationIntent::none(&params.query_text));

        // 2. Query rewrite: the cleaned query carries the search text when
        //    a location was found.
        let search_text = if intent.has_location {
            intent.cleaned_query.clone()
        } else {
            params.query_text.clone()
        };

        // 3. Dense embedding of the search text.
        let embed_started = Instant::now();
        let embedding = self
            .embedder
            .generate_embeddings(std::slice::from_ref(&search_text))
            .await?;
        let embedding_time_ms =
            u64::try_from(embed_started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let query_vector = embedding
            .embeddings
            .first()
            .cloned()
            .unwrap_or_default();

        // 4–5. Fused plan with filters pushed into both sub-retrievers.
        let body = RrfQueryBuilder::build_query(&params, &query_vector, &search_text);

        // 6. Execute with backoff on transient failures.
        let (response, metrics) = self.executor.execute(&body).await?;

        // 7. Shape the hits.
        let results = shape_hits(&response);
        let total_hits = response["hits"]["total"]["value"].as_u64().unwrap_or(0);
        let engine_took_ms = response["took"].as_u64().unwrap_or(0);
        let execution_time_ms =
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if execution_time_ms > SLOW_QUERY_MS {
            warn!(
                query = params.query_text.as_str(),
                execution_time_ms, "slow hybrid query"
            );
        }
        info!(
            query = params.query_text.as_str(),
            total_hits,
            execution_time_ms,
            engine_took_ms,
            embedding_time_ms,
            retries = metrics.retry_count,
            results = results.len(),
            "hybrid search complete"
        );

        Ok(HybridSearchResult {
            query: params.query_text,
            total_hits,
            execution_time_ms,
            engine_took_ms,
            embedding_time_ms,
            results,
            location_intent: Some(intent),
        })
    }
}

/// Convert raw hits into typed results, dropping malformed ones.
fn shape_hits(response: &Value) -> Vec<PropertyHit> {
    response["hits"]["hits"]
        .as_array()
        .map(|hits| hits.iter().filter_map(PropertyHit::from_hit).collect())
        .unwrap_or_default()
}
