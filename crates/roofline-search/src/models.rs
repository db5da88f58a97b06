//! Typed models for the retrieval pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Location intent extracted from a natural-language query.
///
/// All component fields use `None` for "not found"; the extraction layer
/// maps the model's `""`/`"unknown"`/`"none"` answers to `None` before this
/// struct is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationIntent {
    pub city: Option<String>,
    pub state: Option<String>,
    pub neighborhood: Option<String>,
    pub zip_code: Option<String>,
    pub has_location: bool,
    pub cleaned_query: String,
    /// Extraction confidence, clamped to `[0, 1]`.
    pub confidence: f64,
}

impl LocationIntent {
    /// Intent carrying no location at all; the rule-based fallback.
    #[must_use]
    pub fn none(query: &str) -> Self {
        Self {
            cleaned_query: query.to_string(),
            ..Self::default()
        }
    }
}

/// Parameters for one hybrid query.
#[derive(Debug, Clone, Serialize)]
pub struct HybridSearchParams {
    pub query_text: String,
    pub size: usize,
    pub rank_constant: u32,
    pub rank_window_size: u32,
    pub text_boost: f64,
    pub vector_boost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_intent: Option<LocationIntent>,
}

impl HybridSearchParams {
    #[must_use]
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            size: 10,
            rank_constant: 60,
            rank_window_size: 100,
            text_boost: 1.0,
            vector_boost: 1.0,
            location_intent: None,
        }
    }
}

/// One fused hit. Under RRF the engine only reports the combined score;
/// per-retriever scores are not available.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyHit {
    pub listing_id: String,
    pub hybrid_score: f64,
    pub source: Value,
}

impl PropertyHit {
    /// Build from a raw engine hit. Hits without a `listing_id` are
    /// malformed and dropped by the caller.
    #[must_use]
    pub fn from_hit(hit: &Value) -> Option<Self> {
        let source = hit.get("_source")?.clone();
        let listing_id = source.get("listing_id")?.as_str()?.to_string();
        let hybrid_score = hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0);
        Some(Self {
            listing_id,
            hybrid_score,
            source,
        })
    }
}

/// Complete result of a hybrid query.
#[derive(Debug, Clone, Serialize)]
pub struct HybridSearchResult {
    pub query: String,
    pub total_hits: u64,
    pub execution_time_ms: u64,
    pub engine_took_ms: u64,
    pub embedding_time_ms: u64,
    pub results: Vec<PropertyHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_intent: Option<LocationIntent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_params_match_the_fusion_contract() {
        let params = HybridSearchParams::new("condo with a view");
        assert_eq!(params.size, 10);
        assert_eq!(params.rank_constant, 60);
        assert_eq!(params.rank_window_size, 100);
        assert!(params.location_intent.is_none());
    }

    #[test]
    fn hit_conversion_reads_score_and_source() {
        let hit = json!({
            "_id": "prop-1",
            "_score": 0.0328,
            "_source": { "listing_id": "prop-1", "price": 850000.0 }
        });
        let shaped = PropertyHit::from_hit(&hit).unwrap();
        assert_eq!(shaped.listing_id, "prop-1");
        assert!((shaped.hybrid_score - 0.0328).abs() < 1e-9);
        assert_eq!(shaped.source["price"], json!(850000.0));
    }

    #[test]
    fn hits_without_listing_id_are_rejected() {
        let hit = json!({ "_score": 1.0, "_source": { "price": 1.0 } });
        assert!(PropertyHit::from_hit(&hit).is_none());
    }

    #[test]
    fn none_intent_keeps_the_raw_query() {
        let intent = LocationIntent::none("updated kitchen");
        assert!(!intent.has_location);
        assert_eq!(intent.cleaned_query, "updated kitchen");
        assert_eq!(intent.confidence, 0.0);
    }
}
