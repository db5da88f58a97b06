//! RRF query construction with filter pushdown.
//!
//! The fused plan carries two sub-retrievers: a lexical multi-match over
//! weighted text fields and a kNN retriever over the embedding field. Both
//! receive the *same* filter clauses, so scoring always operates on the
//! filtered candidate set; nothing is filtered post-hoc.

use serde_json::{Value, json};

use crate::location::LocationFilterBuilder;
use crate::models::HybridSearchParams;

/// Fields returned with each hit.
const SOURCE_FIELDS: [&str; 10] = [
    "listing_id",
    "property_type",
    "price",
    "bedrooms",
    "bathrooms",
    "square_feet",
    "address",
    "description",
    "features",
    "neighborhood",
];

/// Builds fused retriever plans.
#[derive(Debug, Clone, Copy, Default)]
pub struct RrfQueryBuilder;

impl RrfQueryBuilder {
    /// Build the complete search body.
    #[must_use]
    pub fn build_query(
        params: &HybridSearchParams,
        query_vector: &[f32],
        query_text: &str,
    ) -> Value {
        let filters = params
            .location_intent
            .as_ref()
            .map(LocationFilterBuilder::build_filters)
            .unwrap_or_default();

        let text_query = Self::build_text_query(query_text, params.text_boost, &filters);
        let vector_config = Self::build_vector_config(query_vector, params.size, &filters);

        json!({
            "retriever": {
                "rrf": {
                    "retrievers": [
                        { "standard": { "query": text_query } },
                        { "knn": vector_config },
                    ],
                    "rank_constant": params.rank_constant,
                    "rank_window_size": params.rank_window_size,
                }
            },
            "size": params.size,
            "_source": SOURCE_FIELDS,
        })
    }

    /// Lexical retriever: best-fields multi-match with AUTO fuzziness over
    /// the weighted text fields, wrapped with the filters when present.
    fn build_text_query(query_text: &str, text_boost: f64, filters: &[Value]) -> Value {
        let base = json!({
            "multi_match": {
                "query": query_text,
                "fields": [
                    format!("description^{}", 2.0 * text_boost),
                    format!("features^{}", 1.5 * text_boost),
                    format!("amenities^{}", 1.5 * text_boost),
                    "address.street",
                    "address.city",
                    "neighborhood.name",
                ],
                "type": "best_fields",
                "fuzziness": "AUTO",
            }
        });
        if filters.is_empty() {
            base
        } else {
            json!({ "bool": { "must": base, "filter": filters } })
        }
    }

    /// Vector retriever: kNN over the embedding field, candidate counts
    /// capped, filters applied inside the kNN search.
    fn build_vector_config(query_vector: &[f32], size: usize, filters: &[Value]) -> Value {
        let mut config = json!({
            "field": "embedding",
            "query_vector": query_vector,
            "k": (size * 5).min(100),
            "num_candidates": (size * 10).min(200),
        });
        if !filters.is_empty() {
            config["filter"] = json!(filters);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocationIntent;

    fn sf_intent() -> LocationIntent {
        LocationIntent {
            city: Some("San Francisco".into()),
            state: None,
            neighborhood: None,
            zip_code: None,
            has_location: true,
            cleaned_query: "Luxury waterfront condo".into(),
            confidence: 0.95,
        }
    }

    fn filters_of(plan: &Value) -> (Value, Value) {
        let retrievers = &plan["retriever"]["rrf"]["retrievers"];
        let lexical = retrievers[0]["standard"]["query"]["bool"]["filter"].clone();
        let vector = retrievers[1]["knn"]["filter"].clone();
        (lexical, vector)
    }

    #[test]
    fn both_sub_retrievers_carry_identical_filters() {
        let mut params = HybridSearchParams::new("Luxury waterfront condo in San Francisco");
        params.location_intent = Some(sf_intent());
        let plan = RrfQueryBuilder::build_query(&params, &[0.1; 8], "Luxury waterfront condo");

        let (lexical, vector) = filters_of(&plan);
        assert_eq!(lexical, vector, "filter pushdown must be identical");
        assert_eq!(
            lexical[0],
            serde_json::json!({ "term": { "address.city": "san francisco" } })
        );
    }

    #[test]
    fn no_location_yields_unfiltered_retrievers() {
        let params = HybridSearchParams::new("Updated kitchen and bathrooms");
        let plan = RrfQueryBuilder::build_query(&params, &[0.1; 8], "Updated kitchen and bathrooms");
        let retrievers = &plan["retriever"]["rrf"]["retrievers"];
        // Unfiltered lexical retriever is a bare multi_match.
        assert!(retrievers[0]["standard"]["query"]["multi_match"].is_object());
        assert!(retrievers[1]["knn"]["filter"].is_null());
    }

    #[test]
    fn knn_candidate_counts_are_capped() {
        let mut params = HybridSearchParams::new("condo");
        params.size = 50;
        let plan = RrfQueryBuilder::build_query(&params, &[0.0; 4], "condo");
        let knn = &plan["retriever"]["rrf"]["retrievers"][1]["knn"];
        assert_eq!(knn["k"], 100); // min(50*5, 100)
        assert_eq!(knn["num_candidates"], 200); // min(50*10, 200)

        params.size = 10;
        let plan = RrfQueryBuilder::build_query(&params, &[0.0; 4], "condo");
        let knn = &plan["retriever"]["rrf"]["retrievers"][1]["knn"];
        assert_eq!(knn["k"], 50);
        assert_eq!(knn["num_candidates"], 100);
    }

    #[test]
    fn lexical_fields_carry_the_documented_boosts() {
        let params = HybridSearchParams::new("garden");
        let plan = RrfQueryBuilder::build_query(&params, &[0.0; 4], "garden");
        let fields = plan["retriever"]["rrf"]["retrievers"][0]["standard"]["query"]["multi_match"]
            ["fields"]
            .as_array()
            .unwrap();
        assert_eq!(fields[0], "description^2");
        assert_eq!(fields[1], "features^1.5");
        assert_eq!(fields[2], "amenities^1.5");
        assert_eq!(fields[3], "address.street");
    }

    #[test]
    fn fusion_parameters_flow_from_params() {
        let mut params = HybridSearchParams::new("condo");
        params.rank_constant = 42;
        params.rank_window_size = 64;
        let plan = RrfQueryBuilder::build_query(&params, &[0.0; 4], "condo");
        assert_eq!(plan["retriever"]["rrf"]["rank_constant"], 42);
        assert_eq!(plan["retriever"]["rrf"]["rank_window_size"], 64);
        assert_eq!(plan["size"], 10);
    }
}
