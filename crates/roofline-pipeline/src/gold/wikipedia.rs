//! Wikipedia Gold: quality, authority, topic, and ranking enrichment with
//! the neighborhood-association boost.

use tracing::info;

use roofline_core::catalog::EntityKind;
use roofline_core::metadata::GoldMetadata;
use roofline_engine::{EngineConnection, safe_identifier};

use crate::error::Result;

const ENRICHMENTS: [&str; 9] = [
    "content_quality_analysis",
    "authority_scoring",
    "topic_extraction",
    "geographic_relevance",
    "business_categorization",
    "search_optimization",
    "ranking_algorithms",
    "neighborhood_quality_boost",
    "neighborhood_search_facets",
];

/// Creates the `gold_wikipedia` view.
pub struct WikipediaGoldEnricher<'a> {
    engine: &'a EngineConnection,
}

impl<'a> WikipediaGoldEnricher<'a> {
    #[must_use]
    pub const fn new(engine: &'a EngineConnection) -> Self {
        Self { engine }
    }

    pub fn enrich(&self, input_table: &str, output_view: &str) -> Result<GoldMetadata> {
        let input = safe_identifier(input_table)?;
        let output = safe_identifier(output_view)?;

        let sql = format!(
            "CREATE OR REPLACE VIEW {output} AS \
             SELECT \
                 page_id, \
                 title, \
                 url, \
                 long_summary, \
                 short_summary, \
                 false AS content_loaded, \
                 crawled_at AS content_loaded_at, \
                 html_file AS article_filename, \
                 CASE WHEN longitude IS NOT NULL AND latitude IS NOT NULL \
                      THEN LIST_VALUE(longitude, latitude) ELSE NULL END AS location, \
                 CASE WHEN LENGTH(long_summary) >= 1000 AND links_count >= 10 THEN 'comprehensive' \
                      WHEN LENGTH(long_summary) >= 500 AND links_count >= 5 THEN 'detailed' \
                      WHEN LENGTH(long_summary) >= 200 THEN 'basic' \
                      ELSE 'stub' END AS content_depth_category, \
                 CAST(( \
                     LEAST(LENGTH(long_summary) / 1000.0, 1.0) * 40 + \
                     LEAST(COALESCE(links_count, 0) / 20.0, 1.0) * 30 + \
                     COALESCE(relevance_score, 0) * 30 \
                 ) AS FLOAT) AS authority_score, \
                 categories, \
                 CASE WHEN categories IS NOT NULL AND LENGTH(categories) > 0 \
                      THEN list_filter( \
                          ARRAY[ \
                              CASE WHEN categories LIKE '%geography%' OR categories LIKE '%location%' THEN 'geography' END, \
                              CASE WHEN categories LIKE '%history%' OR categories LIKE '%historic%' THEN 'history' END, \
                              CASE WHEN categories LIKE '%business%' OR categories LIKE '%company%' THEN 'business' END, \
                              CASE WHEN categories LIKE '%culture%' OR categories LIKE '%art%' THEN 'culture' END, \
                              CASE WHEN categories LIKE '%transport%' OR categories LIKE '%infrastructure%' THEN 'infrastructure' END \
                          ], \
                          x -> x IS NOT NULL) \
                      ELSE CAST([] AS VARCHAR[]) END AS key_topics, \
                 relevance_score, \
                 CAST(( \
                     ( \
                         COALESCE(relevance_score, 0) * 0.4 + \
                         CASE WHEN LENGTH(long_summary) >= 1000 THEN 0.6 \
                              WHEN LENGTH(long_summary) >= 500 THEN 0.4 \
                              WHEN LENGTH(long_summary) >= 200 THEN 0.2 \
                              ELSE 0.1 END * 0.3 + \
                         CASE WHEN COALESCE(links_count, 0) >= 20 THEN 0.6 \
                              WHEN COALESCE(links_count, 0) >= 10 THEN 0.4 \
                              WHEN COALESCE(links_count, 0) >= 5 THEN 0.2 \
                              ELSE 0.1 END * 0.3 \
                     ) + \
                     CASE WHEN neighborhood_names IS NOT NULL AND len(neighborhood_names) > 1 THEN 0.15 \
                          WHEN neighborhood_names IS NOT NULL AND len(neighborhood_names) >= 1 THEN 0.1 \
                          ELSE 0.0 END \
                 ) AS FLOAT) AS article_quality_score, \
                 CASE WHEN COALESCE(relevance_score, 0) >= 0.8 AND LENGTH(long_summary) >= 500 THEN 'premium' \
                      WHEN COALESCE(relevance_score, 0) >= 0.6 AND LENGTH(long_summary) >= 200 THEN 'high' \
                      WHEN COALESCE(relevance_score, 0) >= 0.4 THEN 'medium' \
                      ELSE 'basic' END AS article_quality, \
                 CASE WHEN latitude IS NOT NULL AND longitude IS NOT NULL THEN 1.0 \
                      WHEN latitude IS NOT NULL OR longitude IS NOT NULL THEN 0.5 \
                      ELSE 0.0 END AS geographic_relevance_score, \
                 city, \
                 state, \
                 crawled_at AS last_updated, \
                 embedding_text, \
                 ARRAY[ \
                     article_quality, \
                     content_depth_category, \
                     CASE WHEN geographic_relevance_score >= 0.5 THEN 'geo_located' ELSE 'no_location' END, \
                     CASE WHEN authority_score >= 70 THEN 'high_authority' ELSE 'standard_authority' END, \
                     CASE WHEN neighborhood_names IS NOT NULL AND len(neighborhood_names) > 1 THEN 'multi_neighborhood' \
                          WHEN neighborhood_names IS NOT NULL AND len(neighborhood_names) = 1 THEN 'has_neighborhood' \
                          ELSE 'no_neighborhood' END \
                 ] AS search_facets, \
                 CURRENT_TIMESTAMP AS gold_processed_at, \
                 'wikipedia_gold_v4_neighborhood_enhanced' AS processing_version, \
                 CASE WHEN neighborhood_names IS NOT NULL THEN len(neighborhood_names) \
                      ELSE 0 END AS neighborhood_count, \
                 CASE WHEN neighborhood_names IS NOT NULL AND len(neighborhood_names) > 0 \
                      THEN true ELSE false END AS has_neighborhood_association, \
                 CAST(( \
                     article_quality_score * 0.45 + \
                     geographic_relevance_score * 0.25 + \
                     CASE WHEN LENGTH(title) BETWEEN 10 AND 100 THEN 0.15 ELSE 0.05 END + \
                     CASE WHEN neighborhood_names IS NOT NULL AND len(neighborhood_names) > 0 THEN 0.15 \
                          ELSE 0.0 END \
                 ) AS FLOAT) AS search_ranking_score, \
                 embedding_vector, \
                 embedding_generated_at, \
                 neighborhood_ids, \
                 neighborhood_names, \
                 primary_neighborhood_name \
             FROM {input} \
             WHERE page_id IS NOT NULL \
               AND title IS NOT NULL \
               AND LENGTH(title) > 0"
        );
        self.engine.execute_batch(&sql)?;

        let input_count = self.engine.count_records(input_table)?;
        let output_count = self.engine.count_records(output_view)?;
        info!(
            view = output_view,
            enrichments = ENRICHMENTS.len(),
            "created wikipedia gold view"
        );

        Ok(GoldMetadata::new(
            input_table,
            output_view,
            input_count,
            output_count,
            ENRICHMENTS.iter().map(|s| (*s).to_string()).collect(),
            EntityKind::Wikipedia,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::silver::WikipediaSilverTransformer;
    use crate::tests_support::seed_bronze_wikipedia;

    fn query_f64(engine: &EngineConnection, sql: &str) -> f64 {
        engine
            .with_connection(|conn| conn.query_row(sql, [], |row| row.get::<_, f64>(0)))
            .unwrap()
    }

    fn query_str(engine: &EngineConnection, sql: &str) -> String {
        engine
            .with_connection(|conn| conn.query_row(sql, [], |row| row.get::<_, String>(0)))
            .unwrap()
    }

    /// Build gold over a hand-written silver table so neighborhood
    /// association counts are exact.
    fn engine_with_synthetic_silver() -> EngineConnection {
        let engine = EngineConnection::in_memory().unwrap();
        engine
            .execute_batch(
                "CREATE TABLE silver_wikipedia AS SELECT * FROM (VALUES \
                 (1, 'Article With Two Neighborhoods', 'https://w/1', 'e', 'geography', \
                  37.7, -122.4, 'SF', 'SF', 'CA', 0.5, 1, '2024-01-01', 'a.html', 'h', NULL, 8, NULL, \
                  'short', REPEAT('x', 600), 0.5, 'text', \
                  ['n1', 'n2'], ['A', 'B'], 'A', \
                  NULL::DOUBLE[], NULL::TIMESTAMP), \
                 (2, 'Article With No Neighborhoods', 'https://w/2', 'e', 'geography', \
                  37.7, -122.4, 'SF', 'SF', 'CA', 0.5, 1, '2024-01-01', 'b.html', 'h', NULL, 8, NULL, \
                  'short', REPEAT('x', 600), 0.5, 'text', \
                  NULL::VARCHAR[], NULL::VARCHAR[], NULL, \
                  NULL::DOUBLE[], NULL::TIMESTAMP) \
                 ) AS t(page_id, title, url, extract, categories, latitude, longitude, \
                        city, county, state, relevance_score, depth, crawled_at, html_file, \
                        file_hash, image_url, links_count, infobox_data, short_summary, \
                        long_summary, silver_quality_score, embedding_text, \
                        neighborhood_ids, neighborhood_names, primary_neighborhood_name, \
                        embedding_vector, embedding_generated_at)",
            )
            .unwrap();
        WikipediaGoldEnricher::new(&engine)
            .enrich("silver_wikipedia", "gold_wikipedia")
            .unwrap();
        engine
    }

    #[test]
    fn two_neighborhood_boost_is_exactly_fifteen_hundredths() {
        let engine = engine_with_synthetic_silver();
        // Identical articles except for associations.
        let boosted = query_f64(
            &engine,
            "SELECT article_quality_score FROM gold_wikipedia WHERE page_id = 1",
        );
        let plain = query_f64(
            &engine,
            "SELECT article_quality_score FROM gold_wikipedia WHERE page_id = 2",
        );
        assert!(
            ((boosted - plain) - 0.15).abs() < 1e-6,
            "boost was {}",
            boosted - plain
        );
    }

    #[test]
    fn unassociated_article_has_no_association_flag() {
        let engine = engine_with_synthetic_silver();
        let flag = engine
            .query_i64(
                "SELECT CAST(has_neighborhood_association AS INTEGER) \
                 FROM gold_wikipedia WHERE page_id = 2",
            )
            .unwrap();
        assert_eq!(flag, 0);
        let count = engine
            .query_i64("SELECT neighborhood_count FROM gold_wikipedia WHERE page_id = 2")
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn search_facets_mark_multi_neighborhood_articles() {
        let engine = engine_with_synthetic_silver();
        let facet = query_str(
            &engine,
            "SELECT search_facets[5] FROM gold_wikipedia WHERE page_id = 1",
        );
        assert_eq!(facet, "multi_neighborhood");
        let none = query_str(
            &engine,
            "SELECT search_facets[5] FROM gold_wikipedia WHERE page_id = 2",
        );
        assert_eq!(none, "no_neighborhood");
    }

    #[tokio::test]
    async fn gold_over_real_silver_exposes_state_codes() {
        let engine = EngineConnection::in_memory().unwrap();
        seed_bronze_wikipedia(&engine);
        WikipediaSilverTransformer::new(&engine, None)
            .transform("bronze_wikipedia", "silver_wikipedia")
            .await
            .unwrap();
        WikipediaGoldEnricher::new(&engine)
            .enrich("silver_wikipedia", "gold_wikipedia")
            .unwrap();

        // Scenario: Bronze best_state 'California' → Silver 'CA' → Gold 'CA'.
        let state = query_str(
            &engine,
            "SELECT state FROM gold_wikipedia WHERE page_id = 9001",
        );
        assert_eq!(state, "CA");
        assert_eq!(engine.count_records("gold_wikipedia").unwrap(), 3);
    }

    #[test]
    fn key_topics_match_category_substrings() {
        let engine = engine_with_synthetic_silver();
        let topic = query_str(
            &engine,
            "SELECT key_topics[1] FROM gold_wikipedia WHERE page_id = 1",
        );
        assert_eq!(topic, "geography");
    }
}
