//! Neighborhood Gold: livability, lifestyle, and investment scoring.

use tracing::info;

use roofline_core::catalog::EntityKind;
use roofline_core::metadata::GoldMetadata;
use roofline_engine::{EngineConnection, safe_identifier};

use crate::error::Result;

const ENRICHMENTS: [&str; 7] = [
    "density_categorization",
    "livability_scoring",
    "lifestyle_categorization",
    "investment_attractiveness",
    "market_facets",
    "data_quality_scoring",
    "geographic_hierarchy_from_silver",
];

/// Creates the `gold_neighborhoods` view.
pub struct NeighborhoodGoldEnricher<'a> {
    engine: &'a EngineConnection,
}

impl<'a> NeighborhoodGoldEnricher<'a> {
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
                 n.neighborhood_id, \
                 n.name, \
                 n.city, \
                 n.state, \
                 n.county, \
                 n.city_id AS location_city_id, \
                 n.county_id AS location_county_id, \
                 n.state_id AS location_state_id, \
                 n.location, \
                 CASE WHEN n.location IS NOT NULL AND LEN(n.location) >= 2 \
                      THEN n.location[2] ELSE 0.0 END AS center_latitude, \
                 CASE WHEN n.location IS NOT NULL AND LEN(n.location) >= 1 \
                      THEN n.location[1] ELSE 0.0 END AS center_longitude, \
                 n.population, \
                 CASE WHEN n.population >= 50000 THEN 'high_density' \
                      WHEN n.population >= 20000 THEN 'medium_density' \
                      WHEN n.population >= 5000 THEN 'low_density' \
                      ELSE 'rural' END AS density_category, \
                 n.walkability_score, \
                 n.school_rating, \
                 CAST(( \
                     COALESCE(CAST(n.walkability_score AS FLOAT), 0.0) * 0.5 + \
                     COALESCE(CAST(n.school_rating AS FLOAT), 0.0) * 10 * 0.5 \
                 ) AS FLOAT) AS overall_livability_score, \
                 CASE WHEN n.walkability_score >= 70 AND n.school_rating >= 8 \
                          THEN 'family_friendly_urban' \
                      WHEN n.walkability_score >= 70 THEN 'urban_lifestyle' \
                      WHEN n.school_rating >= 8 THEN 'family_oriented' \
                      ELSE 'standard_community' END AS lifestyle_category, \
                 CAST(( \
                     CASE WHEN n.population > 10000 THEN 30.0 \
                          ELSE CAST(n.population AS FLOAT) / 10000.0 * 30.0 END + \
                     (COALESCE(CAST(n.walkability_score AS FLOAT), 0.0) / 100.0 * 25.0 + \
                      COALESCE(CAST(n.school_rating AS FLOAT), 0.0) / 10.0 * 25.0) + \
                     CASE WHEN UPPER(n.city) IN ('SAN FRANCISCO', 'OAKLAND', 'BERKELEY') THEN 20.0 \
                          WHEN UPPER(n.city) IN ('PALO ALTO', 'MOUNTAIN VIEW', 'SUNNYVALE') THEN 18.0 \
                          ELSE 10.0 END \
                 ) AS FLOAT) AS investment_attractiveness_score, \
                 n.demographics, \
                 n.wikipedia_page_id, \
                 n.description, \
                 n.amenities, \
                 n.lifestyle_tags, \
                 n.embedding_text, \
                 ARRAY[ \
                     density_category, \
                     lifestyle_category, \
                     CASE WHEN investment_attractiveness_score >= 70 \
                          THEN 'high_investment' ELSE 'moderate_investment' END \
                 ] AS business_facets, \
                 CURRENT_TIMESTAMP AS gold_processed_at, \
                 'neighborhood_gold_v3_business_ready' AS processing_version, \
                 CASE WHEN n.demographics IS NOT NULL \
                          AND n.description IS NOT NULL \
                          AND LENGTH(n.description) > 20 \
                          AND n.amenities IS NOT NULL THEN 1.0 \
                      WHEN n.description IS NOT NULL THEN 0.7 \
                      ELSE 0.3 END AS data_completeness_score, \
                 n.embedding_vector, \
                 n.embedding_generated_at \
             FROM {input} n \
             WHERE n.neighborhood_id IS NOT NULL \
               AND n.name IS NOT NULL"
        );
        self.engine.execute_batch(&sql)?;

        let input_count = self.engine.count_records(input_table)?;
        let output_count = self.engine.count_records(output_view)?;
        info!(
            view = output_view,
            enrichments = ENRICHMENTS.len(),
            "created neighborhood gold view"
        );

        Ok(GoldMetadata::new(
            input_table,
            output_view,
            input_count,
            output_count,
            ENRICHMENTS.iter().map(|s| (*s).to_string()).collect(),
            EntityKind::Neighborhood,
        )?)
    }
}
