//! Property Gold: searchable listing view with status, amenities, search
//! tags, a parking struct, and a neighborhood/Wikipedia enriched
//! description.

use tracing::info;

use roofline_core::catalog::EntityKind;
use roofline_core::metadata::GoldMetadata;
use roofline_engine::{EngineConnection, safe_identifier};

use crate::error::Result;

const ENRICHMENTS: [&str; 4] = [
    "status_field",
    "amenities_field",
    "search_tags_field",
    "enriched_description",
];

/// Creates the `gold_properties` view.
pub struct PropertyGoldEnricher<'a> {
    engine: &'a EngineConnection,
}

impl<'a> PropertyGoldEnricher<'a> {
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
                 s.listing_id, \
                 s.neighborhood_id, \
                 s.bedrooms, \
                 s.bathrooms, \
                 s.square_feet, \
                 s.property_type, \
                 s.year_built, \
                 s.lot_size, \
                 CAST(s.price AS FLOAT) AS price, \
                 CAST(s.price_per_sqft AS FLOAT) AS price_per_sqft, \
                 s.address, \
                 struct_pack( \
                     spaces := COALESCE(s.garage_spaces, 0), \
                     type := CASE WHEN s.garage_spaces > 2 THEN 'multi_car_garage' \
                                  WHEN s.garage_spaces > 0 THEN 'single_garage' \
                                  ELSE 'street_parking' END \
                 ) AS parking, \
                 s.description, \
                 s.description || COALESCE( \
                     ' Located in ' || n.name || '. ' || \
                     (SELECT w.extract FROM silver_wikipedia w \
                      WHERE w.page_id = n.wikipedia_page_id LIMIT 1), \
                     '' \
                 ) AS enriched_description, \
                 s.features, \
                 s.virtual_tour_url, \
                 s.images, \
                 s.listing_date, \
                 s.days_on_market, \
                 'active' AS status, \
                 s.features AS amenities, \
                 LIST_VALUE( \
                     s.property_type, \
                     CASE WHEN s.bedrooms = 1 THEN 'studio' \
                          WHEN s.bedrooms = 2 THEN 'two-bedroom' \
                          WHEN s.bedrooms = 3 THEN 'three-bedroom' \
                          WHEN s.bedrooms >= 4 THEN 'family-home' \
                          ELSE 'property' END, \
                     CASE WHEN s.price < 500000 THEN 'affordable' \
                          WHEN s.price < 1000000 THEN 'mid-range' \
                          ELSE 'luxury' END \
                 ) AS search_tags, \
                 s.embedding_text, \
                 CURRENT_TIMESTAMP AS gold_processed_at, \
                 'property_gold_v3_business_ready' AS processing_version, \
                 s.embedding_vector, \
                 s.embedding_generated_at \
             FROM {input} s \
             LEFT JOIN silver_neighborhoods n ON s.neighborhood_id = n.neighborhood_id \
             WHERE s.listing_id IS NOT NULL \
               AND s.price > 0 \
               AND s.square_feet > 0"
        );
        self.engine.execute_batch(&sql)?;

        let input_count = self.engine.count_records(input_table)?;
        let output_count = self.engine.count_records(output_view)?;
        info!(
            view = output_view,
            enrichments = ENRICHMENTS.len(),
            "created property gold view"
        );

        Ok(GoldMetadata::new(
            input_table,
            output_view,
            input_count,
            output_count,
            ENRICHMENTS.iter().map(|s| (*s).to_string()).collect(),
            EntityKind::Property,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bronze::{NeighborhoodBronzeIngester, PropertyBronzeIngester};
    use crate::silver::{NeighborhoodSilverTransformer, PropertySilverTransformer};
    use crate::tests_support::{
        seed_bronze_wikipedia, seed_silver_locations, settings_with_sources,
        write_neighborhoods_fixture, write_properties_fixture,
    };

    async fn gold_engine() -> EngineConnection {
        let dir = tempfile::tempdir().unwrap();
        write_properties_fixture(dir.path(), 4);
        write_neighborhoods_fixture(dir.path(), 3);
        let settings = settings_with_sources(dir.path());
        let engine = EngineConnection::in_memory().unwrap();
        seed_silver_locations(&engine, dir.path());
        PropertyBronzeIngester::new(&settings, &engine)
            .ingest("bronze_properties", None, None)
            .unwrap();
        NeighborhoodBronzeIngester::new(&settings, &engine)
            .ingest("bronze_neighborhoods", None, None)
            .unwrap();
        PropertySilverTransformer::new(&engine, None)
            .transform("bronze_properties", "silver_properties")
            .await
            .unwrap();
        NeighborhoodSilverTransformer::new(&engine, None)
            .transform("bronze_neighborhoods", "silver_neighborhoods")
            .await
            .unwrap();
        seed_bronze_wikipedia(&engine);
        crate::silver::WikipediaSilverTransformer::new(&engine, None)
            .transform("bronze_wikipedia", "silver_wikipedia")
            .await
            .unwrap();
        PropertyGoldEnricher::new(&engine)
            .enrich("silver_properties", "gold_properties")
            .unwrap();
        engine
    }

    fn query_str(engine: &EngineConnection, sql: &str) -> String {
        engine
            .with_connection(|conn| conn.query_row(sql, [], |row| row.get::<_, String>(0)))
            .unwrap()
    }

    #[tokio::test]
    async fn view_exposes_every_silver_row_that_passes_the_filter() {
        let engine = gold_engine().await;
        assert_eq!(engine.count_records("gold_properties").unwrap(), 4);
    }

    #[tokio::test]
    async fn search_tags_bucket_bedrooms_and_price() {
        let engine = gold_engine().await;
        // prop-0: 2 bedrooms, 500k.
        let tags = query_str(
            &engine,
            "SELECT search_tags[2] || '/' || search_tags[3] \
             FROM gold_properties WHERE listing_id = 'prop-0'",
        );
        assert_eq!(tags, "two-bedroom/mid-range");
    }

    #[tokio::test]
    async fn parking_struct_derives_from_garage_spaces() {
        let engine = gold_engine().await;
        // prop-0 has 0 garage spaces.
        let parking = query_str(
            &engine,
            "SELECT parking.type FROM gold_properties WHERE listing_id = 'prop-0'",
        );
        assert_eq!(parking, "street_parking");
        // prop-3 has 3 garage spaces.
        let multi = query_str(
            &engine,
            "SELECT parking.type FROM gold_properties WHERE listing_id = 'prop-3'",
        );
        assert_eq!(multi, "multi_car_garage");
    }

    #[tokio::test]
    async fn enriched_description_pulls_neighborhood_and_wiki_context() {
        let engine = gold_engine().await;
        let text = query_str(
            &engine,
            "SELECT enriched_description FROM gold_properties WHERE listing_id = 'prop-0'",
        );
        assert!(text.contains("Located in Noe Valley."));
        assert!(text.contains("Noe Valley is a neighborhood in central San Francisco."));
    }

    #[tokio::test]
    async fn amenities_mirror_features() {
        let engine = gold_engine().await;
        let count = engine
            .query_i64("SELECT COUNT(*) FROM gold_properties WHERE amenities != features")
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn view_recomputes_when_silver_changes() {
        let engine = gold_engine().await;
        engine
            .execute_batch("DELETE FROM silver_properties WHERE listing_id = 'prop-0'")
            .unwrap();
        assert_eq!(engine.count_records("gold_properties").unwrap(), 3);
    }
}
