//! Neighborhood Silver: flatten metrics, pull the canonical county and
//! hierarchical IDs from the location reference, and attach embeddings.
//!
//! Depends on `silver_locations`; the orchestrator sequences that first.

use tracing::info;

use roofline_core::catalog::{EntityKind, TableCatalog};
use roofline_core::metadata::SilverMetadata;
use roofline_embed::EmbeddingGenerator;
use roofline_engine::{EngineConnection, JoinKind, Relation};

use crate::error::{PipelineError, Result};
use crate::silver::{IdColumn, check_non_null, check_state_codes, materialize_with_embeddings};

const FILTER: &str = "neighborhood_id IS NOT NULL AND name IS NOT NULL";

/// Join keys into the location reference. States are matched on the raw
/// source value since both feeds carry the same form.
const LOCATION_JOIN: &str = "n.name = l.neighborhood_standardized \
     AND n.city = l.city_standardized \
     AND n.state = l.state_original";

const PROJECTION: &str = "\
    n.neighborhood_id,\n\
    n.name,\n\
    n.city,\n\
    n.state,\n\
    l.county_standardized AS county,\n\
    l.city_id,\n\
    l.county_id,\n\
    l.state_id,\n\
    CASE WHEN n.coordinates.longitude IS NOT NULL AND n.coordinates.latitude IS NOT NULL\n\
         THEN LIST_VALUE(n.coordinates.longitude, n.coordinates.latitude)\n\
         ELSE NULL END AS location,\n\
    n.demographics.population AS population,\n\
    n.characteristics.walkability_score AS walkability_score,\n\
    n.characteristics.school_rating AS school_rating,\n\
    n.demographics,\n\
    n.description,\n\
    n.amenities,\n\
    n.lifestyle_tags,\n\
    n.wikipedia_correlations.primary_wiki_article.page_id AS wikipedia_page_id,\n\
    CONCAT_WS(' | ',\n\
        COALESCE(n.description, ''),\n\
        COALESCE(n.name, ''),\n\
        CONCAT('Population: ', COALESCE(n.demographics.population, 0))\n\
    ) AS embedding_text";

/// Transforms Bronze neighborhoods into `silver_neighborhoods`.
pub struct NeighborhoodSilverTransformer<'a> {
    engine: &'a EngineConnection,
    embedder: Option<&'a EmbeddingGenerator>,
}

impl<'a> NeighborhoodSilverTransformer<'a> {
    #[must_use]
    pub const fn new(
        engine: &'a EngineConnection,
        embedder: Option<&'a EmbeddingGenerator>,
    ) -> Self {
        Self { engine, embedder }
    }

    pub async fn transform(
        &self,
        input_table: &str,
        output_table: &str,
    ) -> Result<SilverMetadata> {
        let locations_table = TableCatalog::silver(EntityKind::Location);
        if !self.engine.table_exists(locations_table)? {
            return Err(PipelineError::MissingPrerequisite {
                table: locations_table.to_string(),
                stage: "silver:neighborhood".to_string(),
            });
        }

        let input_count = self.engine.count_records(input_table)?;

        let filtered = Relation::table(input_table)?.filter(FILTER).alias("n")?;
        let locations = Relation::table(locations_table)?.alias("l")?;
        let transformed = filtered.join_project(&locations, LOCATION_JOIN, JoinKind::Left, PROJECTION);

        materialize_with_embeddings(
            self.engine,
            self.embedder,
            transformed,
            output_table,
            EntityKind::Neighborhood,
            IdColumn::Text("neighborhood_id"),
            None,
        )
        .await?;

        check_non_null(self.engine, output_table, "neighborhood_id")?;
        check_state_codes(self.engine, output_table, "state")?;

        let output_count = self.engine.count_records(output_table)?;
        info!(
            input = input_count,
            output = output_count,
            dropped = input_count - output_count,
            "neighborhood silver transformation complete"
        );

        Ok(SilverMetadata::new(
            input_table,
            output_table,
            input_count,
            output_count,
            EntityKind::Neighborhood,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bronze::NeighborhoodBronzeIngester;
    use crate::tests_support::{
        seed_silver_locations, settings_with_sources, write_neighborhoods_fixture,
    };

    async fn transformed_engine() -> EngineConnection {
        let dir = tempfile::tempdir().unwrap();
        write_neighborhoods_fixture(dir.path(), 3);
        let settings = settings_with_sources(dir.path());
        let engine = EngineConnection::in_memory().unwrap();
        seed_silver_locations(&engine, dir.path());
        NeighborhoodBronzeIngester::new(&settings, &engine)
            .ingest("bronze_neighborhoods", None, None)
            .unwrap();
        NeighborhoodSilverTransformer::new(&engine, None)
            .transform("bronze_neighborhoods", "silver_neighborhoods")
            .await
            .unwrap();
        engine
    }

    fn query_str(engine: &EngineConnection, sql: &str) -> Option<String> {
        engine
            .with_connection(|conn| conn.query_row(sql, [], |row| row.get::<_, Option<String>>(0)))
            .unwrap()
    }

    #[tokio::test]
    async fn location_join_pulls_county_and_hierarchy_ids() {
        let engine = transformed_engine().await;
        let county = query_str(
            &engine,
            "SELECT county FROM silver_neighborhoods WHERE name = 'Noe Valley'",
        );
        assert_eq!(county.as_deref(), Some("San Francisco"));
        let city_id = query_str(
            &engine,
            "SELECT city_id FROM silver_neighborhoods WHERE name = 'Noe Valley'",
        );
        assert_eq!(city_id.as_deref(), Some("sanfrancisco_california"));
    }

    #[tokio::test]
    async fn unmatched_neighborhoods_keep_null_county() {
        let dir = tempfile::tempdir().unwrap();
        write_neighborhoods_fixture(dir.path(), 3);
        let settings = settings_with_sources(dir.path());
        let engine = EngineConnection::in_memory().unwrap();
        seed_silver_locations(&engine, dir.path());
        NeighborhoodBronzeIngester::new(&settings, &engine)
            .ingest("bronze_neighborhoods", None, None)
            .unwrap();
        // Remove the matching reference row so one neighborhood is orphaned.
        engine
            .execute_batch(
                "DELETE FROM silver_locations WHERE neighborhood_standardized = 'Sugar House'",
            )
            .unwrap();
        NeighborhoodSilverTransformer::new(&engine, None)
            .transform("bronze_neighborhoods", "silver_neighborhoods")
            .await
            .unwrap();
        let county = query_str(
            &engine,
            "SELECT county FROM silver_neighborhoods WHERE name = 'Sugar House'",
        );
        assert_eq!(county, None);
        // The row itself survives the left join.
        let count = engine
            .query_i64("SELECT COUNT(*) FROM silver_neighborhoods WHERE name = 'Sugar House'")
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn wikipedia_page_id_is_hoisted_from_the_nested_struct() {
        let engine = transformed_engine().await;
        let page_id = engine
            .query_i64(
                "SELECT wikipedia_page_id FROM silver_neighborhoods WHERE neighborhood_id = 'nb-0'",
            )
            .unwrap();
        assert_eq!(page_id, 9001);
    }

    #[tokio::test]
    async fn location_is_lon_lat_ordered() {
        let engine = transformed_engine().await;
        let lon = engine
            .with_connection(|conn| {
                conn.query_row(
                    "SELECT location[1] FROM silver_neighborhoods WHERE neighborhood_id = 'nb-0'",
                    [],
                    |row| row.get::<_, f64>(0),
                )
            })
            .unwrap();
        assert!(lon < 0.0, "longitude should come first, got {lon}");
    }

    #[tokio::test]
    async fn missing_location_table_is_a_prerequisite_error() {
        let dir = tempfile::tempdir().unwrap();
        write_neighborhoods_fixture(dir.path(), 2);
        let settings = settings_with_sources(dir.path());
        let engine = EngineConnection::in_memory().unwrap();
        NeighborhoodBronzeIngester::new(&settings, &engine)
            .ingest("bronze_neighborhoods", None, None)
            .unwrap();
        let err = NeighborhoodSilverTransformer::new(&engine, None)
            .transform("bronze_neighborhoods", "silver_neighborhoods")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingPrerequisite { .. }));
    }
}
