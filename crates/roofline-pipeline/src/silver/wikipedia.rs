//! Wikipedia Silver: rename and trim, canonicalize states, aggregate the
//! neighborhood associations, attach embeddings, and deduplicate by an
//! explicit quality score.

use tracing::{info, warn};

use roofline_core::catalog::{EntityKind, TableCatalog};
use roofline_core::metadata::SilverMetadata;
use roofline_core::normalize::state_case_sql;
use roofline_embed::EmbeddingGenerator;
use roofline_engine::{EngineConnection, JoinKind, Relation};

use crate::error::Result;
use crate::silver::{IdColumn, check_non_null, check_state_codes, materialize_with_embeddings};

/// Quality formula used for Silver-side dedup. Mirrors the Gold base score
/// (relevance 40%, summary-length band 30%, link band 30%) without the
/// neighborhood boost, which only exists after Gold's enrichment.
const QUALITY_SCORE: &str = "\
    CAST((\n\
        COALESCE(relevance_score, 0) * 0.4 +\n\
        CASE WHEN LENGTH(long_summary) >= 1000 THEN 0.6\n\
             WHEN LENGTH(long_summary) >= 500 THEN 0.4\n\
             WHEN LENGTH(long_summary) >= 200 THEN 0.2\n\
             ELSE 0.1 END * 0.3 +\n\
        CASE WHEN COALESCE(links_count, 0) >= 20 THEN 0.6\n\
             WHEN COALESCE(links_count, 0) >= 10 THEN 0.4\n\
             WHEN COALESCE(links_count, 0) >= 5 THEN 0.2\n\
             ELSE 0.1 END * 0.3\n\
    ) AS FLOAT)";

/// Keep the best-quality crawl per page, newest embedding as tiebreaker.
const DEDUP_WINDOW: &str = "PARTITION BY page_id \
     ORDER BY silver_quality_score DESC, embedding_generated_at DESC NULLS LAST";

const NEIGHBORHOOD_AGGREGATE: &str = "\
    wikipedia_page_id AS page_id,\n\
    LIST(DISTINCT neighborhood_id ORDER BY neighborhood_id) AS neighborhood_ids,\n\
    LIST(DISTINCT name ORDER BY name) AS neighborhood_names,\n\
    FIRST(name ORDER BY neighborhood_id) AS primary_neighborhood_name";

/// Transforms Bronze Wikipedia articles into `silver_wikipedia`.
pub struct WikipediaSilverTransformer<'a> {
    engine: &'a EngineConnection,
    embedder: Option<&'a EmbeddingGenerator>,
}

impl<'a> WikipediaSilverTransformer<'a> {
    #[must_use]
    pub const fn new(
        engine: &'a EngineConnection,
        embedder: Option<&'a EmbeddingGenerator>,
    ) -> Self {
        Self { engine, embedder }
    }

    fn projection() -> String {
        format!(
            "pageid AS page_id,\n\
             TRIM(title) AS title,\n\
             url,\n\
             TRIM(extract) AS extract,\n\
             categories,\n\
             latitude,\n\
             longitude,\n\
             best_city AS city,\n\
             best_county AS county,\n\
             {state_case},\n\
             relevance_score,\n\
             depth,\n\
             crawled_at,\n\
             html_file,\n\
             file_hash,\n\
             image_url,\n\
             links_count,\n\
             infobox_data,\n\
             short_summary,\n\
             long_summary,\n\
             {QUALITY_SCORE} AS silver_quality_score,\n\
             CONCAT_WS(' | ', TRIM(title), TRIM(extract)) AS embedding_text",
            state_case = state_case_sql("best_state", "state"),
        )
    }

    pub async fn transform(
        &self,
        input_table: &str,
        output_table: &str,
    ) -> Result<SilverMetadata> {
        let input_count = self.engine.count_records(input_table)?;

        let transformed = Relation::table(input_table)?
            .filter("pageid IS NOT NULL")
            .project(&Self::projection())
            .alias("w")?;

        // Left-aggregate the neighborhood stream when it has already been
        // refined; otherwise the association columns stay null.
        let neighborhoods_table = TableCatalog::silver(EntityKind::Neighborhood);
        let enriched = if self.engine.table_exists(neighborhoods_table)? {
            let mappings = Relation::table(neighborhoods_table)?
                .filter("wikipedia_page_id IS NOT NULL")
                .aggregate(NEIGHBORHOOD_AGGREGATE, "wikipedia_page_id")
                .alias("nm")?;
            transformed.join_project(
                &mappings,
                "w.page_id = nm.page_id",
                JoinKind::Left,
                "w.*, nm.neighborhood_ids, nm.neighborhood_names, nm.primary_neighborhood_name",
            )
        } else {
            warn!("silver_neighborhoods missing; wikipedia rows get null associations");
            transformed.project(
                "*, CAST(NULL AS VARCHAR[]) AS neighborhood_ids, \
                 CAST(NULL AS VARCHAR[]) AS neighborhood_names, \
                 CAST(NULL AS VARCHAR) AS primary_neighborhood_name",
            )
        };

        materialize_with_embeddings(
            self.engine,
            self.embedder,
            enriched,
            output_table,
            EntityKind::Wikipedia,
            IdColumn::BigInt("page_id"),
            Some(DEDUP_WINDOW),
        )
        .await?;

        check_non_null(self.engine, output_table, "page_id")?;
        check_state_codes(self.engine, output_table, "state")?;

        let output_count = self.engine.count_records(output_table)?;
        info!(
            input = input_count,
            output = output_count,
            dropped = input_count - output_count,
            "wikipedia silver transformation complete"
        );

        Ok(SilverMetadata::new(
            input_table,
            output_table,
            input_count,
            output_count,
            EntityKind::Wikipedia,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bronze::NeighborhoodBronzeIngester;
    use crate::silver::NeighborhoodSilverTransformer;
    use crate::tests_support::{
        seed_bronze_wikipedia, seed_silver_locations, settings_with_sources,
        write_neighborhoods_fixture,
    };

    async fn engine_with_neighborhoods() -> EngineConnection {
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
        seed_bronze_wikipedia(&engine);
        engine
    }

    #[tokio::test]
    async fn dedup_keeps_the_highest_quality_crawl() {
        let engine = engine_with_neighborhoods().await;
        let metadata = WikipediaSilverTransformer::new(&engine, None)
            .transform("bronze_wikipedia", "silver_wikipedia")
            .await
            .unwrap();
        // 4 bronze rows, one duplicated pageid collapses to one.
        assert_eq!(metadata.input_count(), 4);
        assert_eq!(metadata.output_count(), 3);
        assert_eq!(metadata.dropped_count(), 1);

        // The surviving 9001 row is the high-relevance crawl.
        let relevance = engine
            .with_connection(|conn| {
                conn.query_row(
                    "SELECT relevance_score FROM silver_wikipedia WHERE page_id = 9001",
                    [],
                    |row| row.get::<_, f64>(0),
                )
            })
            .unwrap();
        assert!((relevance - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn states_become_two_letter_codes() {
        let engine = engine_with_neighborhoods().await;
        WikipediaSilverTransformer::new(&engine, None)
            .transform("bronze_wikipedia", "silver_wikipedia")
            .await
            .unwrap();
        let states: i64 = engine
            .query_i64(
                "SELECT COUNT(*) FROM silver_wikipedia WHERE state IN ('CA', 'UT')",
            )
            .unwrap();
        assert_eq!(states, 3);
    }

    #[tokio::test]
    async fn neighborhood_aggregation_attaches_sorted_associations() {
        let engine = engine_with_neighborhoods().await;
        WikipediaSilverTransformer::new(&engine, None)
            .transform("bronze_wikipedia", "silver_wikipedia")
            .await
            .unwrap();

        // Fixture: nb-0 and nb-1 both point at page 9001.
        let count = engine
            .query_i64(
                "SELECT len(neighborhood_ids) FROM silver_wikipedia WHERE page_id = 9001",
            )
            .unwrap();
        assert_eq!(count, 2);
        let primary = engine
            .with_connection(|conn| {
                conn.query_row(
                    "SELECT primary_neighborhood_name FROM silver_wikipedia WHERE page_id = 9001",
                    [],
                    |row| row.get::<_, String>(0),
                )
            })
            .unwrap();
        // FIRST(name ORDER BY neighborhood_id): nb-0 is Noe Valley.
        assert_eq!(primary, "Noe Valley");
    }

    #[tokio::test]
    async fn unassociated_articles_get_null_not_empty() {
        let engine = engine_with_neighborhoods().await;
        WikipediaSilverTransformer::new(&engine, None)
            .transform("bronze_wikipedia", "silver_wikipedia")
            .await
            .unwrap();
        let unassociated = engine
            .query_i64(
                "SELECT COUNT(*) FROM silver_wikipedia \
                 WHERE page_id = 9003 AND neighborhood_ids IS NULL",
            )
            .unwrap();
        assert_eq!(unassociated, 1);
    }

    #[tokio::test]
    async fn works_without_silver_neighborhoods() {
        let engine = EngineConnection::in_memory().unwrap();
        seed_bronze_wikipedia(&engine);
        let metadata = WikipediaSilverTransformer::new(&engine, None)
            .transform("bronze_wikipedia", "silver_wikipedia")
            .await
            .unwrap();
        assert_eq!(metadata.output_count(), 3);
        let with_assoc = engine
            .query_i64("SELECT COUNT(*) FROM silver_wikipedia WHERE neighborhood_ids IS NOT NULL")
            .unwrap();
        assert_eq!(with_assoc, 0);
    }

    #[tokio::test]
    async fn embedding_text_is_title_pipe_extract() {
        let engine = engine_with_neighborhoods().await;
        WikipediaSilverTransformer::new(&engine, None)
            .transform("bronze_wikipedia", "silver_wikipedia")
            .await
            .unwrap();
        let text = engine
            .with_connection(|conn| {
                conn.query_row(
                    "SELECT embedding_text FROM silver_wikipedia WHERE page_id = 9002",
                    [],
                    |row| row.get::<_, String>(0),
                )
            })
            .unwrap();
        assert_eq!(
            text,
            "Sugar House, Salt Lake City | Sugar House is a neighborhood in Salt Lake City."
        );
    }
}
