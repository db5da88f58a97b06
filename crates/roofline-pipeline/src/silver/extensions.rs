//! Graph-specific Silver extensions.
//!
//! Additive only: the entity tables are recreated with graph columns
//! (`graph_node_id`, normalized geography, price bands) and the extraction
//! tables that feed the graph builder are materialized. Node identifiers
//! are slugged so every `graph_node_id` stays in the
//! `<label>:<alnum-and-underscore>` form the graph sink matches on.

use serde::Serialize;
use tracing::info;

use roofline_core::catalog::extraction;
use roofline_engine::{EngineConnection, safe_identifier};

use crate::error::Result;

/// Slug fragment: lowercase, runs of non-alphanumerics collapsed to `_`.
fn slug_sql(expr: &str) -> String {
    format!("REGEXP_REPLACE(LOWER(TRIM({expr})), '[^a-z0-9]+', '_', 'g')")
}

/// Price band used for both the extraction table and the IN_PRICE_RANGE
/// relationship.
const PRICE_RANGE_CASE: &str = "\
    CASE WHEN price < 250000 THEN 'under_250k'\n\
         WHEN price < 500000 THEN '250k_500k'\n\
         WHEN price < 750000 THEN '500k_750k'\n\
         WHEN price < 1000000 THEN '750k_1m'\n\
         WHEN price < 2000000 THEN '1m_2m'\n\
         ELSE 'over_2m' END";

const PRICE_RANGE_LABEL_CASE: &str = "\
    CASE WHEN price < 250000 THEN 'Under $250K'\n\
         WHEN price < 500000 THEN '$250K-$500K'\n\
         WHEN price < 750000 THEN '$500K-$750K'\n\
         WHEN price < 1000000 THEN '$750K-$1M'\n\
         WHEN price < 2000000 THEN '$1M-$2M'\n\
         ELSE 'Over $2M' END";

/// City abbreviations the listing feeds use.
const CITY_NORMALIZED_CASE: &str = "\
    CASE WHEN UPPER({city}) = 'SF' THEN 'San Francisco'\n\
         WHEN UPPER({city}) = 'LA' THEN 'Los Angeles'\n\
         WHEN UPPER({city}) = 'NYC' THEN 'New York'\n\
         ELSE {city} END";

/// Summary of applied extensions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphExtensionSummary {
    pub properties_extended: bool,
    pub neighborhoods_extended: bool,
    pub wikipedia_extended: bool,
    pub extraction_tables: Vec<String>,
}

/// Applies graph extensions to the Silver layer.
pub struct SilverGraphExtensions<'a> {
    engine: &'a EngineConnection,
}

impl<'a> SilverGraphExtensions<'a> {
    #[must_use]
    pub const fn new(engine: &'a EngineConnection) -> Self {
        Self { engine }
    }

    /// Recreate `table` with extra computed columns appended.
    fn extend_table(&self, table: &str, column_exprs: &[String]) -> Result<()> {
        let table = safe_identifier(table)?;
        let temp = format!("{table}_graph_ext");
        self.engine.drop_table(&temp)?;
        self.engine.execute_batch(&format!(
            "CREATE TABLE {temp} AS SELECT *, {} FROM {table}",
            column_exprs.join(", ")
        ))?;
        self.engine.drop_table(table)?;
        self.engine
            .execute_batch(&format!("ALTER TABLE {temp} RENAME TO {table}"))?;
        Ok(())
    }

    /// Add `graph_node_id`, normalized geography, and the price band to
    /// `silver_properties`.
    pub fn extend_properties(&self, table: &str) -> Result<()> {
        if self.engine.column_exists(table, "graph_node_id")? {
            return Ok(());
        }
        let city_case = CITY_NORMALIZED_CASE.replace("{city}", "address.city");
        let columns = vec![
            "('property:' || listing_id) AS graph_node_id".to_string(),
            format!("({city_case}) AS city_normalized"),
            "UPPER(TRIM(address.state)) AS state_normalized".to_string(),
            "SUBSTRING(address.zip_code, 1, 5) AS zip_code_clean".to_string(),
            format!("({PRICE_RANGE_CASE}) AS price_range_category"),
        ];
        self.extend_table(table, &columns)?;
        info!(table, "property graph columns added");
        Ok(())
    }

    /// Add `graph_node_id` and normalized geography to
    /// `silver_neighborhoods`.
    pub fn extend_neighborhoods(&self, table: &str) -> Result<()> {
        if self.engine.column_exists(table, "graph_node_id")? {
            return Ok(());
        }
        let city_case = CITY_NORMALIZED_CASE.replace("{city}", "city");
        let columns = vec![
            "('neighborhood:' || neighborhood_id) AS graph_node_id".to_string(),
            format!("({city_case}) AS city_normalized"),
            "UPPER(TRIM(state)) AS state_normalized".to_string(),
        ];
        self.extend_table(table, &columns)?;
        info!(table, "neighborhood graph columns added");
        Ok(())
    }

    /// Add `graph_node_id` to `silver_wikipedia`.
    pub fn extend_wikipedia(&self, table: &str) -> Result<()> {
        if self.engine.column_exists(table, "graph_node_id")? {
            return Ok(());
        }
        let columns = vec!["('wikipedia:' || page_id) AS graph_node_id".to_string()];
        self.extend_table(table, &columns)?;
        info!(table, "wikipedia graph columns added");
        Ok(())
    }

    /// Materialize the entity extraction tables the graph builder reads.
    pub fn create_extraction_tables(&self) -> Result<Vec<String>> {
        let feature_slug = slug_sql("feature");
        let city_slug = slug_sql("city_normalized");

        let extractions: Vec<(&str, String)> = vec![
            (
                extraction::FEATURES,
                format!(
                    "CREATE TABLE {} AS \
                     WITH feature_list AS ( \
                         SELECT listing_id, UNNEST(features) AS feature \
                         FROM silver_properties \
                         WHERE features IS NOT NULL AND LEN(features) > 0) \
                     SELECT {feature_slug} AS feature_id, \
                            TRIM(feature) AS feature_name, \
                            COUNT(*) AS occurrence_count \
                     FROM feature_list GROUP BY 1, 2",
                    extraction::FEATURES
                ),
            ),
            (
                extraction::PROPERTY_TYPES,
                format!(
                    "CREATE TABLE {} AS \
                     SELECT {type_slug} AS type_id, \
                            property_type AS type_name, \
                            COUNT(*) AS property_count \
                     FROM silver_properties WHERE property_type IS NOT NULL \
                     GROUP BY 1, 2",
                    extraction::PROPERTY_TYPES,
                    type_slug = slug_sql("property_type"),
                ),
            ),
            (
                extraction::PRICE_RANGES,
                format!(
                    "CREATE TABLE {} AS \
                     SELECT DISTINCT {PRICE_RANGE_CASE} AS range_id, \
                            {PRICE_RANGE_LABEL_CASE} AS range_label, \
                            MIN(price) AS min_price, \
                            MAX(price) AS max_price, \
                            COUNT(*) AS property_count \
                     FROM silver_properties GROUP BY 1, 2",
                    extraction::PRICE_RANGES
                ),
            ),
            (
                extraction::CITIES,
                format!(
                    "CREATE TABLE {} AS \
                     SELECT DISTINCT \
                            {city_slug} || '_' || LOWER(state_normalized) AS city_id, \
                            city_normalized AS name, \
                            state_normalized AS state \
                     FROM silver_properties \
                     WHERE city_normalized IS NOT NULL AND state_normalized IS NOT NULL",
                    extraction::CITIES
                ),
            ),
            (
                extraction::STATES,
                format!(
                    "CREATE TABLE {} AS \
                     SELECT DISTINCT state_normalized AS state_id, \
                            state_normalized AS abbreviation \
                     FROM silver_properties WHERE state_normalized IS NOT NULL",
                    extraction::STATES
                ),
            ),
            (
                extraction::ZIP_CODES,
                format!(
                    "CREATE TABLE {} AS \
                     SELECT DISTINCT zip_code_clean AS zip_code, \
                            city_normalized, state_normalized \
                     FROM silver_properties WHERE zip_code_clean IS NOT NULL",
                    extraction::ZIP_CODES
                ),
            ),
        ];

        let mut created = Vec::new();
        for (table, sql) in extractions {
            self.engine.drop_table(table)?;
            self.engine.execute_batch(&sql)?;
            let count = self.engine.count_records(table)?;
            info!(table, count, "extraction table created");
            created.push(table.to_string());
        }
        Ok(created)
    }

    /// Extend whichever Silver tables exist and build extraction tables.
    pub fn apply_all(&self) -> Result<GraphExtensionSummary> {
        let mut summary = GraphExtensionSummary::default();
        if self.engine.table_exists("silver_properties")? {
            self.extend_properties("silver_properties")?;
            summary.properties_extended = true;
        }
        if self.engine.table_exists("silver_neighborhoods")? {
            self.extend_neighborhoods("silver_neighborhoods")?;
            summary.neighborhoods_extended = true;
        }
        if self.engine.table_exists("silver_wikipedia")? {
            self.extend_wikipedia("silver_wikipedia")?;
            summary.wikipedia_extended = true;
        }
        if summary.properties_extended {
            summary.extraction_tables = self.create_extraction_tables()?;
        }
        info!(
            tables = summary.extraction_tables.len(),
            "graph extensions complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bronze::PropertyBronzeIngester;
    use crate::silver::PropertySilverTransformer;
    use crate::tests_support::{settings_with_sources, write_properties_fixture};

    async fn extended_engine() -> EngineConnection {
        let dir = tempfile::tempdir().unwrap();
        write_properties_fixture(dir.path(), 4);
        let settings = settings_with_sources(dir.path());
        let engine = EngineConnection::in_memory().unwrap();
        PropertyBronzeIngester::new(&settings, &engine)
            .ingest("bronze_properties", None, None)
            .unwrap();
        PropertySilverTransformer::new(&engine, None)
            .transform("bronze_properties", "silver_properties")
            .await
            .unwrap();
        SilverGraphExtensions::new(&engine).apply_all().unwrap();
        engine
    }

    #[tokio::test]
    async fn graph_node_ids_are_namespaced() {
        let engine = extended_engine().await;
        let bad = engine
            .query_i64(
                "SELECT COUNT(*) FROM silver_properties \
                 WHERE NOT regexp_matches(graph_node_id, '^[a-z_]+:[A-Za-z0-9_\\-]+$')",
            )
            .unwrap();
        assert_eq!(bad, 0);
    }

    #[tokio::test]
    async fn price_ranges_band_correctly() {
        let engine = extended_engine().await;
        // Fixture prices: 500k, 600k, 700k, 800k.
        let bands = engine
            .query_i64(
                "SELECT COUNT(DISTINCT price_range_category) FROM silver_properties",
            )
            .unwrap();
        assert_eq!(bands, 2); // 500k_750k and 750k_1m
        let rows = engine.count_records("silver_price_ranges").unwrap();
        assert_eq!(rows, 2);
    }

    #[tokio::test]
    async fn feature_ids_are_slugged() {
        let engine = extended_engine().await;
        let slugged = engine
            .query_i64(
                "SELECT COUNT(*) FROM silver_features WHERE feature_id = 'hardwood_floors'",
            )
            .unwrap();
        assert_eq!(slugged, 1);
        let raw_name = engine
            .with_connection(|conn| {
                conn.query_row(
                    "SELECT feature_name FROM silver_features WHERE feature_id = 'hardwood_floors'",
                    [],
                    |row| row.get::<_, String>(0),
                )
            })
            .unwrap();
        assert_eq!(raw_name, "hardwood floors");
    }

    #[tokio::test]
    async fn cities_and_states_extract_from_properties() {
        let engine = extended_engine().await;
        let city = engine
            .query_i64("SELECT COUNT(*) FROM silver_cities WHERE city_id = 'san_francisco_ca'")
            .unwrap();
        assert_eq!(city, 1);
        let state = engine
            .query_i64("SELECT COUNT(*) FROM silver_states WHERE state_id = 'CA'")
            .unwrap();
        assert_eq!(state, 1);
        let zips = engine.count_records("silver_zip_codes").unwrap();
        assert_eq!(zips, 1);
    }

    #[tokio::test]
    async fn apply_all_is_rerunnable() {
        let engine = extended_engine().await;
        // A second pass must not duplicate columns or fail.
        SilverGraphExtensions::new(&engine).apply_all().unwrap();
        let count = engine.count_records("silver_properties").unwrap();
        assert_eq!(count, 4);
    }
}
