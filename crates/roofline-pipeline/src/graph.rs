//! Graph builder: materializes node and relationship tables from Gold for
//! the graph sink.
//!
//! Everything here is SQL over Gold (plus the Silver extraction tables);
//! nothing leaves the engine. Node rows are flat (the Bolt writer sets
//! `n = row`), edge rows are `{from_id, to_id, relationship_type, weight?}`
//! keyed on namespaced `graph_node_id` values.

use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use roofline_core::catalog::{extraction, graph};
use roofline_engine::EngineConnection;

use crate::error::Result;

/// Cosine similarity threshold for SIMILAR_TO edges.
const SIMILARITY_THRESHOLD: f64 = 0.85;
/// Cap on emitted SIMILAR_TO pairs, best first.
const SIMILARITY_EDGE_LIMIT: u64 = 10_000;

/// Slug fragment matching the Silver extraction tables.
fn slug_sql(expr: &str) -> String {
    format!("REGEXP_REPLACE(LOWER(TRIM({expr})), '[^a-z0-9]+', '_', 'g')")
}

/// Summary of a graph build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphBuildSummary {
    pub node_tables: Vec<String>,
    pub relationship_tables: Vec<String>,
    pub total_nodes: u64,
    pub total_relationships: u64,
    pub build_seconds: f64,
}

/// Builds `gold_graph_*` tables.
pub struct GraphBuilder<'a> {
    engine: &'a EngineConnection,
}

impl<'a> GraphBuilder<'a> {
    #[must_use]
    pub const fn new(engine: &'a EngineConnection) -> Self {
        Self { engine }
    }

    fn rebuild(&self, table: &str, select_sql: &str) -> Result<u64> {
        self.engine.drop_table(table)?;
        self.engine
            .execute_batch(&format!("CREATE TABLE {table} AS {select_sql}"))?;
        let count = self.engine.count_records(table)?;
        info!(table, count, "graph table created");
        Ok(count)
    }

    // -- Node tables ---------------------------------------------------------

    fn build_property_nodes(&self) -> Result<u64> {
        self.rebuild(
            graph::PROPERTY_NODES,
            "SELECT \
                 listing_id, \
                 neighborhood_id, \
                 bedrooms, bathrooms, square_feet, property_type, year_built, lot_size, \
                 price, price_per_sqft, \
                 address.street AS street_address, \
                 address.city AS city, \
                 address.state AS state, \
                 address.zip_code AS zip_code, \
                 address.location[1] AS longitude, \
                 address.location[2] AS latitude, \
                 description, features, virtual_tour_url, images, \
                 listing_date, days_on_market, \
                 embedding_vector AS embedding, \
                 'Property' AS node_label, \
                 'property:' || listing_id AS graph_node_id \
             FROM gold_properties WHERE listing_id IS NOT NULL",
        )
    }

    fn build_neighborhood_nodes(&self) -> Result<u64> {
        self.rebuild(
            graph::NEIGHBORHOOD_NODES,
            "SELECT \
                 neighborhood_id, name, city, state, county, population, \
                 walkability_score, school_rating, \
                 overall_livability_score, investment_attractiveness_score, \
                 density_category, lifestyle_category, description, \
                 center_latitude AS latitude, center_longitude AS longitude, \
                 embedding_vector AS embedding, \
                 'Neighborhood' AS node_label, \
                 'neighborhood:' || neighborhood_id AS graph_node_id \
             FROM gold_neighborhoods WHERE neighborhood_id IS NOT NULL",
        )
    }

    fn build_wikipedia_nodes(&self) -> Result<u64> {
        self.rebuild(
            graph::WIKIPEDIA_NODES,
            "SELECT \
                 page_id, title, url, short_summary, long_summary, categories, \
                 key_topics, article_quality, article_quality_score, search_ranking_score, \
                 embedding_vector AS embedding, \
                 'WikipediaArticle' AS node_label, \
                 'wikipedia:' || page_id AS graph_node_id \
             FROM gold_wikipedia WHERE page_id IS NOT NULL",
        )
    }

    fn build_classification_nodes(&self) -> Result<u64> {
        let mut total = 0;
        total += self.rebuild(
            graph::FEATURE_NODES,
            &format!(
                "SELECT feature_id, feature_name, occurrence_count, \
                        'Feature' AS node_label, \
                        'feature:' || feature_id AS graph_node_id \
                 FROM {}",
                extraction::FEATURES
            ),
        )?;
        total += self.rebuild(
            graph::PROPERTY_TYPE_NODES,
            &format!(
                "SELECT type_id, type_name, property_count, \
                        'PropertyType' AS node_label, \
                        'property_type:' || type_id AS graph_node_id \
                 FROM {}",
                extraction::PROPERTY_TYPES
            ),
        )?;
        total += self.rebuild(
            graph::PRICE_RANGE_NODES,
            &format!(
                "SELECT range_id, range_label, min_price, max_price, property_count, \
                        'PriceRange' AS node_label, \
                        'price_range:' || range_id AS graph_node_id \
                 FROM {}",
                extraction::PRICE_RANGES
            ),
        )?;
        Ok(total)
    }

    fn build_geographic_nodes(&self) -> Result<u64> {
        let mut total = 0;
        total += self.rebuild(
            graph::CITY_NODES,
            &format!(
                "SELECT DISTINCT city_id, name, state, \
                        'City' AS node_label, \
                        'city:' || city_id AS graph_node_id \
                 FROM {}",
                extraction::CITIES
            ),
        )?;
        total += self.rebuild(
            graph::STATE_NODES,
            &format!(
                "SELECT DISTINCT state_id, abbreviation, \
                        'State' AS node_label, \
                        'state:' || state_id AS graph_node_id \
                 FROM {}",
                extraction::STATES
            ),
        )?;
        total += self.rebuild(
            graph::ZIP_CODE_NODES,
            &format!(
                "SELECT DISTINCT zip_code, city_normalized, state_normalized, \
                        'ZipCode' AS node_label, \
                        'zip_code:' || zip_code AS graph_node_id \
                 FROM {}",
                extraction::ZIP_CODES
            ),
        )?;
        if self.engine.table_exists("gold_locations")? {
            total += self.rebuild(
                graph::COUNTY_NODES,
                "SELECT DISTINCT county_id, county AS name, state, \
                        'County' AS node_label, \
                        'county:' || county_id AS graph_node_id \
                 FROM gold_locations WHERE county_id IS NOT NULL",
            )?;
        }
        Ok(total)
    }

    // -- Relationship tables -------------------------------------------------

    fn build_located_in(&self) -> Result<u64> {
        self.rebuild(
            graph::REL_LOCATED_IN,
            "SELECT \
                 'property:' || listing_id AS from_id, \
                 'neighborhood:' || neighborhood_id AS to_id, \
                 'LOCATED_IN' AS relationship_type, \
                 1.0 AS weight \
             FROM gold_properties WHERE neighborhood_id IS NOT NULL",
        )
    }

    fn build_has_feature(&self) -> Result<u64> {
        let feature_slug = slug_sql("feature");
        self.rebuild(
            graph::REL_HAS_FEATURE,
            &format!(
                "WITH feature_list AS ( \
                     SELECT listing_id, UNNEST(features) AS feature \
                     FROM gold_properties \
                     WHERE features IS NOT NULL AND LEN(features) > 0) \
                 SELECT DISTINCT \
                     'property:' || listing_id AS from_id, \
                     'feature:' || {feature_slug} AS to_id, \
                     'HAS_FEATURE' AS relationship_type \
                 FROM feature_list"
            ),
        )
    }

    fn build_geographic_relationships(&self) -> Result<u64> {
        let mut total = 0;
        let city_slug = slug_sql("city_normalized");
        total += self.rebuild(
            graph::REL_IN_CITY,
            &format!(
                "SELECT DISTINCT \
                     'property:' || listing_id AS from_id, \
                     'city:' || {city_slug} || '_' || LOWER(state_normalized) AS to_id, \
                     'IN_CITY' AS relationship_type \
                 FROM silver_properties \
                 WHERE city_normalized IS NOT NULL AND state_normalized IS NOT NULL"
            ),
        )?;
        total += self.rebuild(
            graph::REL_IN_STATE,
            &format!(
                "SELECT DISTINCT \
                     'city:' || city_id AS from_id, \
                     'state:' || state AS to_id, \
                     'IN_STATE' AS relationship_type \
                 FROM {}",
                extraction::CITIES
            ),
        )?;
        total += self.rebuild(
            graph::REL_IN_ZIP_CODE,
            "SELECT DISTINCT \
                 'property:' || listing_id AS from_id, \
                 'zip_code:' || zip_code_clean AS to_id, \
                 'IN_ZIP_CODE' AS relationship_type \
             FROM silver_properties WHERE zip_code_clean IS NOT NULL",
        )?;
        Ok(total)
    }

    fn build_classification_relationships(&self) -> Result<u64> {
        let mut total = 0;
        let type_slug = slug_sql("property_type");
        total += self.rebuild(
            graph::REL_TYPE_OF,
            &format!(
                "SELECT DISTINCT \
                     'property:' || listing_id AS from_id, \
                     'property_type:' || {type_slug} AS to_id, \
                     'TYPE_OF' AS relationship_type \
                 FROM gold_properties WHERE property_type IS NOT NULL"
            ),
        )?;
        total += self.rebuild(
            graph::REL_IN_PRICE_RANGE,
            "SELECT DISTINCT \
                 'property:' || listing_id AS from_id, \
                 'price_range:' || price_range_category AS to_id, \
                 'IN_PRICE_RANGE' AS relationship_type \
             FROM silver_properties WHERE price_range_category IS NOT NULL",
        )?;
        Ok(total)
    }

    /// SIMILAR_TO edges via a cosine-similarity self-join on the embedding
    /// vectors, computed entirely in SQL. Skipped with a warning when no
    /// embeddings exist.
    fn build_similarity_relationships(&self) -> Result<Option<u64>> {
        if !self.engine.column_exists(graph::PROPERTY_NODES, "embedding")? {
            warn!("no embedding column on property nodes; skipping SIMILAR_TO");
            return Ok(None);
        }
        let with_embeddings = self.engine.query_i64(&format!(
            "SELECT COUNT(*) FROM {} WHERE embedding IS NOT NULL",
            graph::PROPERTY_NODES
        ))?;
        if with_embeddings == 0 {
            warn!("no embeddings found; skipping SIMILAR_TO");
            return Ok(None);
        }

        let count = self.rebuild(
            graph::REL_SIMILAR_TO,
            &format!(
                "WITH similarity_scores AS ( \
                     SELECT \
                         p1.listing_id AS id1, \
                         p2.listing_id AS id2, \
                         list_dot_product(p1.embedding, p2.embedding) / \
                         (sqrt(list_sum(list_transform(p1.embedding, x -> x * x))) * \
                          sqrt(list_sum(list_transform(p2.embedding, x -> x * x)))) AS similarity \
                     FROM {nodes} p1 \
                     CROSS JOIN {nodes} p2 \
                     WHERE p1.listing_id < p2.listing_id \
                       AND p1.embedding IS NOT NULL \
                       AND p2.embedding IS NOT NULL \
                       AND LEN(p1.embedding) > 0 \
                       AND LEN(p2.embedding) > 0) \
                 SELECT \
                     'property:' || id1 AS from_id, \
                     'property:' || id2 AS to_id, \
                     'SIMILAR_TO' AS relationship_type, \
                     similarity AS weight \
                 FROM similarity_scores \
                 WHERE similarity > {SIMILARITY_THRESHOLD} \
                 ORDER BY similarity DESC \
                 LIMIT {SIMILARITY_EDGE_LIMIT}",
                nodes = graph::PROPERTY_NODES
            ),
        )?;
        Ok(Some(count))
    }

    fn build_hierarchy_relationships(&self) -> Result<u64> {
        self.rebuild(
            graph::REL_GEOGRAPHIC_HIERARCHY,
            "SELECT DISTINCT \
                 graph_node_id AS from_id, \
                 CASE location_type \
                     WHEN 'neighborhood' THEN 'city:' || parent_location_id \
                     WHEN 'city' THEN 'county:' || parent_location_id \
                     WHEN 'county' THEN 'state:' || parent_location_id \
                 END AS to_id, \
                 'GEOGRAPHIC_HIERARCHY' AS relationship_type \
             FROM gold_locations \
             WHERE graph_node_id IS NOT NULL AND parent_location_id IS NOT NULL",
        )
    }

    /// Build every node and relationship table whose sources exist.
    pub fn build_all(&self) -> Result<GraphBuildSummary> {
        let started = Instant::now();
        let mut summary = GraphBuildSummary::default();

        info!("building graph node tables");
        if self.engine.table_exists("gold_properties")? {
            summary.total_nodes += self.build_property_nodes()?;
            summary.node_tables.push(graph::PROPERTY_NODES.to_string());
        }
        if self.engine.table_exists("gold_neighborhoods")? {
            summary.total_nodes += self.build_neighborhood_nodes()?;
            summary.node_tables.push(graph::NEIGHBORHOOD_NODES.to_string());
        }
        if self.engine.table_exists("gold_wikipedia")? {
            summary.total_nodes += self.build_wikipedia_nodes()?;
            summary.node_tables.push(graph::WIKIPEDIA_NODES.to_string());
        }
        if self.engine.table_exists(extraction::FEATURES)? {
            summary.total_nodes += self.build_classification_nodes()?;
            summary.node_tables.extend([
                graph::FEATURE_NODES.to_string(),
                graph::PROPERTY_TYPE_NODES.to_string(),
                graph::PRICE_RANGE_NODES.to_string(),
            ]);
        }
        if self.engine.table_exists(extraction::CITIES)? {
            summary.total_nodes += self.build_geographic_nodes()?;
            summary.node_tables.extend([
                graph::CITY_NODES.to_string(),
                graph::STATE_NODES.to_string(),
                graph::ZIP_CODE_NODES.to_string(),
            ]);
            if self.engine.table_exists(graph::COUNTY_NODES)? {
                summary.node_tables.push(graph::COUNTY_NODES.to_string());
            }
        }

        info!("building graph relationship tables");
        if self.engine.table_exists("gold_properties")? {
            summary.total_relationships += self.build_located_in()?;
            summary.relationship_tables.push(graph::REL_LOCATED_IN.to_string());
            summary.total_relationships += self.build_has_feature()?;
            summary.relationship_tables.push(graph::REL_HAS_FEATURE.to_string());
            if self.engine.column_exists("silver_properties", "city_normalized")? {
                summary.total_relationships += self.build_geographic_relationships()?;
                summary.relationship_tables.extend([
                    graph::REL_IN_CITY.to_string(),
                    graph::REL_IN_STATE.to_string(),
                    graph::REL_IN_ZIP_CODE.to_string(),
                ]);
                summary.total_relationships += self.build_classification_relationships()?;
                summary.relationship_tables.extend([
                    graph::REL_TYPE_OF.to_string(),
                    graph::REL_IN_PRICE_RANGE.to_string(),
                ]);
            }
            if let Some(count) = self.build_similarity_relationships()? {
                summary.total_relationships += count;
                summary.relationship_tables.push(graph::REL_SIMILAR_TO.to_string());
            }
        }
        if self.engine.table_exists("gold_locations")? {
            summary.total_relationships += self.build_hierarchy_relationships()?;
            summary
                .relationship_tables
                .push(graph::REL_GEOGRAPHIC_HIERARCHY.to_string());
        }

        summary.build_seconds = started.elapsed().as_secs_f64();
        info!(
            nodes = summary.total_nodes,
            relationships = summary.total_relationships,
            seconds = summary.build_seconds,
            "graph build complete"
        );
        Ok(summary)
    }
}
