//! Neo4j writer.
//!
//! Constraints and indexes (uniqueness per label, vector indexes at the
//! pipeline's canonical dimension with cosine similarity) are created
//! idempotently before any write. Node tables go through the parameterized
//! bulk `UNWIND … MERGE … SET` pattern; relationship tables use
//! two-`MATCH`-plus-`MERGE` keyed on `graph_node_id`. Writers are
//! entity-specific: every label and key below is spelled out, nothing
//! reflects over record shapes.

use std::time::Instant;

use neo4rs::{BoltList, BoltMap, BoltNull, BoltType, ConfigBuilder, Graph, query};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use roofline_core::catalog::graph as graph_tables;
use roofline_core::config::Neo4jSettings;
use roofline_engine::EngineConnection;

use crate::error::{Result, SinkError};
use crate::retry::{RetryPolicy, retry_async};

/// Rows per UNWIND call.
const WRITE_BATCH_SIZE: usize = 1000;

/// Vector index dimension; must match the Silver embedding contract.
pub const VECTOR_INDEX_DIMENSION: usize = 1024;

/// One node table's write outcome.
#[derive(Debug, Clone, Serialize)]
pub struct NodeWriteStats {
    pub label: String,
    pub table: String,
    pub records: u64,
}

/// One relationship table's write outcome.
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipWriteStats {
    pub relationship_type: String,
    pub table: String,
    pub records: u64,
}

/// Outcome of a full graph export.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphWriteStats {
    pub constraints_created: Vec<String>,
    pub node_results: Vec<NodeWriteStats>,
    pub relationship_results: Vec<RelationshipWriteStats>,
    pub total_nodes: u64,
    pub total_relationships: u64,
    pub duration_seconds: f64,
}

/// Static node-table registry: (table, label, key property).
const NODE_SPECS: [(&str, &str, &str); 10] = [
    (graph_tables::PROPERTY_NODES, "Property", "listing_id"),
    (graph_tables::NEIGHBORHOOD_NODES, "Neighborhood", "neighborhood_id"),
    (graph_tables::WIKIPEDIA_NODES, "WikipediaArticle", "page_id"),
    (graph_tables::FEATURE_NODES, "Feature", "feature_id"),
    (graph_tables::PROPERTY_TYPE_NODES, "PropertyType", "type_id"),
    (graph_tables::PRICE_RANGE_NODES, "PriceRange", "range_id"),
    (graph_tables::CITY_NODES, "City", "city_id"),
    (graph_tables::STATE_NODES, "State", "state_id"),
    (graph_tables::COUNTY_NODES, "County", "county_id"),
    (graph_tables::ZIP_CODE_NODES, "ZipCode", "zip_code"),
];

/// Static relationship-table registry: (table, type, carries weight).
const RELATIONSHIP_SPECS: [(&str, &str, bool); 9] = [
    (graph_tables::REL_LOCATED_IN, "LOCATED_IN", true),
    (graph_tables::REL_HAS_FEATURE, "HAS_FEATURE", false),
    (graph_tables::REL_IN_CITY, "IN_CITY", false),
    (graph_tables::REL_IN_STATE, "IN_STATE", false),
    (graph_tables::REL_IN_ZIP_CODE, "IN_ZIP_CODE", false),
    (graph_tables::REL_TYPE_OF, "TYPE_OF", false),
    (graph_tables::REL_IN_PRICE_RANGE, "IN_PRICE_RANGE", false),
    (graph_tables::REL_SIMILAR_TO, "SIMILAR_TO", true),
    (graph_tables::REL_GEOGRAPHIC_HIERARCHY, "GEOGRAPHIC_HIERARCHY", false),
];

/// Convert an engine JSON value to a Bolt parameter value.
fn json_to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => (*b).into(),
        Value::Number(n) => n
            .as_i64()
            .map_or_else(|| n.as_f64().unwrap_or(0.0).into(), Into::into),
        Value::String(s) => s.clone().into(),
        Value::Array(items) => {
            let mut list = BoltList::new();
            for item in items {
                list.push(json_to_bolt(item));
            }
            BoltType::List(list)
        }
        Value::Object(map) => {
            let mut bolt_map = BoltMap::new();
            for (key, item) in map {
                bolt_map.put(key.clone().into(), json_to_bolt(item));
            }
            BoltType::Map(bolt_map)
        }
    }
}

/// Rows as a Bolt list of maps for `$rows`.
fn rows_to_bolt(rows: &[serde_json::Map<String, Value>]) -> BoltType {
    let mut list = BoltList::new();
    for row in rows {
        let mut map = BoltMap::new();
        for (key, value) in row {
            map.put(key.clone().into(), json_to_bolt(value));
        }
        list.push(BoltType::Map(map));
    }
    BoltType::List(list)
}

/// Writes Gold graph tables to Neo4j over Bolt.
pub struct GraphWriter {
    engine: EngineConnection,
    graph: Graph,
}

impl GraphWriter {
    /// Connect with settings; the password comes from `NEO4J_PASSWORD`.
    pub async fn connect(engine: EngineConnection, settings: &Neo4jSettings) -> Result<Self> {
        let password = Neo4jSettings::password()
            .ok_or_else(|| SinkError::GraphConfig("NEO4J_PASSWORD is not set".to_string()))?;
        let config = ConfigBuilder::default()
            .uri(&settings.uri)
            .user(&settings.username)
            .password(password)
            .db(settings.database.as_str())
            .build()?;
        let graph = Graph::connect(config).await?;
        info!(uri = %settings.uri, "graph database connected");
        Ok(Self { engine, graph })
    }

    /// Create uniqueness constraints, lookup indexes, and vector indexes.
    ///
    /// All statements use `IF NOT EXISTS`; re-runs are no-ops. Vector index
    /// failures are logged and skipped so older server versions still work.
    pub async fn create_constraints(&self) -> Result<Vec<String>> {
        let constraints = [
            ("property_id", "CREATE CONSTRAINT property_id IF NOT EXISTS FOR (p:Property) REQUIRE p.listing_id IS UNIQUE"),
            ("neighborhood_id", "CREATE CONSTRAINT neighborhood_id IF NOT EXISTS FOR (n:Neighborhood) REQUIRE n.neighborhood_id IS UNIQUE"),
            ("wikipedia_id", "CREATE CONSTRAINT wikipedia_id IF NOT EXISTS FOR (w:WikipediaArticle) REQUIRE w.page_id IS UNIQUE"),
            ("feature_id", "CREATE CONSTRAINT feature_id IF NOT EXISTS FOR (f:Feature) REQUIRE f.feature_id IS UNIQUE"),
            ("property_type_id", "CREATE CONSTRAINT property_type_id IF NOT EXISTS FOR (pt:PropertyType) REQUIRE pt.type_id IS UNIQUE"),
            ("price_range_id", "CREATE CONSTRAINT price_range_id IF NOT EXISTS FOR (pr:PriceRange) REQUIRE pr.range_id IS UNIQUE"),
            ("city_id", "CREATE CONSTRAINT city_id IF NOT EXISTS FOR (c:City) REQUIRE c.city_id IS UNIQUE"),
            ("state_id", "CREATE CONSTRAINT state_id IF NOT EXISTS FOR (s:State) REQUIRE s.state_id IS UNIQUE"),
            ("county_id", "CREATE CONSTRAINT county_id IF NOT EXISTS FOR (c:County) REQUIRE c.county_id IS UNIQUE"),
            ("zip_code_id", "CREATE CONSTRAINT zip_code_id IF NOT EXISTS FOR (z:ZipCode) REQUIRE z.zip_code IS UNIQUE"),
        ];

        let indexes = [
            ("property_price", "CREATE INDEX property_price IF NOT EXISTS FOR (p:Property) ON (p.price)"),
            ("property_type", "CREATE INDEX property_type IF NOT EXISTS FOR (p:Property) ON (p.property_type)"),
            ("property_bedrooms", "CREATE INDEX property_bedrooms IF NOT EXISTS FOR (p:Property) ON (p.bedrooms)"),
            ("neighborhood_city", "CREATE INDEX neighborhood_city IF NOT EXISTS FOR (n:Neighborhood) ON (n.city)"),
            ("neighborhood_state", "CREATE INDEX neighborhood_state IF NOT EXISTS FOR (n:Neighborhood) ON (n.state)"),
        ];

        let vector_index = |name: &str, pattern: &str, variable: &str| {
            format!(
                "CREATE VECTOR INDEX {name} IF NOT EXISTS FOR {pattern} ON {variable}.embedding \
                 OPTIONS {{indexConfig: {{`vector.dimensions`: {VECTOR_INDEX_DIMENSION}, \
                 `vector.similarity_function`: 'cosine'}}}}"
            )
        };
        let vector_indexes = [
            ("property_embedding", vector_index("property_embedding", "(p:Property)", "p")),
            ("neighborhood_embedding", vector_index("neighborhood_embedding", "(n:Neighborhood)", "n")),
            ("wikipedia_embedding", vector_index("wikipedia_embedding", "(w:WikipediaArticle)", "w")),
        ];

        let mut created = Vec::new();
        for (name, statement) in constraints {
            self.graph.run(query(statement)).await?;
            created.push(name.to_string());
            debug!(constraint = name, "constraint ensured");
        }
        for (name, statement) in indexes {
            self.graph.run(query(statement)).await?;
            debug!(index = name, "index ensured");
        }
        for (name, statement) in &vector_indexes {
            if let Err(e) = self.graph.run(query(statement)).await {
                warn!(index = name, error = %e, "vector index unsupported, skipping");
            } else {
                debug!(index = name, "vector index ensured");
            }
        }
        Ok(created)
    }

    /// Write every existing node table.
    pub async fn write_nodes(&self) -> Result<Vec<NodeWriteStats>> {
        let mut results = Vec::new();
        for (table, label, key) in NODE_SPECS {
            if !self.engine.table_exists(table)? {
                debug!(table, "node table missing, skipping");
                continue;
            }
            results.push(self.write_node_table(table, label, key).await?);
        }
        Ok(results)
    }

    async fn write_node_table(
        &self,
        table: &str,
        label: &str,
        key: &str,
    ) -> Result<NodeWriteStats> {
        let rows = self
            .engine
            .query_json(&format!("SELECT * FROM {table}"))?;
        let cypher = format!(
            "UNWIND $rows AS r MERGE (n:{label} {{{key}: r.{key}}}) SET n = r"
        );
        let mut records = 0u64;
        for batch in rows.chunks(WRITE_BATCH_SIZE) {
            retry_async(RetryPolicy::default(), table, || async {
                self.graph
                    .run(query(&cypher).param("rows", rows_to_bolt(batch)))
                    .await
                    .map_err(SinkError::from)
            })
            .await?;
            records += batch.len() as u64;
        }
        info!(label, table, records, "wrote nodes");
        Ok(NodeWriteStats {
            label: label.to_string(),
            table: table.to_string(),
            records,
        })
    }

    /// Write every existing relationship table.
    pub async fn write_relationships(&self) -> Result<Vec<RelationshipWriteStats>> {
        let mut results = Vec::new();
        for (table, rel_type, has_weight) in RELATIONSHIP_SPECS {
            if !self.engine.table_exists(table)? {
                debug!(table, "relationship table missing, skipping");
                continue;
            }
            results
                .push(self.write_relationship_table(table, rel_type, has_weight).await?);
        }
        Ok(results)
    }

    async fn write_relationship_table(
        &self,
        table: &str,
        rel_type: &str,
        has_weight: bool,
    ) -> Result<RelationshipWriteStats> {
        let rows = self
            .engine
            .query_json(&format!("SELECT * FROM {table}"))?;
        let weight_clause = if has_weight {
            " SET rel.weight = r.weight"
        } else {
            ""
        };
        let cypher = format!(
            "UNWIND $rows AS r \
             MATCH (a {{graph_node_id: r.from_id}}) \
             MATCH (b {{graph_node_id: r.to_id}}) \
             MERGE (a)-[rel:{rel_type}]->(b){weight_clause}"
        );
        let mut records = 0u64;
        for batch in rows.chunks(WRITE_BATCH_SIZE) {
            retry_async(RetryPolicy::default(), table, || async {
                self.graph
                    .run(query(&cypher).param("rows", rows_to_bolt(batch)))
                    .await
                    .map_err(SinkError::from)
            })
            .await?;
            records += batch.len() as u64;
        }
        info!(rel_type, table, records, "wrote relationships");
        Ok(RelationshipWriteStats {
            relationship_type: rel_type.to_string(),
            table: table.to_string(),
            records,
        })
    }

    /// Constraints, nodes, then relationships.
    pub async fn write_all(&self) -> Result<GraphWriteStats> {
        let started = Instant::now();
        let mut stats = GraphWriteStats {
            constraints_created: self.create_constraints().await?,
            ..GraphWriteStats::default()
        };
        stats.node_results = self.write_nodes().await?;
        stats.relationship_results = self.write_relationships().await?;
        stats.total_nodes = stats.node_results.iter().map(|r| r.records).sum();
        stats.total_relationships = stats.relationship_results.iter().map(|r| r.records).sum();
        stats.duration_seconds = started.elapsed().as_secs_f64();
        info!(
            nodes = stats.total_nodes,
            relationships = stats.total_relationships,
            "graph export complete"
        );
        Ok(stats)
    }
}
