//! Location Gold: canonical geographic entities for graph building.
//!
//! Every row picks its `graph_node_id` from the deepest non-null level
//! (neighborhood > city > county > state) and names its parent for the
//! GEOGRAPHIC_HIERARCHY edges.

use tracing::info;

use roofline_core::catalog::EntityKind;
use roofline_core::metadata::GoldMetadata;
use roofline_engine::{EngineConnection, safe_identifier};

use crate::error::Result;

const ENRICHMENTS: [&str; 3] = [
    "hierarchical_ids",
    "graph_node_ids",
    "parent_relationships",
];

/// Creates the `gold_locations` view.
pub struct LocationGoldEnricher<'a> {
    engine: &'a EngineConnection,
}

impl<'a> LocationGoldEnricher<'a> {
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
                 neighborhood_standardized AS neighborhood, \
                 city_standardized AS city, \
                 county_standardized AS county, \
                 state_standardized AS state, \
                 zip_code, \
                 zip_code_status, \
                 neighborhood_id, \
                 city_id, \
                 county_id, \
                 state_id, \
                 location_type, \
                 hierarchy_path, \
                 CASE \
                     WHEN neighborhood_id IS NOT NULL THEN 'neighborhood:' || neighborhood_id \
                     WHEN city_id IS NOT NULL THEN 'city:' || city_id \
                     WHEN county_id IS NOT NULL THEN 'county:' || county_id \
                     WHEN state_id IS NOT NULL THEN 'state:' || state_id \
                     ELSE NULL \
                 END AS graph_node_id, \
                 CASE \
                     WHEN location_type = 'neighborhood' THEN city_id \
                     WHEN location_type = 'city' THEN county_id \
                     WHEN location_type = 'county' THEN state_id \
                     ELSE NULL \
                 END AS parent_location_id \
             FROM {input}"
        );
        self.engine.execute_batch(&sql)?;

        let input_count = self.engine.count_records(input_table)?;
        let output_count = self.engine.count_records(output_view)?;
        info!(view = output_view, "created location gold view");

        Ok(GoldMetadata::new(
            input_table,
            output_view,
            input_count,
            output_count,
            ENRICHMENTS.iter().map(|s| (*s).to_string()).collect(),
            EntityKind::Location,
        )?)
    }
}
