//! Canonical table names for every entity stream and layer.
//!
//! The catalog is a frozen registry: tables are created by exactly one
//! component and read by many, so every name lives here once.

use serde::{Deserialize, Serialize};

/// The four entity streams flowing through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Property,
    Neighborhood,
    Wikipedia,
    Location,
}

impl EntityKind {
    /// All entities in pipeline processing order.
    pub const ALL: [Self; 4] = [
        Self::Property,
        Self::Neighborhood,
        Self::Wikipedia,
        Self::Location,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::Neighborhood => "neighborhood",
            Self::Wikipedia => "wikipedia",
            Self::Location => "location",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frozen registry of layer table names.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableCatalog;

impl TableCatalog {
    /// Bronze table for an entity.
    #[must_use]
    pub const fn bronze(entity: EntityKind) -> &'static str {
        match entity {
            EntityKind::Property => "bronze_properties",
            EntityKind::Neighborhood => "bronze_neighborhoods",
            EntityKind::Wikipedia => "bronze_wikipedia",
            EntityKind::Location => "bronze_locations",
        }
    }

    /// Silver table for an entity.
    #[must_use]
    pub const fn silver(entity: EntityKind) -> &'static str {
        match entity {
            EntityKind::Property => "silver_properties",
            EntityKind::Neighborhood => "silver_neighborhoods",
            EntityKind::Wikipedia => "silver_wikipedia",
            EntityKind::Location => "silver_locations",
        }
    }

    /// Gold table (or view) for an entity.
    #[must_use]
    pub const fn gold(entity: EntityKind) -> &'static str {
        match entity {
            EntityKind::Property => "gold_properties",
            EntityKind::Neighborhood => "gold_neighborhoods",
            EntityKind::Wikipedia => "gold_wikipedia",
            EntityKind::Location => "gold_locations",
        }
    }

    /// Elasticsearch index for an entity, where one exists.
    #[must_use]
    pub const fn search_index(entity: EntityKind) -> Option<&'static str> {
        match entity {
            EntityKind::Property => Some("properties"),
            EntityKind::Neighborhood => Some("neighborhoods"),
            EntityKind::Wikipedia => Some("wikipedia"),
            EntityKind::Location => None,
        }
    }
}

/// Silver-side extraction tables feeding the graph builder.
pub mod extraction {
    pub const FEATURES: &str = "silver_features";
    pub const PROPERTY_TYPES: &str = "silver_property_types";
    pub const PRICE_RANGES: &str = "silver_price_ranges";
    pub const CITIES: &str = "silver_cities";
    pub const STATES: &str = "silver_states";
    pub const ZIP_CODES: &str = "silver_zip_codes";

    pub const ALL: [&str; 6] = [
        FEATURES,
        PROPERTY_TYPES,
        PRICE_RANGES,
        CITIES,
        STATES,
        ZIP_CODES,
    ];
}

/// Gold-layer graph node and relationship tables.
pub mod graph {
    pub const PROPERTY_NODES: &str = "gold_graph_properties";
    pub const NEIGHBORHOOD_NODES: &str = "gold_graph_neighborhoods";
    pub const WIKIPEDIA_NODES: &str = "gold_graph_wikipedia";
    pub const FEATURE_NODES: &str = "gold_graph_features";
    pub const PROPERTY_TYPE_NODES: &str = "gold_graph_property_types";
    pub const PRICE_RANGE_NODES: &str = "gold_graph_price_ranges";
    pub const CITY_NODES: &str = "gold_graph_cities";
    pub const STATE_NODES: &str = "gold_graph_states";
    pub const COUNTY_NODES: &str = "gold_graph_counties";
    pub const ZIP_CODE_NODES: &str = "gold_graph_zip_codes";

    pub const REL_LOCATED_IN: &str = "gold_graph_rel_located_in";
    pub const REL_HAS_FEATURE: &str = "gold_graph_rel_has_feature";
    pub const REL_IN_CITY: &str = "gold_graph_rel_in_city";
    pub const REL_IN_STATE: &str = "gold_graph_rel_in_state";
    pub const REL_IN_ZIP_CODE: &str = "gold_graph_rel_in_zip_code";
    pub const REL_TYPE_OF: &str = "gold_graph_rel_type_of";
    pub const REL_IN_PRICE_RANGE: &str = "gold_graph_rel_in_price_range";
    pub const REL_SIMILAR_TO: &str = "gold_graph_rel_similar_properties";
    pub const REL_GEOGRAPHIC_HIERARCHY: &str = "gold_graph_rel_geographic_hierarchy";

    pub const NODE_TABLES: [&str; 10] = [
        PROPERTY_NODES,
        NEIGHBORHOOD_NODES,
        WIKIPEDIA_NODES,
        FEATURE_NODES,
        PROPERTY_TYPE_NODES,
        PRICE_RANGE_NODES,
        CITY_NODES,
        STATE_NODES,
        COUNTY_NODES,
        ZIP_CODE_NODES,
    ];

    pub const RELATIONSHIP_TABLES: [&str; 9] = [
        REL_LOCATED_IN,
        REL_HAS_FEATURE,
        REL_IN_CITY,
        REL_IN_STATE,
        REL_IN_ZIP_CODE,
        REL_TYPE_OF,
        REL_IN_PRICE_RANGE,
        REL_SIMILAR_TO,
        REL_GEOGRAPHIC_HIERARCHY,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entity_has_three_layers() {
        for entity in EntityKind::ALL {
            assert!(TableCatalog::bronze(entity).starts_with("bronze_"));
            assert!(TableCatalog::silver(entity).starts_with("silver_"));
            assert!(TableCatalog::gold(entity).starts_with("gold_"));
        }
    }

    #[test]
    fn locations_have_no_search_index() {
        assert_eq!(TableCatalog::search_index(EntityKind::Location), None);
        assert_eq!(
            TableCatalog::search_index(EntityKind::Property),
            Some("properties")
        );
    }

    #[test]
    fn graph_tables_share_the_gold_graph_prefix() {
        for name in graph::NODE_TABLES.iter().chain(&graph::RELATIONSHIP_TABLES) {
            assert!(
                name.starts_with("gold_graph_"),
                "{name} missing gold_graph_ prefix"
            );
        }
    }

    #[test]
    fn catalog_names_are_distinct() {
        let mut names: Vec<&str> = Vec::new();
        for entity in EntityKind::ALL {
            names.push(TableCatalog::bronze(entity));
            names.push(TableCatalog::silver(entity));
            names.push(TableCatalog::gold(entity));
        }
        names.extend(extraction::ALL);
        names.extend(graph::NODE_TABLES);
        names.extend(graph::RELATIONSHIP_TABLES);
        let mut deduped = names.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), names.len());
    }
}
