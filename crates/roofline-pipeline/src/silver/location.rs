//! Location Silver: standardize the geographic hierarchy and mint the
//! deterministic IDs every other stream links through.

use tracing::info;

use roofline_core::catalog::EntityKind;
use roofline_core::metadata::SilverMetadata;
use roofline_core::normalize::{PLACEHOLDER_ZIP, STATE_ABBREVIATIONS};
use roofline_engine::{EngineConnection, Relation};

use crate::error::Result;

/// SQL fragment: lowercase with non-alphanumerics stripped.
fn lower_alnum_sql(expr: &str) -> String {
    format!("LOWER(REGEXP_REPLACE({expr}, '[^a-zA-Z0-9]', '', 'g'))")
}

/// CASE expression expanding two-letter codes to full state names, keeping
/// already-full names, and mapping NULL to 'Unknown'.
fn state_expand_case_sql(field: &str) -> String {
    let mut case = format!("CASE\n    WHEN {field} IS NULL THEN 'Unknown'\n");
    let mut seen: Vec<&str> = Vec::new();
    let mut full_names = Vec::new();
    for &(full, abbr) in STATE_ABBREVIATIONS {
        if !seen.contains(&abbr) {
            seen.push(abbr);
            case.push_str(&format!("    WHEN {field} = '{abbr}' THEN '{full}'\n"));
        }
        full_names.push(format!("'{}'", full.replace('\'', "''")));
    }
    case.push_str(&format!(
        "    WHEN {field} IN ({}) THEN {field}\n    ELSE {field}\nEND",
        full_names.join(", ")
    ));
    case
}

/// Transforms the Bronze location reference into `silver_locations`.
pub struct LocationSilverTransformer<'a> {
    engine: &'a EngineConnection,
}

impl<'a> LocationSilverTransformer<'a> {
    #[must_use]
    pub const fn new(engine: &'a EngineConnection) -> Self {
        Self { engine }
    }

    /// Single-pass standardization; no filter, every source row survives.
    pub fn transform(&self, input_table: &str, output_table: &str) -> Result<SilverMetadata> {
        let input_count = self.engine.count_records(input_table)?;
        self.engine.drop_table(output_table)?;

        let state_case = state_expand_case_sql("state");
        let state_slug = lower_alnum_sql("state_standardized");
        let county_stripped = "TRIM(REGEXP_REPLACE(county, '\\s+County$', '', 'i'))";

        let projection = format!(
            "{state_case} AS state_standardized,\n\
             state AS state_original,\n\
             CASE WHEN county IS NOT NULL THEN {county_stripped} ELSE NULL END AS county_standardized,\n\
             CASE WHEN city IS NOT NULL THEN TRIM(city) ELSE NULL END AS city_standardized,\n\
             CASE WHEN neighborhood IS NOT NULL THEN TRIM(neighborhood) ELSE NULL END AS neighborhood_standardized,\n\
             zip_code,\n\
             CASE \n\
                 WHEN zip_code IS NULL THEN 'missing'\n\
                 WHEN LENGTH(zip_code) != 5 THEN 'invalid'\n\
                 WHEN zip_code = '{PLACEHOLDER_ZIP}' THEN 'placeholder'\n\
                 WHEN REGEXP_MATCHES(zip_code, '^[0-9]{{5}}$') THEN 'valid'\n\
                 ELSE 'invalid'\n\
             END AS zip_code_status,\n\
             CASE WHEN neighborhood IS NOT NULL AND city IS NOT NULL \n\
                  THEN {neigh_slug} || '_' || {city_slug} ELSE NULL END AS neighborhood_id,\n\
             CASE WHEN city IS NOT NULL \n\
                  THEN {city_slug} || '_' || {state_slug} ELSE NULL END AS city_id,\n\
             CASE WHEN county IS NOT NULL \n\
                  THEN {county_slug} || '_' || {state_slug} ELSE NULL END AS county_id,\n\
             'state_' || {state_slug} AS state_id,\n\
             CASE \n\
                 WHEN neighborhood IS NOT NULL THEN 'neighborhood'\n\
                 WHEN city IS NOT NULL AND neighborhood IS NULL THEN 'city'\n\
                 WHEN county IS NOT NULL AND city IS NULL THEN 'county'\n\
                 WHEN state IS NOT NULL AND county IS NULL THEN 'state'\n\
                 ELSE 'unknown'\n\
             END AS location_type,\n\
             CONCAT_WS(' > ', neighborhood, city, county, state) AS hierarchy_path",
            neigh_slug = lower_alnum_sql("TRIM(neighborhood)"),
            city_slug = lower_alnum_sql("TRIM(city)"),
            county_slug = lower_alnum_sql(county_stripped),
        );

        Relation::table(input_table)?
            .project(&projection)
            .create(self.engine, output_table)?;

        let output_count = self.engine.count_records(output_table)?;
        info!(
            input = input_count,
            output = output_count,
            table = output_table,
            "location silver transformation complete"
        );

        Ok(SilverMetadata::new(
            input_table,
            output_table,
            input_count,
            output_count,
            EntityKind::Location,
        )?)
    }
}
