//! Bronze validation: nullability, key uniqueness, value ranges.
//!
//! Validators never mutate data. Results carry errors and warnings
//! separately; the orchestrator decides whether to proceed on warnings.

use roofline_core::catalog::EntityKind;
use roofline_core::metadata::ValidationResult;
use roofline_engine::{EngineConnection, safe_identifier};

use crate::error::Result;

/// Minimum extract length before a Wikipedia article draws a warning.
const MIN_WIKIPEDIA_EXTRACT_CHARS: u64 = 100;

/// Validates Bronze tables after ingestion.
pub struct BronzeValidator<'a> {
    engine: &'a EngineConnection,
}

impl<'a> BronzeValidator<'a> {
    #[must_use]
    pub const fn new(engine: &'a EngineConnection) -> Self {
        Self { engine }
    }

    fn count_where(&self, table: &str, predicate: &str) -> Result<u64> {
        let table = safe_identifier(table)?;
        let count = self
            .engine
            .query_i64(&format!("SELECT COUNT(*) FROM {table} WHERE {predicate}"))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn count_duplicates(&self, table: &str, key: &str) -> Result<u64> {
        let table = safe_identifier(table)?;
        let count = self.engine.query_i64(&format!(
            "SELECT COALESCE(SUM(n - 1), 0) FROM ( \
                 SELECT COUNT(*) AS n FROM {table} \
                 WHERE {key} IS NOT NULL GROUP BY {key} HAVING COUNT(*) > 1)"
        ))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn has_columns(&self, table: &str, required: &[&str]) -> Result<Vec<String>> {
        let schema = self.engine.get_table_schema(table)?;
        let present: Vec<&str> = schema.iter().map(|(name, _)| name.as_str()).collect();
        Ok(required
            .iter()
            .filter(|field| !present.contains(*field))
            .map(|field| (*field).to_string())
            .collect())
    }

    fn check_coordinate_ranges(
        &self,
        result: &mut ValidationResult,
        table: &str,
        lat_expr: &str,
        lon_expr: &str,
    ) -> Result<()> {
        let out_of_range = self.count_where(
            table,
            &format!(
                "({lat_expr} IS NOT NULL AND ({lat_expr} < -90 OR {lat_expr} > 90)) \
                 OR ({lon_expr} IS NOT NULL AND ({lon_expr} < -180 OR {lon_expr} > 180))"
            ),
        )?;
        if out_of_range > 0 {
            result.data_types_valid = false;
            result.push_error(format!("{out_of_range} rows with out-of-range coordinates"));
        }
        Ok(())
    }

    /// Validate the Bronze property table.
    pub fn validate_property(&self, table: &str) -> Result<ValidationResult> {
        let record_count = self.engine.count_records(table)?;
        let mut result = ValidationResult::passing(table, EntityKind::Property, record_count);
        if record_count == 0 {
            result.push_error("No records found");
            return Ok(result);
        }

        let missing = self.has_columns(
            table,
            &[
                "listing_id",
                "listing_price",
                "property_details",
                "address",
                "coordinates",
            ],
        )?;
        for field in &missing {
            result.schema_valid = false;
            result.push_error(format!("Missing required field: {field}"));
        }
        if !result.schema_valid {
            return Ok(result);
        }

        let null_ids = self.count_where(table, "listing_id IS NULL")?;
        if null_ids > 0 {
            result.nulls_valid = false;
            result.push_error(format!("{null_ids} NULL values in primary key listing_id"));
        }
        let null_prices = self.count_where(table, "listing_price IS NULL")?;
        if null_prices > 0 {
            result.push_warning(format!("{null_prices} nulls in listing_price"));
        }
        let bad_prices = self.count_where(table, "listing_price <= 0")?;
        if bad_prices > 0 {
            result.push_warning(format!("{bad_prices} non-positive listing_price values"));
        }
        let bad_areas = self.count_where(table, "property_details.square_feet <= 0")?;
        if bad_areas > 0 {
            result.push_warning(format!("{bad_areas} non-positive square_feet values"));
        }

        let duplicates = self.count_duplicates(table, "listing_id")?;
        if duplicates > 0 {
            result.duplicates_valid = false;
            result.push_error(format!("{duplicates} duplicate listing_ids"));
        }

        self.check_coordinate_ranges(
            &mut result,
            table,
            "coordinates.latitude",
            "coordinates.longitude",
        )?;
        Ok(result)
    }

    /// Validate the Bronze neighborhood table.
    pub fn validate_neighborhood(&self, table: &str) -> Result<ValidationResult> {
        let record_count = self.engine.count_records(table)?;
        let mut result = ValidationResult::passing(table, EntityKind::Neighborhood, record_count);
        if record_count == 0 {
            result.push_error("No records found");
            return Ok(result);
        }

        let missing = self.has_columns(table, &["neighborhood_id", "name", "city", "state"])?;
        for field in &missing {
            result.schema_valid = false;
            result.push_error(format!("Missing required field: {field}"));
        }
        if !result.schema_valid {
            return Ok(result);
        }

        let null_ids = self.count_where(table, "neighborhood_id IS NULL")?;
        if null_ids > 0 {
            result.nulls_valid = false;
            result.push_error(format!(
                "{null_ids} NULL values in primary key neighborhood_id"
            ));
        }
        let duplicates = self.count_duplicates(table, "neighborhood_id")?;
        if duplicates > 0 {
            result.duplicates_valid = false;
            result.push_error(format!("{duplicates} duplicate neighborhood_ids"));
        }

        self.check_coordinate_ranges(
            &mut result,
            table,
            "coordinates.latitude",
            "coordinates.longitude",
        )?;
        Ok(result)
    }

    /// Validate the Bronze Wikipedia table.
    ///
    /// Duplicate page IDs are a warning here, not an error: the crawler
    /// re-visits pages and Silver deduplicates by quality.
    pub fn validate_wikipedia(&self, table: &str) -> Result<ValidationResult> {
        let record_count = self.engine.count_records(table)?;
        let mut result = ValidationResult::passing(table, EntityKind::Wikipedia, record_count);
        if record_count == 0 {
            result.push_error("No records found");
            return Ok(result);
        }

        let missing = self.has_columns(table, &["pageid", "title", "url", "extract"])?;
        for field in &missing {
            result.schema_valid = false;
            result.push_error(format!("Missing required field: {field}"));
        }
        if !result.schema_valid {
            return Ok(result);
        }

        let null_ids = self.count_where(table, "pageid IS NULL")?;
        if null_ids > 0 {
            result.nulls_valid = false;
            result.push_error(format!("{null_ids} NULL values in primary key pageid"));
        }
        let duplicates = self.count_duplicates(table, "pageid")?;
        if duplicates > 0 {
            result.push_warning(format!(
                "{duplicates} duplicate pageids (Silver deduplicates by quality)"
            ));
        }

        let thin = self.count_where(
            table,
            &format!("extract IS NOT NULL AND LENGTH(extract) < {MIN_WIKIPEDIA_EXTRACT_CHARS}"),
        )?;
        if thin > 0 {
            result.push_warning(format!(
                "{thin} articles with extract shorter than {MIN_WIKIPEDIA_EXTRACT_CHARS} characters"
            ));
        }

        self.check_coordinate_ranges(&mut result, table, "latitude", "longitude")?;
        Ok(result)
    }

    /// Validate the Bronze location table.
    pub fn validate_location(&self, table: &str) -> Result<ValidationResult> {
        let record_count = self.engine.count_records(table)?;
        let mut result = ValidationResult::passing(table, EntityKind::Location, record_count);
        if record_count == 0 {
            result.push_error("No records found");
            return Ok(result);
        }

        let missing = self.has_columns(table, &["state"])?;
        for field in &missing {
            result.schema_valid = false;
            result.push_error(format!("Missing required field: {field}"));
        }
        if !result.schema_valid {
            return Ok(result);
        }

        let null_states = self.count_where(table, "state IS NULL")?;
        if null_states > 0 {
            result.nulls_valid = false;
            result.push_error(format!("{null_states} NULL values in state"));
        }
        let odd_zips = self.count_where(
            table,
            "zip_code IS NOT NULL AND NOT regexp_matches(zip_code, '^[0-9]{5}$')",
        )?;
        if odd_zips > 0 {
            result.push_warning(format!("{odd_zips} malformed zip_code values"));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{
        seed_bronze_wikipedia, settings_with_sources, write_locations_fixture,
        write_properties_fixture,
    };

    #[test]
    fn valid_property_table_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_properties_fixture(dir.path(), 3);
        let settings = settings_with_sources(dir.path());
        let engine = EngineConnection::in_memory().unwrap();
        crate::bronze::PropertyBronzeIngester::new(&settings, &engine)
            .ingest("bronze_properties", Some(&path), None)
            .unwrap();

        let result = BronzeValidator::new(&engine)
            .validate_property("bronze_properties")
            .unwrap();
        assert!(result.is_valid, "errors: {:?}", result.errors);
        assert_eq!(result.record_count, 3);
        assert!(result.duplicates_valid);
    }

    #[test]
    fn duplicate_listing_ids_fail_validation() {
        let engine = EngineConnection::in_memory().unwrap();
        engine
            .execute_batch(
                "CREATE TABLE bronze_properties AS SELECT * FROM (VALUES \
                 ('a', 100.0, {'square_feet': 900}, {'city': 'SF'}, {'latitude': 37.7, 'longitude': -122.4}), \
                 ('a', 200.0, {'square_feet': 800}, {'city': 'SF'}, {'latitude': 37.8, 'longitude': -122.5})) \
                 AS t(listing_id, listing_price, property_details, address, coordinates)",
            )
            .unwrap();

        let result = BronzeValidator::new(&engine)
            .validate_property("bronze_properties")
            .unwrap();
        assert!(!result.is_valid);
        assert!(!result.duplicates_valid);
    }

    #[test]
    fn out_of_range_coordinates_fail_validation() {
        let engine = EngineConnection::in_memory().unwrap();
        engine
            .execute_batch(
                "CREATE TABLE bronze_properties AS SELECT * FROM (VALUES \
                 ('a', 100.0, {'square_feet': 900}, {'city': 'SF'}, {'latitude': 95.0, 'longitude': -122.4})) \
                 AS t(listing_id, listing_price, property_details, address, coordinates)",
            )
            .unwrap();

        let result = BronzeValidator::new(&engine)
            .validate_property("bronze_properties")
            .unwrap();
        assert!(!result.is_valid);
        assert!(!result.data_types_valid);
    }

    #[test]
    fn wikipedia_duplicates_warn_but_pass() {
        let engine = EngineConnection::in_memory().unwrap();
        seed_bronze_wikipedia(&engine);

        let result = BronzeValidator::new(&engine)
            .validate_wikipedia("bronze_wikipedia")
            .unwrap();
        assert!(result.is_valid, "errors: {:?}", result.errors);
        assert!(
            result.warnings.iter().any(|w| w.contains("duplicate")),
            "warnings: {:?}",
            result.warnings
        );
        // The second crawl of page 9001 has a short extract.
        assert!(result.warnings.iter().any(|w| w.contains("shorter")));
    }

    #[test]
    fn empty_table_is_an_error() {
        let engine = EngineConnection::in_memory().unwrap();
        engine
            .execute_batch("CREATE TABLE bronze_locations (state VARCHAR)")
            .unwrap();
        let result = BronzeValidator::new(&engine)
            .validate_location("bronze_locations")
            .unwrap();
        assert!(!result.is_valid);
    }

    #[test]
    fn location_fixture_warns_on_malformed_zip() {
        let dir = tempfile::tempdir().unwrap();
        write_locations_fixture(dir.path());
        let settings = settings_with_sources(dir.path());
        let engine = EngineConnection::in_memory().unwrap();
        crate::bronze::LocationBronzeIngester::new(&settings, &engine)
            .ingest("bronze_locations", None, None)
            .unwrap();

        let result = BronzeValidator::new(&engine)
            .validate_location("bronze_locations")
            .unwrap();
        assert!(result.is_valid);
        assert!(result.warnings.iter().any(|w| w.contains("malformed")));
    }
}
