//! Property Bronze ingestion: raw JSON, engine-inferred schema.

use std::path::{Path, PathBuf};

use tracing::info;

use roofline_core::catalog::EntityKind;
use roofline_core::config::PipelineSettings;
use roofline_core::metadata::BronzeMetadata;
use roofline_engine::EngineConnection;

use crate::bronze::require_source;
use crate::error::Result;

/// Loads raw property listings into the Bronze layer.
pub struct PropertyBronzeIngester<'a> {
    settings: &'a PipelineSettings,
    engine: &'a EngineConnection,
}

impl<'a> PropertyBronzeIngester<'a> {
    #[must_use]
    pub const fn new(settings: &'a PipelineSettings, engine: &'a EngineConnection) -> Self {
        Self { settings, engine }
    }

    /// Ingest the properties JSON file as-is.
    ///
    /// Uses the first configured source file when `file_path` is `None`.
    pub fn ingest(
        &self,
        table_name: &str,
        file_path: Option<&Path>,
        sample_size: Option<u64>,
    ) -> Result<BronzeMetadata> {
        let default_path: PathBuf = self
            .settings
            .data_sources
            .properties_files
            .first()
            .cloned()
            .unwrap_or_default();
        let path = file_path.unwrap_or(&default_path);
        require_source(path)?;

        info!(path = %path.display(), "loading raw properties");
        self.engine.drop_table(table_name)?;
        self.engine.read_json_table(path, table_name, sample_size)?;

        let record_count = self.engine.count_records(table_name)?;
        info!(records = record_count, table = table_name, "loaded raw properties");

        Ok(BronzeMetadata::new(
            table_name,
            path,
            record_count,
            EntityKind::Property,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{settings_with_sources, write_properties_fixture};

    #[test]
    fn ingest_preserves_source_schema_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_properties_fixture(dir.path(), 4);
        let settings = settings_with_sources(dir.path());
        let engine = EngineConnection::in_memory().unwrap();

        let ingester = PropertyBronzeIngester::new(&settings, &engine);
        let metadata = ingester
            .ingest("bronze_properties", Some(&path), None)
            .unwrap();

        assert_eq!(metadata.record_count(), 4);
        assert_eq!(metadata.entity_type(), EntityKind::Property);
        let schema = engine.get_table_schema("bronze_properties").unwrap();
        let columns: Vec<&str> = schema.iter().map(|(n, _)| n.as_str()).collect();
        // Nested structures arrive intact, no flattening in Bronze.
        assert!(columns.contains(&"listing_id"));
        assert!(columns.contains(&"property_details"));
        assert!(columns.contains(&"address"));
        assert!(columns.contains(&"coordinates"));
    }

    #[test]
    fn sample_size_limits_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_properties_fixture(dir.path(), 5);
        let settings = settings_with_sources(dir.path());
        let engine = EngineConnection::in_memory().unwrap();

        let metadata = PropertyBronzeIngester::new(&settings, &engine)
            .ingest("bronze_properties", Some(&path), Some(2))
            .unwrap();
        assert_eq!(metadata.record_count(), 2);
    }

    #[test]
    fn sample_size_zero_yields_empty_table_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_properties_fixture(dir.path(), 3);
        let settings = settings_with_sources(dir.path());
        let engine = EngineConnection::in_memory().unwrap();

        let metadata = PropertyBronzeIngester::new(&settings, &engine)
            .ingest("bronze_properties", Some(&path), Some(0))
            .unwrap();
        assert_eq!(metadata.record_count(), 0);
        assert!(engine.table_exists("bronze_properties").unwrap());
    }

    #[test]
    fn reingest_replaces_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_properties_fixture(dir.path(), 3);
        let settings = settings_with_sources(dir.path());
        let engine = EngineConnection::in_memory().unwrap();

        let ingester = PropertyBronzeIngester::new(&settings, &engine);
        ingester.ingest("bronze_properties", Some(&path), None).unwrap();
        let metadata = ingester.ingest("bronze_properties", Some(&path), None).unwrap();
        assert_eq!(metadata.record_count(), 3);
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_with_sources(dir.path());
        let engine = EngineConnection::in_memory().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(
            PropertyBronzeIngester::new(&settings, &engine)
                .ingest("bronze_properties", Some(&missing), None)
                .is_err()
        );
    }
}
