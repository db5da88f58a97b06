//! Location-reference Bronze ingestion.
//!
//! The flat hierarchy file canonicalizes every other stream's geography,
//! so the orchestrator runs this ingest before any dependent Silver stage.

use std::path::Path;

use tracing::info;

use roofline_core::catalog::EntityKind;
use roofline_core::config::PipelineSettings;
use roofline_core::metadata::BronzeMetadata;
use roofline_engine::EngineConnection;

use crate::bronze::require_source;
use crate::error::Result;

/// Loads the raw geographic hierarchy into the Bronze layer.
pub struct LocationBronzeIngester<'a> {
    settings: &'a PipelineSettings,
    engine: &'a EngineConnection,
}

impl<'a> LocationBronzeIngester<'a> {
    #[must_use]
    pub const fn new(settings: &'a PipelineSettings, engine: &'a EngineConnection) -> Self {
        Self { settings, engine }
    }

    pub fn ingest(
        &self,
        table_name: &str,
        file_path: Option<&Path>,
        sample_size: Option<u64>,
    ) -> Result<BronzeMetadata> {
        let path = file_path.unwrap_or(&self.settings.data_sources.locations_file);
        require_source(path)?;

        info!(path = %path.display(), "loading raw locations");
        self.engine.drop_table(table_name)?;
        self.engine.read_json_table(path, table_name, sample_size)?;

        let record_count = self.engine.count_records(table_name)?;
        info!(records = record_count, table = table_name, "loaded raw locations");

        Ok(BronzeMetadata::new(
            table_name,
            path,
            record_count,
            EntityKind::Location,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{settings_with_sources, write_locations_fixture};

    #[test]
    fn ingest_loads_partial_hierarchy_rows() {
        let dir = tempfile::tempdir().unwrap();
        write_locations_fixture(dir.path());
        let settings = settings_with_sources(dir.path());
        let engine = EngineConnection::in_memory().unwrap();

        let metadata = LocationBronzeIngester::new(&settings, &engine)
            .ingest("bronze_locations", None, None)
            .unwrap();
        assert_eq!(metadata.record_count(), 6);
        assert_eq!(metadata.entity_type(), EntityKind::Location);

        // Rows with missing levels arrive with nulls, not dropped.
        let state_only = engine
            .query_i64(
                "SELECT COUNT(*) FROM bronze_locations \
                 WHERE city IS NULL AND county IS NULL AND state IS NOT NULL",
            )
            .unwrap();
        assert_eq!(state_only, 1);
    }
}
