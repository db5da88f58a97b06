//! Neighborhood Bronze ingestion: raw JSON, engine-inferred schema.

use std::path::{Path, PathBuf};

use tracing::info;

use roofline_core::catalog::EntityKind;
use roofline_core::config::PipelineSettings;
use roofline_core::metadata::BronzeMetadata;
use roofline_engine::EngineConnection;

use crate::bronze::require_source;
use crate::error::Result;

/// Loads raw neighborhood records into the Bronze layer.
pub struct NeighborhoodBronzeIngester<'a> {
    settings: &'a PipelineSettings,
    engine: &'a EngineConnection,
}

impl<'a> NeighborhoodBronzeIngester<'a> {
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
        let default_path: PathBuf = self
            .settings
            .data_sources
            .neighborhoods_files
            .first()
            .cloned()
            .unwrap_or_default();
        let path = file_path.unwrap_or(&default_path);
        require_source(path)?;

        info!(path = %path.display(), "loading raw neighborhoods");
        self.engine.drop_table(table_name)?;
        self.engine.read_json_table(path, table_name, sample_size)?;

        let record_count = self.engine.count_records(table_name)?;
        info!(records = record_count, table = table_name, "loaded raw neighborhoods");

        Ok(BronzeMetadata::new(
            table_name,
            path,
            record_count,
            EntityKind::Neighborhood,
        )?)
    }
}
