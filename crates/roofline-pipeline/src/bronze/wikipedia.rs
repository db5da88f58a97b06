//! Wikipedia Bronze ingestion from an external SQLite database.
//!
//! Attaches the crawler's database, copies the `articles` table verbatim,
//! and always detaches before returning, success or failure, so the file
//! lock is released.

use std::path::Path;

use tracing::{info, warn};

use roofline_core::catalog::EntityKind;
use roofline_core::config::PipelineSettings;
use roofline_core::metadata::BronzeMetadata;
use roofline_engine::EngineConnection;

use crate::bronze::require_source;
use crate::error::Result;

const ATTACH_ALIAS: &str = "wiki_db";

/// Loads raw Wikipedia articles from the crawler's SQLite file.
pub struct WikipediaBronzeIngester<'a> {
    settings: &'a PipelineSettings,
    engine: &'a EngineConnection,
}

impl<'a> WikipediaBronzeIngester<'a> {
    #[must_use]
    pub const fn new(settings: &'a PipelineSettings, engine: &'a EngineConnection) -> Self {
        Self { settings, engine }
    }

    pub fn ingest(
        &self,
        table_name: &str,
        db_path: Option<&Path>,
        sample_size: Option<u64>,
    ) -> Result<BronzeMetadata> {
        let path = db_path.unwrap_or(&self.settings.data_sources.wikipedia_db_path);
        require_source(path)?;

        info!(path = %path.display(), "loading raw wikipedia articles from sqlite");
        self.engine.attach_sqlite(path, ATTACH_ALIAS)?;

        let result = self.copy_articles(table_name, sample_size);

        // Detach unconditionally so the SQLite file lock is released.
        if let Err(e) = self.engine.detach(ATTACH_ALIAS) {
            warn!(error = %e, "could not detach wikipedia database");
        }

        let record_count = result?;
        info!(records = record_count, table = table_name, "loaded raw wikipedia articles");

        Ok(BronzeMetadata::new(
            table_name,
            path,
            record_count,
            EntityKind::Wikipedia,
        )?)
    }

    fn copy_articles(&self, table_name: &str, sample_size: Option<u64>) -> Result<u64> {
        self.engine.drop_table(table_name)?;
        let table = roofline_engine::safe_identifier(table_name)?;
        let mut sql = format!("CREATE TABLE {table} AS SELECT * FROM {ATTACH_ALIAS}.articles");
        if let Some(n) = sample_size {
            sql.push_str(&format!(" LIMIT {n}"));
        }
        self.engine.execute_batch(&sql)?;
        Ok(self.engine.count_records(table_name)?)
    }
}
