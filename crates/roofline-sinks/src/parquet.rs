//! Parquet export via engine-native COPY. Never row-iterates.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use roofline_core::catalog::{EntityKind, TableCatalog};
use roofline_engine::EngineConnection;

use crate::error::Result;

/// Default compression codec.
pub const DEFAULT_COMPRESSION: &str = "zstd";
/// Default ZSTD level: 1 trades a little size for a lot of speed.
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 1;
/// Row group size for Bronze exports.
pub const BRONZE_ROW_GROUP_SIZE: u64 = 100_000;
/// Larger row groups for Silver/Gold scans.
pub const REFINED_ROW_GROUP_SIZE: u64 = 500_000;

/// Statistics for one exported table.
#[derive(Debug, Clone, Serialize)]
pub struct ParquetExportStats {
    pub table: String,
    pub path: PathBuf,
    pub records: u64,
    pub file_size_bytes: u64,
    pub compression: String,
}

/// Statistics for a whole-layer export.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LayerExportStats {
    pub bronze: Vec<ParquetExportStats>,
    pub silver: Vec<ParquetExportStats>,
    pub gold: Vec<ParquetExportStats>,
}

impl LayerExportStats {
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.bronze.len() + self.silver.len() + self.gold.len()
    }
}

/// Writes tables and views to Parquet under an output directory.
pub struct ParquetWriter {
    engine: EngineConnection,
    output_dir: PathBuf,
}

impl ParquetWriter {
    pub fn new(engine: EngineConnection, output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { engine, output_dir })
    }

    /// Export one table or view.
    pub fn write_table(
        &self,
        table_name: &str,
        output_name: Option<&str>,
        compression: &str,
        compression_level: u8,
        row_group_size: u64,
    ) -> Result<ParquetExportStats> {
        let output_name = output_name.unwrap_or(table_name);
        let output_file = self.output_dir.join(format!("{output_name}.parquet"));
        if let Some(parent) = output_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let records = self.engine.count_records(table_name)?;
        self.engine.copy_to_parquet(
            table_name,
            &output_file,
            compression,
            compression_level,
            row_group_size,
        )?;

        let file_size_bytes = std::fs::metadata(&output_file).map(|m| m.len()).unwrap_or(0);
        info!(table = table_name, records, path = %output_file.display(), "exported parquet");

        Ok(ParquetExportStats {
            table: table_name.to_string(),
            path: output_file,
            records,
            file_size_bytes,
            compression: compression.to_string(),
        })
    }

    /// Export every existing layer table into `<dir>/<layer>/<table>.parquet`.
    pub fn export_all_layers(&self) -> Result<LayerExportStats> {
        let mut stats = LayerExportStats::default();

        for entity in EntityKind::ALL {
            let bronze = TableCatalog::bronze(entity);
            if self.engine.table_exists(bronze)? {
                stats
                    .bronze
                    .push(self.write_layer_table("bronze", bronze, BRONZE_ROW_GROUP_SIZE)?);
            }
            let silver = TableCatalog::silver(entity);
            if self.engine.table_exists(silver)? {
                stats
                    .silver
                    .push(self.write_layer_table("silver", silver, REFINED_ROW_GROUP_SIZE)?);
            }
            let gold = TableCatalog::gold(entity);
            if self.engine.table_exists(gold)? {
                stats
                    .gold
                    .push(self.write_layer_table("gold", gold, REFINED_ROW_GROUP_SIZE)?);
            }
        }

        info!(files = stats.file_count(), "layer export complete");
        Ok(stats)
    }

    fn write_layer_table(
        &self,
        layer: &str,
        table: &str,
        row_group_size: u64,
    ) -> Result<ParquetExportStats> {
        let layer_dir = self.output_dir.join(layer);
        std::fs::create_dir_all(&layer_dir)?;
        let output_file = layer_dir.join(format!("{table}.parquet"));

        let records = self.engine.count_records(table)?;
        self.engine.copy_to_parquet(
            table,
            &output_file,
            DEFAULT_COMPRESSION,
            DEFAULT_COMPRESSION_LEVEL,
            row_group_size,
        )?;
        let file_size_bytes = std::fs::metadata(&output_file).map(|m| m.len()).unwrap_or(0);

        Ok(ParquetExportStats {
            table: table.to_string(),
            path: output_file,
            records,
            file_size_bytes,
            compression: DEFAULT_COMPRESSION.to_string(),
        })
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_table_exports_and_counts() {
        let engine = EngineConnection::in_memory().unwrap();
        engine
            .execute_batch("CREATE TABLE gold_properties AS SELECT range AS id FROM range(10)")
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let writer = ParquetWriter::new(engine, dir.path()).unwrap();
        let stats = writer
            .write_table("gold_properties", None, "zstd", 1, 100_000)
            .unwrap();
        assert_eq!(stats.records, 10);
        assert!(stats.path.exists());
        assert!(stats.file_size_bytes > 0);
    }

    #[test]
    fn export_all_layers_skips_missing_tables() {
        let engine = EngineConnection::in_memory().unwrap();
        engine
            .execute_batch("CREATE TABLE bronze_properties AS SELECT 1 AS x")
            .unwrap();
        engine
            .execute_batch("CREATE TABLE silver_locations AS SELECT 2 AS y")
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let writer = ParquetWriter::new(engine, dir.path()).unwrap();
        let stats = writer.export_all_layers().unwrap();
        assert_eq!(stats.bronze.len(), 1);
        assert_eq!(stats.silver.len(), 1);
        assert!(stats.gold.is_empty());
        assert!(dir.path().join("bronze/bronze_properties.parquet").exists());
        assert!(dir.path().join("silver/silver_locations.parquet").exists());
    }

    #[test]
    fn gold_round_trip_preserves_record_counts() {
        let engine = EngineConnection::in_memory().unwrap();
        engine
            .execute_batch(
                "CREATE TABLE gold_neighborhoods AS \
                 SELECT range AS id, 'n' || range AS name FROM range(25)",
            )
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let writer = ParquetWriter::new(engine.clone(), dir.path()).unwrap();
        let stats = writer.export_all_layers().unwrap();
        assert_eq!(stats.gold[0].records, 25);

        engine
            .read_parquet(&stats.gold[0].path, "reread", None)
            .unwrap();
        assert_eq!(engine.count_records("reread").unwrap(), 25);
    }
}
