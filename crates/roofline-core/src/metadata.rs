//! Frozen metadata returned by every stage operation.
//!
//! Counts are unsigned, so negative values are unrepresentable; the
//! constructors additionally enforce `output ≤ input` so that dropped
//! counts are always derivable without underflow. Fields are private and
//! exposed through getters to keep instances immutable after construction.

use std::path::PathBuf;

use serde::Serialize;

use crate::catalog::EntityKind;
use crate::error::{CoreError, Result};

/// Metadata for a Bronze ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct BronzeMetadata {
    table_name: String,
    source_path: PathBuf,
    record_count: u64,
    entity_type: EntityKind,
}

impl BronzeMetadata {
    pub fn new(
        table_name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        record_count: u64,
        entity_type: EntityKind,
    ) -> Result<Self> {
        let table_name = table_name.into();
        if table_name.is_empty() {
            return Err(CoreError::InvalidMetadata(
                "bronze table_name must be non-empty".to_string(),
            ));
        }
        Ok(Self {
            table_name,
            source_path: source_path.into(),
            record_count,
            entity_type,
        })
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[must_use]
    pub fn source_path(&self) -> &PathBuf {
        &self.source_path
    }

    #[must_use]
    pub const fn record_count(&self) -> u64 {
        self.record_count
    }

    #[must_use]
    pub const fn entity_type(&self) -> EntityKind {
        self.entity_type
    }
}

/// Metadata for a Silver transformation.
#[derive(Debug, Clone, Serialize)]
pub struct SilverMetadata {
    input_table: String,
    output_table: String,
    input_count: u64,
    output_count: u64,
    dropped_count: u64,
    entity_type: EntityKind,
}

impl SilverMetadata {
    pub fn new(
        input_table: impl Into<String>,
        output_table: impl Into<String>,
        input_count: u64,
        output_count: u64,
        entity_type: EntityKind,
    ) -> Result<Self> {
        if output_count > input_count {
            return Err(CoreError::InvalidMetadata(format!(
                "silver output_count {output_count} exceeds input_count {input_count}"
            )));
        }
        Ok(Self {
            input_table: input_table.into(),
            output_table: output_table.into(),
            input_count,
            output_count,
            dropped_count: input_count - output_count,
            entity_type,
        })
    }

    #[must_use]
    pub fn input_table(&self) -> &str {
        &self.input_table
    }

    #[must_use]
    pub fn output_table(&self) -> &str {
        &self.output_table
    }

    #[must_use]
    pub const fn input_count(&self) -> u64 {
        self.input_count
    }

    #[must_use]
    pub const fn output_count(&self) -> u64 {
        self.output_count
    }

    #[must_use]
    pub const fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    #[must_use]
    pub const fn entity_type(&self) -> EntityKind {
        self.entity_type
    }
}

/// Metadata for a Gold enrichment.
#[derive(Debug, Clone, Serialize)]
pub struct GoldMetadata {
    input_table: String,
    output_table: String,
    input_count: u64,
    output_count: u64,
    enrichments_applied: Vec<String>,
    entity_type: EntityKind,
}

impl GoldMetadata {
    pub fn new(
        input_table: impl Into<String>,
        output_table: impl Into<String>,
        input_count: u64,
        output_count: u64,
        enrichments_applied: Vec<String>,
        entity_type: EntityKind,
    ) -> Result<Self> {
        if output_count > input_count {
            return Err(CoreError::InvalidMetadata(format!(
                "gold output_count {output_count} exceeds input_count {input_count}"
            )));
        }
        Ok(Self {
            input_table: input_table.into(),
            output_table: output_table.into(),
            input_count,
            output_count,
            enrichments_applied,
            entity_type,
        })
    }

    #[must_use]
    pub fn input_table(&self) -> &str {
        &self.input_table
    }

    #[must_use]
    pub fn output_table(&self) -> &str {
        &self.output_table
    }

    #[must_use]
    pub const fn input_count(&self) -> u64 {
        self.input_count
    }

    #[must_use]
    pub const fn output_count(&self) -> u64 {
        self.output_count
    }

    #[must_use]
    pub fn enrichments_applied(&self) -> &[String] {
        &self.enrichments_applied
    }

    #[must_use]
    pub const fn entity_type(&self) -> EntityKind {
        self.entity_type
    }
}

/// Metadata for an embedding-attachment pass.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingMetadata {
    entity_type: EntityKind,
    target_table: String,
    records_processed: u64,
    embeddings_generated: u64,
    records_skipped: u64,
    embedding_dimension: usize,
    embedding_model: String,
}

impl EmbeddingMetadata {
    pub fn new(
        entity_type: EntityKind,
        target_table: impl Into<String>,
        records_processed: u64,
        embeddings_generated: u64,
        records_skipped: u64,
        embedding_dimension: usize,
        embedding_model: impl Into<String>,
    ) -> Result<Self> {
        if embeddings_generated + records_skipped > records_processed {
            return Err(CoreError::InvalidMetadata(format!(
                "embeddings_generated {embeddings_generated} + records_skipped \
                 {records_skipped} exceeds records_processed {records_processed}"
            )));
        }
        Ok(Self {
            entity_type,
            target_table: target_table.into(),
            records_processed,
            embeddings_generated,
            records_skipped,
            embedding_dimension,
            embedding_model: embedding_model.into(),
        })
    }

    #[must_use]
    pub const fn entity_type(&self) -> EntityKind {
        self.entity_type
    }

    #[must_use]
    pub fn target_table(&self) -> &str {
        &self.target_table
    }

    #[must_use]
    pub const fn records_processed(&self) -> u64 {
        self.records_processed
    }

    #[must_use]
    pub const fn embeddings_generated(&self) -> u64 {
        self.embeddings_generated
    }

    #[must_use]
    pub const fn records_skipped(&self) -> u64 {
        self.records_skipped
    }

    #[must_use]
    pub const fn embedding_dimension(&self) -> usize {
        self.embedding_dimension
    }

    #[must_use]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }
}

/// Result of a Bronze validation pass. Validators never mutate data; the
/// orchestrator decides whether warnings are survivable.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub table_name: String,
    pub entity_type: EntityKind,
    pub is_valid: bool,
    pub record_count: u64,
    pub schema_valid: bool,
    pub nulls_valid: bool,
    pub duplicates_valid: bool,
    pub data_types_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// An all-green result for a table, to be downgraded by checks.
    #[must_use]
    pub fn passing(
        table_name: impl Into<String>,
        entity_type: EntityKind,
        record_count: u64,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            entity_type,
            is_valid: true,
            record_count,
            schema_valid: true,
            nulls_valid: true,
            duplicates_valid: true,
            data_types_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record an error and mark the result invalid.
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.is_valid = false;
    }

    /// Record a warning without affecting validity.
    pub fn push_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}
