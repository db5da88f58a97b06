//! Stage, entity, and pipeline metrics.
//!
//! Within a run all timestamps are monotone non-decreasing: a stage records
//! its start before doing work and its end after, and the orchestrator
//! never reorders stages.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::EntityKind;
use crate::error::{CoreError, Result};

/// Metrics for a single pipeline stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageMetrics {
    stage_name: String,
    input_records: u64,
    output_records: u64,
    dropped_records: u64,
    error_count: u64,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
}

impl StageMetrics {
    pub fn new(
        stage_name: impl Into<String>,
        input_records: u64,
        output_records: u64,
        dropped_records: u64,
        error_count: u64,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        if output_records + dropped_records > input_records {
            return Err(CoreError::InvalidMetadata(format!(
                "stage output {output_records} + dropped {dropped_records} exceeds \
                 input {input_records}"
            )));
        }
        if let Some(end) = end_time {
            if end < start_time {
                return Err(CoreError::InvalidMetadata(
                    "stage end_time precedes start_time".to_string(),
                ));
            }
        }
        Ok(Self {
            stage_name: stage_name.into(),
            input_records,
            output_records,
            dropped_records,
            error_count,
            start_time,
            end_time,
        })
    }

    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    #[must_use]
    pub const fn input_records(&self) -> u64 {
        self.input_records
    }

    #[must_use]
    pub const fn output_records(&self) -> u64 {
        self.output_records
    }

    #[must_use]
    pub const fn dropped_records(&self) -> u64 {
        self.dropped_records
    }

    #[must_use]
    pub const fn error_count(&self) -> u64 {
        self.error_count
    }

    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    #[must_use]
    pub const fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Wall-clock duration in seconds, when the stage has finished.
    #[must_use]
    pub fn duration_seconds(&self) -> Option<f64> {
        self.end_time.map(|end| {
            let micros = (end - self.start_time).num_microseconds().unwrap_or(0);
            micros as f64 / 1_000_000.0
        })
    }

    /// Output records per second, when the duration is known and non-zero.
    #[must_use]
    pub fn records_per_second(&self) -> Option<f64> {
        self.duration_seconds()
            .filter(|d| *d > 0.0)
            .map(|d| self.output_records as f64 / d)
    }

    /// Fraction of input records that were neither dropped nor errored.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.input_records == 0 {
            return 1.0;
        }
        let lost = self.dropped_records + self.error_count;
        let kept = self.input_records.saturating_sub(lost);
        kept as f64 / self.input_records as f64
    }
}

/// Metrics for one entity stream across all stages.
#[derive(Debug, Clone, Serialize)]
pub struct EntityMetrics {
    pub entity_type: EntityKind,
    pub bronze: Option<StageMetrics>,
    pub silver: Option<StageMetrics>,
    pub gold: Option<StageMetrics>,
    pub embeddings_generated: u64,
}

impl EntityMetrics {
    #[must_use]
    pub const fn new(entity_type: EntityKind) -> Self {
        Self {
            entity_type,
            bronze: None,
            silver: None,
            gold: None,
            embeddings_generated: 0,
        }
    }

    /// Final record count after the deepest completed layer.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.gold
            .as_ref()
            .or(self.silver.as_ref())
            .or(self.bronze.as_ref())
            .map_or(0, StageMetrics::output_records)
    }

    /// Sum of all completed stage durations.
    #[must_use]
    pub fn total_duration_seconds(&self) -> f64 {
        [&self.bronze, &self.silver, &self.gold]
            .into_iter()
            .flatten()
            .filter_map(StageMetrics::duration_seconds)
            .sum()
    }
}

/// Terminal state of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Running,
    Completed,
    Failed,
}

/// Accumulated metrics for a full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineMetrics {
    pub pipeline_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub entities: Vec<EntityMetrics>,
    pub status: PipelineStatus,
    pub error_messages: Vec<String>,
}

impl PipelineMetrics {
    #[must_use]
    pub fn new(pipeline_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            start_time,
            end_time: None,
            entities: Vec::new(),
            status: PipelineStatus::Running,
            error_messages: Vec::new(),
        }
    }

    #[must_use]
    pub fn duration_seconds(&self) -> Option<f64> {
        self.end_time.map(|end| {
            let micros = (end - self.start_time).num_microseconds().unwrap_or(0);
            micros as f64 / 1_000_000.0
        })
    }

    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.status == PipelineStatus::Completed && self.error_messages.is_empty()
    }

    /// Record a fatal stage failure and transition to `Failed`.
    pub fn record_failure(&mut self, message: impl Into<String>, end_time: DateTime<Utc>) {
        self.error_messages.push(message.into());
        self.status = PipelineStatus::Failed;
        self.end_time = Some(end_time);
    }

    /// Mark the run complete.
    pub fn complete(&mut self, end_time: DateTime<Utc>) {
        self.status = PipelineStatus::Completed;
        self.end_time = Some(end_time);
    }
}
