//! Pipeline-level error type.
//!
//! Stage functions return on success or raise on the first permanent
//! failure; the orchestrator records the message into
//! `PipelineMetrics.error_messages` and flips the run status to failed.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] roofline_core::CoreError),

    #[error(transparent)]
    Engine(#[from] roofline_engine::EngineError),

    #[error("Embedding provider error: {0}")]
    Embed(#[from] roofline_embed::EmbedError),

    #[error("Sink error: {0}")]
    Sink(#[from] roofline_sinks::SinkError),

    /// A skip flag was set but the tables the skipped layer should have
    /// produced are missing.
    #[error("Prerequisite table '{table}' missing for stage '{stage}'")]
    MissingPrerequisite { table: String, stage: String },

    /// A post-transform invariant did not hold.
    #[error("Invariant violated in {table}: {message}")]
    InvariantViolated { table: String, message: String },
}

impl PipelineError {
    /// Error kind string for the structured failure report.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Core(e) => e.error_code(),
            Self::Engine(e) => e.error_code(),
            Self::Embed(_) => "PROVIDER",
            Self::Sink(e) => e.error_code(),
            Self::MissingPrerequisite { .. } => "CONFIGURATION",
            Self::InvariantViolated { .. } => "VALIDATION",
        }
    }

    /// Whether the failed operation is worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Core(e) => e.is_retryable(),
            Self::Engine(e) => e.is_retryable(),
            Self::Embed(e) => e.is_retryable(),
            Self::Sink(e) => e.is_retryable(),
            Self::MissingPrerequisite { .. } | Self::InvariantViolated { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prerequisite_errors_are_configuration() {
        let err = PipelineError::MissingPrerequisite {
            table: "silver_locations".into(),
            stage: "silver:neighborhood".into(),
        };
        assert_eq!(err.error_code(), "CONFIGURATION");
        assert!(!err.is_retryable());
    }

    #[test]
    fn invariant_errors_are_validation() {
        let err = PipelineError::InvariantViolated {
            table: "silver_properties".into(),
            message: "null listing_id".into(),
        };
        assert_eq!(err.error_code(), "VALIDATION");
    }
}
