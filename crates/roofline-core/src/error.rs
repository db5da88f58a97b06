//! Error taxonomy shared by every pipeline stage.
//!
//! Kinds map onto how the orchestrator reacts:
//! - `Configuration` / `Identifier` / `Contract` are fatal at startup
//! - `Validation` is counted and skipped, the run continues
//! - `Transient` is retried with exponential backoff by the caller
//! - `Permanent` surfaces without retry
//! - `Provider` degrades the run (null embeddings) instead of failing it

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Main error type for pipeline-wide failures.
#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors: fatal at startup.
    #[error("Missing required setting: {0}")]
    MissingSetting(String),

    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    #[error(
        "Embedding provider '{provider}' declares dimension {declared}, but the pipeline \
         requires {required} (graph vector indexes are fixed at that dimension)"
    )]
    DimensionMismatch {
        provider: String,
        declared: usize,
        required: usize,
    },

    // Validation errors: counted, skipped; the run continues.
    #[error("Validation failed for {entity}: {message}")]
    Validation { entity: String, message: String },

    // Programmer errors: contract violations, always fatal.
    #[error("Invalid identifier: {0}. Must match ^[A-Za-z][A-Za-z0-9_]{{0,63}}$")]
    InvalidIdentifier(String),

    #[error("Contract violation: {0}")]
    Contract(String),

    // Metadata construction errors.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Returns the error kind string used in structured failure reports.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MissingSetting(_) | Self::SourceNotFound(_) | Self::DimensionMismatch { .. } => {
                "CONFIGURATION"
            }
            Self::Validation { .. } => "VALIDATION",
            Self::InvalidIdentifier(_) | Self::Contract(_) => "PROGRAMMER",
            Self::InvalidMetadata(_) => "METADATA",
            Self::Io(_) => "IO",
            Self::Serialization(_) => "SERIALIZATION",
        }
    }

    /// Whether the orchestrator may retry the failed operation.
    ///
    /// Core errors are configuration or contract failures, none of which a
    /// retry can fix.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        false
    }
}
