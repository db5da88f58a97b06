//! Engine-level error type.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the analytical-engine adapter.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Connection could not be established; fatal at construction.
    #[error("Engine connection failed: {0}")]
    Connection(String),

    /// Identifier failed validation; always a caller bug.
    #[error("Invalid identifier: {0}. Must match ^[A-Za-z][A-Za-z0-9_]{{0,63}}$")]
    InvalidIdentifier(String),

    /// Runtime SQL error, propagated unchanged from the engine.
    #[error("SQL error: {0}")]
    Sql(#[from] duckdb::Error),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Error kind string for structured failure reports.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Connection(_) => "ENGINE_CONNECTION",
            Self::InvalidIdentifier(_) => "PROGRAMMER",
            Self::Sql(_) => "SQL",
            Self::TableNotFound(_) => "TABLE_NOT_FOUND",
            Self::Io(_) => "IO",
        }
    }

    /// Only connection-level failures are worth retrying; SQL and
    /// identifier errors are deterministic.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<EngineError> for roofline_core::CoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidIdentifier(name) => Self::InvalidIdentifier(name),
            other => Self::Contract(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(EngineError::Connection("refused".into()).is_retryable());
        assert!(!EngineError::InvalidIdentifier("1x".into()).is_retryable());
        assert_eq!(
            EngineError::InvalidIdentifier("1x".into()).error_code(),
            "PROGRAMMER"
        );
        assert_eq!(
            EngineError::TableNotFound("silver_properties".into()).error_code(),
            "TABLE_NOT_FOUND"
        );
    }
}
