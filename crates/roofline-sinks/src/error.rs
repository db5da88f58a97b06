//! Sink writer errors.

use thiserror::Error;

/// Result type alias for sink operations.
pub type Result<T> = std::result::Result<T, SinkError>;

/// Errors surfaced by the sink writers.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Engine error: {0}")]
    Engine(#[from] roofline_engine::EngineError),

    /// Search cluster was unreachable at startup; fail fast.
    #[error("Search cluster unreachable: {0}")]
    SearchUnreachable(String),

    #[error("Search transport error: {0}")]
    SearchTransport(#[from] elasticsearch::Error),

    /// The whole bulk call failed irrecoverably (as opposed to per-record
    /// failures, which are counted in the stats).
    #[error("Bulk indexing failed for index '{index}': {message}")]
    BulkFailed { index: String, message: String },

    #[error("Graph database error: {0}")]
    Graph(#[from] neo4rs::Error),

    #[error("Graph writer configuration error: {0}")]
    GraphConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    /// Error kind string for structured failure reports.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Engine(_) => "ENGINE",
            Self::SearchUnreachable(_) => "SEARCH_UNREACHABLE",
            Self::SearchTransport(_) => "SEARCH_TRANSPORT",
            Self::BulkFailed { .. } => "BULK_FAILED",
            Self::Graph(_) => "GRAPH",
            Self::GraphConfig(_) => "CONFIGURATION",
            Self::Io(_) => "IO",
        }
    }

    /// Transport-level failures are transient; the rest are permanent.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SearchUnreachable(_) | Self::SearchTransport(_) | Self::Graph(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_retryable() {
        assert!(SinkError::SearchUnreachable("refused".into()).is_retryable());
        assert!(
            !SinkError::BulkFailed {
                index: "properties".into(),
                message: "mapping conflict".into()
            }
            .is_retryable()
        );
        assert!(!SinkError::GraphConfig("missing password".into()).is_retryable());
    }
}
