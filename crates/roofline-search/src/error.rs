//! Retrieval errors, split along the retry boundary.

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors from the hybrid retrieval core.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Connection-level failure; retried with backoff.
    #[error("Search transport error: {0}")]
    Transport(#[from] elasticsearch::Error),

    /// The engine rejected the query; never retried.
    #[error("Search query rejected ({status}): {body}")]
    Query { status: u16, body: String },

    /// Target index does not exist; never retried.
    #[error("Search index not found: {0}")]
    IndexMissing(String),

    /// All retry attempts failed.
    #[error("Search failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    #[error("Embedding error: {0}")]
    Embedding(#[from] roofline_embed::EmbedError),

    /// Location extraction failed even through the fallback.
    #[error("Location extraction error: {0}")]
    Extraction(String),

    /// Client could not be constructed; fatal at startup.
    #[error("Search configuration error: {0}")]
    Config(String),
}

impl SearchError {
    /// Transient errors get exponential-backoff retries; the rest fail
    /// immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Embedding(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_rejections_are_permanent() {
        let err = SearchError::Query {
            status: 400,
            body: "parsing_exception".into(),
        };
        assert!(!err.is_retryable());
        assert!(!SearchError::IndexMissing("properties".into()).is_retryable());
    }
}
