//! Embedding provider errors.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Errors from embedding providers.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The configured provider requires an API key and none was found.
    #[error("Missing API key for embedding provider '{0}'")]
    MissingApiKey(String),

    /// Network-level failure talking to the provider.
    #[error("Embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("Embedding provider returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The response body did not match the provider's documented shape.
    #[error("Unexpected embedding response shape: {0}")]
    ResponseShape(String),

    /// Output vector count differs from input text count.
    #[error("Provider returned {returned} vectors for {requested} texts")]
    CountMismatch { requested: usize, returned: usize },

    /// A vector does not have the provider's declared dimension.
    #[error("Embedding has dimension {actual}, provider declares {declared}")]
    DimensionMismatch { declared: usize, actual: usize },

    /// Caller sent more texts than the provider's batch size allows.
    #[error("Batch of {given} texts exceeds provider batch size {limit}")]
    BatchTooLarge { given: usize, limit: usize },
}

impl EmbedError {
    /// Whether the caller may retry the operation.
    ///
    /// Network failures and server-side errors are transient; contract
    /// violations and configuration problems are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(
            EmbedError::Api {
                status: 503,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(
            EmbedError::Api {
                status: 429,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(
            !EmbedError::Api {
                status: 401,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(!EmbedError::MissingApiKey("voyage".into()).is_retryable());
        assert!(
            !EmbedError::DimensionMismatch {
                declared: 1024,
                actual: 768
            }
            .is_retryable()
        );
        assert!(
            !EmbedError::BatchTooLarge {
                given: 200,
                limit: 100
            }
            .is_retryable()
        );
    }
}
