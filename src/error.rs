use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the RAG pipeline and its collaborators
#[derive(Debug, Error)]
pub enum RagError {
    /// Missing credential, invalid setting, bad argument
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Nothing to work with: no eligible files, no text, no chunks
    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("the vector index has no entries")]
    EmptyIndex,

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("failed to read document {}: {reason}", .path.display())]
    Document { path: PathBuf, reason: String },

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("context too large: {0}")]
    ContextTooLarge(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success HTTP status that is neither transient nor an auth failure
    #[error("API request failed: {status} {message}")]
    Api { status: u16, message: String },

    #[error("invalid response from service: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Whether a retry with backoff may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::ServiceUnavailable(_) | RagError::RateLimited(_) | RagError::Timeout(_)
        )
    }

    /// Whether the error comes from setup rather than from a remote call or the data
    pub fn is_configuration(&self) -> bool {
        matches!(self, RagError::Configuration(_) | RagError::NotFound(_))
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RagError::ServiceUnavailable(format!("request timed out: {}", err))
        } else if err.is_decode() {
            RagError::InvalidResponse(err.to_string())
        } else if err.is_connect() || err.is_request() {
            RagError::ServiceUnavailable(err.to_string())
        } else {
            RagError::Api {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                message: err.to_string(),
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RagError::RateLimited("slow down".into()).is_retryable());
        assert!(RagError::ServiceUnavailable("503".into()).is_retryable());
        assert!(RagError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!RagError::Authentication("bad key".into()).is_retryable());
        assert!(!RagError::EmptyIndex.is_retryable());
    }

    #[test]
    fn test_configuration_classification() {
        assert!(RagError::Configuration("no key".into()).is_configuration());
        assert!(RagError::NotFound(PathBuf::from("/missing")).is_configuration());
        assert!(!RagError::EmptyInput("no files".into()).is_configuration());
    }
}
