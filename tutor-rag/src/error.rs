//! Error types for the `tutor-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in retrieval, generation, and memory operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// A tunable failed validation. Fatal at construction.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The caller supplied an unusable request (empty query, bad `top_k`).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A collaborator (embedding or generation backend) is not configured
    /// or could not be initialized.
    #[error("{capability} capability unavailable: {message}")]
    CapabilityUnavailable {
        /// Which capability is missing, e.g. `"generation"`.
        capability: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation backend failed or returned degenerate output.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An externally bounded call did not finish in time.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The configured bound in seconds.
        seconds: u64,
    },

    /// The vector index rejected a write.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Saving or restoring an index snapshot failed.
    #[error("Persistence error ({location}): {message}")]
    PersistenceError {
        /// The configured snapshot location.
        location: String,
        /// A description of the failure.
        message: String,
    },

    /// Quiz generation failed.
    #[error("Quiz error: {0}")]
    QuizError(String),
}

impl RagError {
    /// Whether the error is a capability failure that callers are expected
    /// to absorb with a fallback rather than surface.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingError { .. }
                | RagError::GenerationError { .. }
                | RagError::Timeout { .. }
                | RagError::PersistenceError { .. }
        )
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        RagError::InvalidInput(message.into())
    }
}

/// A convenience result type for retrieval pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Run `future` with a deadline, mapping expiry to [`RagError::Timeout`].
pub(crate) async fn with_timeout<T>(
    operation: &str,
    limit: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            Err(RagError::Timeout { operation: operation.to_string(), seconds: limit.as_secs() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_failures_are_transient() {
        let err = RagError::GenerationError { provider: "mock".into(), message: "boom".into() };
        assert!(err.is_transient());
        assert!(RagError::Timeout { operation: "generation".into(), seconds: 5 }.is_transient());
    }

    #[test]
    fn caller_errors_are_not_transient() {
        assert!(!RagError::invalid_input("query must not be empty").is_transient());
        assert!(!RagError::ConfigError("overlap".into()).is_transient());
        let unavailable = RagError::CapabilityUnavailable {
            capability: "generation".into(),
            message: "no provider configured".into(),
        };
        assert!(!unavailable.is_transient());
        assert_eq!(
            unavailable.to_string(),
            "generation capability unavailable: no provider configured"
        );
    }
}
