//! Error types for the `food-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in retrieval and answer operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Two vectors that must share a dimension do not.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension required by the left-hand side or the configuration.
        expected: usize,
        /// The dimension actually supplied.
        actual: usize,
    },

    /// A backend could not reach a usable ready state.
    #[error("Initialization failed ({backend}): {message}")]
    InitializationFailed {
        /// The vector store backend that failed to start.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A network operation exhausted its retry budget.
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    OperationFailed {
        /// The logical operation that was retried (e.g. `upstash.query`).
        operation: String,
        /// How many attempts were made before giving up.
        attempts: u32,
        /// The last observed error.
        #[source]
        source: Box<RagError>,
    },

    /// A single call against a vector store backend failed.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A retried operation ran past its overall deadline.
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        /// The logical operation that timed out.
        operation: String,
        /// The deadline that was exceeded.
        elapsed: Duration,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model could not produce an answer.
    #[error("Language model error ({provider}): {message}")]
    LlmError {
        /// The language model provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The food dataset could not be read or parsed.
    #[error("Dataset error: {0}")]
    DatasetError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the RAG pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RagError {
    /// Whether a retry policy should try the failed call again.
    ///
    /// Only transient backend failures qualify. Dimension and configuration
    /// errors are deterministic and surface immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::VectorStoreError { .. } | Self::Timeout { .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
