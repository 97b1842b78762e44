//! Error types for ragtrace
//!
//! Every pipeline stage returns these internally; the orchestrator turns them
//! into trace steps so they never cross the public retrieval boundary.

use thiserror::Error;

/// Main error type for the retrieval pipeline
#[derive(Error, Debug)]
pub enum RagError {
    /// Missing or invalid configuration value
    #[error("{0}")]
    Config(String),

    /// Embedding service credential absent or blank
    #[error("{var} is not set")]
    MissingCredential { var: String },

    /// HTTP client errors (connect, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the embedding service
    #[error("Embeddings request failed: {status} {detail}")]
    EmbeddingApi { status: u16, detail: String },

    /// Response body parsed but did not have the expected shape
    #[error("{0}")]
    MalformedResponse(String),

    /// A single attempt exceeded its deadline
    #[error("Request timed out after {duration_ms}ms ({hint})")]
    Timeout { duration_ms: u64, hint: String },

    /// Document store failure (connect, query rejected, bad reply)
    #[error("Vector search failed: {0}")]
    Store(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classes used for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing credential or connection string; never retried
    Configuration,
    /// Timeout, connection failure, non-2xx status
    TransientNetwork,
    /// Response body missing expected fields
    DataShape,
}

impl RagError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::Config(_) | RagError::MissingCredential { .. } => ErrorKind::Configuration,
            RagError::Http(e) if e.is_decode() => ErrorKind::DataShape,
            RagError::Http(_)
            | RagError::EmbeddingApi { .. }
            | RagError::Timeout { .. }
            | RagError::Store(_)
            | RagError::Io(_) => ErrorKind::TransientNetwork,
            RagError::MalformedResponse(_) => ErrorKind::DataShape,
        }
    }
}

impl From<mongodb::error::Error> for RagError {
    fn from(err: mongodb::error::Error) -> Self {
        RagError::Store(err.to_string())
    }
}

impl From<qdrant_client::QdrantError> for RagError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        RagError::Store(err.to_string())
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RagError>;
