//! Crate-wide error type.
//!
//! Partial failures (a single chunk, batch entry, or collection) are carried
//! as data in reports and shortened result lists; only whole-call failures
//! surface as [`Error`].

use std::time::Duration;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or inconsistent configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A vector's length does not match the collection's configured dimension.
    #[error("dimension mismatch for collection '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    /// A single collection could not be reached or operated on.
    #[error("collection '{collection}' unavailable: {reason}")]
    CollectionUnavailable { collection: String, reason: String },

    /// The embedding provider failed in a way worth retrying (rate limit,
    /// server error, network failure).
    #[error("embedding provider transient failure: {0}")]
    ProviderTransient(String),

    /// The embedding provider rejected the request; retrying will not help.
    #[error("embedding provider rejected the request: {0}")]
    ProviderFatal(String),

    /// The provider claimed success but returned no usable vector. Callers
    /// must never see an empty vector passed off as a valid embedding.
    #[error("embedding provider returned an empty vector for model '{model}'")]
    EmptyEmbedding { model: String },

    /// Every candidate collection failed during one ingestion or search call.
    /// This is the only partial-failure condition surfaced as a hard error.
    #[error("all {attempted} collection(s) failed during {operation}")]
    AllCollectionsFailed {
        operation: &'static str,
        attempted: usize,
    },

    /// A bounded wait on an external call expired.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Generic vector store failure reported by a backend.
    #[error("vector store error: {0}")]
    Store(String),

    /// Source configuration lookup failure.
    #[error("source config lookup failed for '{source_id}': {reason}")]
    SourceConfig { source_id: String, reason: String },

    /// HTTP transport failure talking to an embedding provider.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The provider responded with a body we could not interpret.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Whether a retry with backoff has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ProviderTransient(_) | Error::Http(_) | Error::Timeout(_)
        )
    }
}
