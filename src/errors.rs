//! Error types for the weather aggregation service.
//!
//! Every failure mode is modeled as a variant of [`AggregationError`] rather
//! than surfaced as a raw exception; HTTP-facing code maps each variant to a
//! concrete status line and never lets it cross a connection boundary.

use thiserror::Error;

/// Main error type shared by the server, store, publisher, and client.
#[derive(Error, Debug)]
pub enum AggregationError {
    /// The request line or headers did not form valid HTTP.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The request body was not valid JSON.
    #[error("parse error: {0}")]
    Parse(String),

    /// The body parsed as JSON but violated the record contract (e.g. missing `id`).
    #[error("semantic error: {0}")]
    Semantic(String),

    /// Requested station id is absent or has expired.
    #[error("not found: {0}")]
    NotFound(String),

    /// A publisher input file did not parse into a valid record.
    #[error("invalid record format: {0}")]
    InvalidFormat(String),

    /// A publisher record was missing the mandatory `id` field.
    #[error("record is missing required field 'id'")]
    MissingId,

    /// A publisher or client exhausted its retry budget.
    #[error("retries exhausted after {attempts} attempt(s): {message}")]
    RetryExhausted { attempts: u32, message: String },

    /// Command-line usage error (missing/invalid arguments).
    #[error("usage error: {0}")]
    Usage(String),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias used throughout the crate.
pub type AggregationResult<T> = std::result::Result<T, AggregationError>;

impl AggregationError {
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol(message.into())
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    pub fn semantic<S: Into<String>>(message: S) -> Self {
        Self::Semantic(message.into())
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }
}
