//! Error types for the service

use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum Error {
    /// Required configuration absent or unusable; raised before any I/O
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing or malformed request parameters
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller credential missing or mismatched
    #[error("Authorization error: {0}")]
    Auth(String),

    /// Storage tier error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Upstream data-source error
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Dispatch channel error
    #[error("Dispatch error: {0}")]
    Dispatch(String),
}

/// Storage tier errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Caller exceeded the backend's per-call record limit
    #[error("Chunk of {got} records exceeds backend limit of {limit}")]
    ChunkTooLarge { limit: usize, got: usize },

    /// Backend reported a failure (transport, throttling, internal)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Row or item could not be decoded into the expected shape
    #[error("Malformed row: {0}")]
    MalformedRow(String),
}

/// Data-source errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Fetching samples for an identifier failed
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Credential could not be resolved
    #[error("Credential error: {0}")]
    Credential(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
