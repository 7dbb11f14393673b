//! Error types for the store layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`fred`] and [`serde_json`] errors.

/// Errors that can occur talking to the shared store.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A key holds a value of the wrong type for the operation.
    #[error("Wrong type at key {0}")]
    WrongType(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
