//! Error types for the hub, bus and leader ticker.

use playground_db::DbError;
use playground_types::ProtocolError;

use crate::config::ConfigError;
use crate::services::ServiceError;

/// Errors surfaced by the core crate.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A store command failed.
    #[error("store error: {0}")]
    Store(#[from] DbError),

    /// A frame could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A packet or record could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A bearer token could not be issued or verified.
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// An outbound HTTP collaborator failed.
    #[error("external service error: {0}")]
    Service(#[from] ServiceError),

    /// Settings or secrets are invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A character position could not be persisted. The node stops.
    #[error("failed to persist position: {0}")]
    PositionPersistence(DbError),

    /// The hub loop is no longer running.
    #[error("hub is closed")]
    HubClosed,

    /// The broadcast subscription ended.
    #[error("broadcast subscription closed")]
    BusClosed,
}
