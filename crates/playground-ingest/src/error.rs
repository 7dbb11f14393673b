//! Error types for the ingest binary.
//!
//! [`IngestError`] wraps every failure mode of startup and of the
//! long-running tasks so `main` can propagate with `?`.

/// Top-level error for the ingest binary.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Settings or secrets could not be loaded.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: playground_core::config::ConfigError,
    },

    /// An outbound collaborator could not be built.
    #[error("service error: {source}")]
    Service {
        /// The underlying service error.
        #[from]
        source: playground_core::services::ServiceError,
    },

    /// The store could not be reached or reset.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: playground_db::DbError,
    },

    /// The hub or the bus listener stopped.
    #[error("core error: {source}")]
    Core {
        /// The underlying core error.
        #[from]
        source: playground_core::CoreError,
    },

    /// The HTTP server failed to bind or stopped.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: playground_server::ServerError,
    },

    /// A background task panicked or was cancelled.
    #[error("task error: {message}")]
    Task {
        /// Description of the task failure.
        message: String,
    },
}
