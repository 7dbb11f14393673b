//! HTTP and WebSocket surface of the Playground ingest.
//!
//! - **`WebSocket` endpoint** (`/ws`): one reader task and one writer task
//!   per socket, both talking to the process's hub through a
//!   [`HubHandle`](playground_core::HubHandle)
//! - **REST endpoints** for rooms and sponsors
//! - **Health check** (`/health`)
//!
//! The server holds no world state of its own; everything is read from the
//! shared store or handled by the hub.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
