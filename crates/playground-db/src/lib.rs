//! Shared store access for the Playground ingest.
//!
//! Every ingest process coordinates exclusively through one Redis-compatible
//! store (`Dragonfly` in production): durable world records live in hashes,
//! sets and lists, and cross-node broadcasts travel over its pub/sub.
//!
//! ```text
//! Hub handlers / Leader ticker / REST
//!     |
//!     +-- Store trait ----> DragonflyPool (fred)     production
//!     |                 \-> MemoryStore              tests
//!     |
//!     +-- Subscriber -----> dedicated pub/sub connection
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The [`Store`] and [`Subscriber`] traits and write batches
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) implementation
//! - [`memory`] -- In-process implementation
//! - [`keys`] -- Key and channel names
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod keys;
pub mod memory;
pub mod store;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyPool;
pub use error::DbError;
pub use memory::MemoryStore;
pub use store::{Batch, BusMessage, Store, Subscriber, Write};
