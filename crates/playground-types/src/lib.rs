//! Shared type definitions for the Playground ingest.
//!
//! Everything that crosses a process boundary lives here: the records kept
//! in the shared store, the packets spoken over WebSockets and the broadcast
//! bus, and the rules deciding who may send which packet.
//!
//! # Modules
//!
//! - [`ids`] -- Ingest and connection identifiers
//! - [`models`] -- Characters, rooms, songs, sponsors and social records
//! - [`record`] -- Flat hash mapping used by the store
//! - [`address`] -- Delivery addresses (`room`, `character:<id>`, `*`)
//! - [`packets`] -- The closed packet set and its parser
//! - [`permissions`] -- Per-packet authorization predicates
//! - [`error`] -- Protocol errors

pub mod address;
pub mod error;
pub mod ids;
pub mod models;
pub mod packets;
pub mod permissions;
pub mod record;

pub use address::Address;
pub use error::ProtocolError;
pub use ids::{ConnectionId, IngestId};
pub use models::{
    Character, Element, Friend, Hallway, Message, Presence, QueueSubscriber, Role, Room,
    RoomSnapshot, Settings, Song, Sponsor,
};
pub use packets::{ErrorCode, Packet, WIRE_TYPES};
pub use record::HashRecord;
