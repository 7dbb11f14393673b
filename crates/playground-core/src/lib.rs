//! Real-time engine of the Playground ingest.
//!
//! Every ingest process runs one [`Hub`] owning its WebSocket connections,
//! one bus listener relaying broadcasts from other ingests, and one
//! [`Ticker`] that does global work while this process is the leader.
//! All cross-process coordination goes through the shared store.
//!
//! # Modules
//!
//! - [`config`] -- Layered settings and secrets
//! - [`context`] -- Store, settings, clock and collaborators bundled for handlers
//! - [`clock`] -- Wall-clock abstraction
//! - [`services`] -- SSO, video lookup, mail and SMS collaborators
//! - [`auth`] -- Bearer tokens
//! - [`world`] -- Character and room records
//! - [`resolver`] -- Broadcast packet to delivery addresses
//! - [`bus`] -- Cross-node publish and subscribe
//! - [`hub`] -- The connection-owning actor and its packet handlers
//! - [`jukebox`] -- The global song queue
//! - [`leader`] -- Leader election, dead ingest cleanup and the ticker
//! - [`npc`] -- The idle wandering character
//! - [`error`] -- Core error type

pub mod auth;
pub mod bus;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod hub;
pub mod jukebox;
pub mod leader;
pub mod npc;
pub mod resolver;
pub mod services;
pub mod world;

pub use bus::Broadcaster;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Secrets, Settings};
pub use context::Context;
pub use error::CoreError;
pub use hub::{Hub, HubHandle, Registration};
pub use leader::Ticker;
pub use services::Services;
