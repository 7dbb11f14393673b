//! The per-process connection hub.
//!
//! One [`Hub`] runs per ingest as a single actor. It owns every live
//! connection and is the only code that touches them; everything else talks
//! to it through a [`HubHandle`]:
//!
//! ```text
//! reader tasks --register/unregister/inbound--> Hub loop --outbound--> writer tasks
//! bus listener, ticker ------relay------------> Hub loop
//! ```
//!
//! Calls to outside services run on their own tasks and come back to the
//! loop as completions, so a slow lookup never stalls other connections.
//!
//! Outbound delivery never waits: a connection whose queue is full is
//! dropped and run through the disconnect procedure once the current event
//! is finished.
//!
//! # Submodules
//!
//! - `dispatch` -- Frame parsing, permission checks and handler routing
//! - `session` -- Login, presence and profile handlers, disconnects
//! - `room` -- Movement, room changes and room editing
//! - `social` -- Direct messages, friends and achievements
//! - `jukebox` -- Song submission and queue queries
//! - `sponsor` -- Sponsor records and sponsor queues

mod dispatch;
mod jukebox;
mod room;
mod session;
mod social;
mod sponsor;

use std::collections::HashMap;

use playground_types::{Address, Character, ConnectionId, Packet};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::bus::{self, Broadcaster};
use crate::context::Context;
use crate::error::CoreError;
use crate::resolver;

/// A new socket asking to join the hub.
#[derive(Debug)]
pub struct Registration {
    /// Connection id.
    pub id: ConnectionId,
    /// Queue drained by the connection's writer task.
    pub outbound: mpsc::Sender<String>,
}

/// One text frame read from a socket.
#[derive(Debug)]
pub struct Inbound {
    /// Connection that sent the frame.
    pub sender: ConnectionId,
    /// Raw frame.
    pub frame: String,
}

/// An outside call finished off the hub loop.
enum Completion {
    Song(Box<jukebox::SongLookup>),
    Sso(Box<session::SsoLogin>),
}

/// A live socket as the hub sees it.
#[derive(Debug)]
struct Connection {
    outbound: mpsc::Sender<String>,
    character: Option<Character>,
}

/// Cloneable entry point into a running [`Hub`].
#[derive(Clone)]
pub struct HubHandle {
    register: mpsc::Sender<Registration>,
    unregister: mpsc::Sender<ConnectionId>,
    inbound: mpsc::Sender<Inbound>,
    relay: mpsc::Sender<Packet>,
}

impl HubHandle {
    /// Add a connection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::HubClosed`] if the hub has stopped.
    pub async fn register(&self, registration: Registration) -> Result<(), CoreError> {
        self.register
            .send(registration)
            .await
            .map_err(|_closed| CoreError::HubClosed)
    }

    /// Remove a connection, running the disconnect procedure if it was bound.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::HubClosed`] if the hub has stopped.
    pub async fn unregister(&self, id: ConnectionId) -> Result<(), CoreError> {
        self.unregister
            .send(id)
            .await
            .map_err(|_closed| CoreError::HubClosed)
    }

    /// Hand a frame read from `sender` to the hub.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::HubClosed`] if the hub has stopped.
    pub async fn dispatch(&self, sender: ConnectionId, frame: String) -> Result<(), CoreError> {
        self.inbound
            .send(Inbound { sender, frame })
            .await
            .map_err(|_closed| CoreError::HubClosed)
    }

    /// Channel feeding packets from other nodes into local delivery.
    pub fn relay(&self) -> mpsc::Sender<Packet> {
        self.relay.clone()
    }

    /// A broadcaster whose local half goes through this hub.
    pub fn broadcaster(&self, ctx: &Context) -> Broadcaster {
        Broadcaster::new(ctx.store.clone(), ctx.ingest.clone(), self.relay())
    }
}

/// The connection-owning actor.
pub struct Hub {
    ctx: Context,
    connections: HashMap<ConnectionId, Connection>,
    register_rx: mpsc::Receiver<Registration>,
    unregister_rx: mpsc::Receiver<ConnectionId>,
    inbound_rx: mpsc::Receiver<Inbound>,
    relay_rx: mpsc::Receiver<Packet>,
    completions: mpsc::Sender<Completion>,
    completions_rx: mpsc::Receiver<Completion>,
    pending_drops: Vec<ConnectionId>,
    rng: SmallRng,
}

impl Hub {
    /// Create a hub and the handle used to reach it.
    pub fn new(ctx: Context) -> (Self, HubHandle) {
        let inbound_capacity = ctx.settings.hub.inbound_queue.max(1);
        let (register, register_rx) = mpsc::channel(inbound_capacity);
        let (unregister, unregister_rx) = mpsc::channel(inbound_capacity);
        let (inbound, inbound_rx) = mpsc::channel(inbound_capacity);
        let (relay, relay_rx) = mpsc::channel(inbound_capacity);
        let (completions, completions_rx) = mpsc::channel(inbound_capacity);

        let hub = Self {
            ctx,
            connections: HashMap::new(),
            register_rx,
            unregister_rx,
            inbound_rx,
            relay_rx,
            completions,
            completions_rx,
            pending_drops: Vec::new(),
            rng: SmallRng::from_os_rng(),
        };
        let handle = HubHandle {
            register,
            unregister,
            inbound,
            relay,
        };
        (hub, handle)
    }

    /// Run the control loop until every handle is dropped.
    ///
    /// The hub holds a sender for its own completions, so the loop ends when
    /// the inbound channel closes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PositionPersistence`] when a move cannot be
    /// written; the node must stop. Every other handler failure is logged
    /// and the loop continues.
    pub async fn run(mut self) -> Result<(), CoreError> {
        tracing::info!(ingest = %self.ctx.ingest, "Hub started");

        loop {
            // Registrations first: a reader's first frame must never
            // overtake its own registration.
            let result = tokio::select! {
                biased;
                Some(registration) = self.register_rx.recv() => {
                    self.register(registration);
                    Ok(())
                }
                Some(id) = self.unregister_rx.recv() => {
                    self.disconnect(id).await;
                    Ok(())
                }
                Some(done) = self.completions_rx.recv() => self.complete(done).await,
                inbound = self.inbound_rx.recv() => match inbound {
                    Some(inbound) => self.dispatch(inbound).await,
                    None => break,
                },
                Some(packet) = self.relay_rx.recv() => {
                    self.apply(&packet);
                    Ok(())
                }
            };

            match result {
                Ok(()) => {}
                Err(e @ CoreError::PositionPersistence(_)) => {
                    tracing::error!(error = %e, "Fatal store failure; stopping hub");
                    return Err(e);
                }
                Err(e) => tracing::warn!(error = %e, "Handler failed"),
            }

            self.flush_drops().await;
        }

        tracing::info!("Hub stopped");
        Ok(())
    }

    fn register(&mut self, registration: Registration) {
        tracing::debug!(connection = %registration.id, "Connection registered");
        self.connections.insert(
            registration.id,
            Connection {
                outbound: registration.outbound,
                character: None,
            },
        );
    }

    async fn complete(&mut self, done: Completion) -> Result<(), CoreError> {
        match done {
            Completion::Song(lookup) => self.finish_song(*lookup).await,
            Completion::Sso(login) => self.finish_sso(*login).await,
        }
    }

    /// Send `packet` to every node, this one included.
    ///
    /// Local connections receive it immediately instead of waiting for the
    /// bus to echo it back.
    async fn broadcast(&mut self, packet: Packet) -> Result<(), CoreError> {
        bus::publish(self.ctx.store.as_ref(), &self.ctx.ingest, &packet).await?;
        self.apply(&packet);
        Ok(())
    }

    /// Deliver a broadcast packet to the matching local connections.
    fn apply(&mut self, packet: &Packet) {
        if let Some((character, client_id)) = resolver::joining_character(packet) {
            let id = character.id.clone();
            let keep = client_id.parse().ok().map(ConnectionId);
            self.evict(&id, keep);
        }

        for delivery in resolver::route(packet) {
            self.deliver_local(&delivery.address, &delivery.packet);
        }
    }

    /// Drop every local connection bound to `character_id` other than
    /// `keep`, without the disconnect procedure: the character now belongs
    /// to the newer connection.
    fn evict(&mut self, character_id: &str, keep: Option<ConnectionId>) {
        let stale: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(id, conn)| {
                Some(**id) != keep
                    && conn.character.as_ref().is_some_and(|c| c.id == character_id)
            })
            .map(|(id, _)| *id)
            .collect();

        for id in stale {
            tracing::info!(connection = %id, character = character_id, "Disconnecting stale connection");
            self.connections.remove(&id);
        }
    }

    fn deliver_local(&mut self, address: &Address, packet: &Packet) {
        let frame = match packet.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, kind = packet.wire_type(), "Failed to encode packet");
                return;
            }
        };

        for (id, conn) in &self.connections {
            let Some(character) = &conn.character else {
                continue;
            };
            if address.matches(character) && !try_deliver(&conn.outbound, frame.clone()) {
                self.pending_drops.push(*id);
            }
        }
    }

    /// Send `packet` to one connection only.
    fn send_to(&mut self, id: ConnectionId, packet: &Packet) {
        let Some(conn) = self.connections.get(&id) else {
            return;
        };
        let frame = match packet.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, kind = packet.wire_type(), "Failed to encode packet");
                return;
            }
        };
        if !try_deliver(&conn.outbound, frame) {
            self.pending_drops.push(id);
        }
    }

    /// Disconnect every connection whose queue overflowed. Disconnecting can
    /// overflow further queues, so this runs until nothing is pending.
    async fn flush_drops(&mut self) {
        while let Some(id) = self.pending_drops.pop() {
            if self.connections.contains_key(&id) {
                tracing::warn!(connection = %id, "Outbound queue full; dropping connection");
                self.disconnect(id).await;
            }
        }
    }

    fn character_of(&self, id: ConnectionId) -> Option<&Character> {
        self.connections.get(&id).and_then(|c| c.character.as_ref())
    }

    fn update_character(&mut self, id: ConnectionId, update: impl FnOnce(&mut Character)) {
        if let Some(character) = self.connections.get_mut(&id).and_then(|c| c.character.as_mut()) {
            update(character);
        }
    }
}

fn try_deliver(outbound: &mpsc::Sender<String>, frame: String) -> bool {
    match outbound.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_) | TrySendError::Closed(_)) => false,
    }
}
