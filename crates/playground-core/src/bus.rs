//! Cross-node broadcast over the store's publish/subscribe.
//!
//! Every broadcast is wrapped in an [`Envelope`] naming the ingest that
//! sent it and published on [`GLOBAL_CHANNEL`](keys::GLOBAL_CHANNEL). Each
//! node listens on the global channel, the discovery channel and one
//! channel per ingest, and relays every packet it did not send itself into
//! its hub. The origin applies its own broadcasts locally instead of
//! waiting for them to loop back.
//!
//! Ordering is FIFO per channel only.

use std::sync::Arc;

use playground_db::{Batch, BusMessage, Store, keys};
use playground_types::{IngestId, Packet};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::CoreError;

/// A packet on the wire between ingests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Ingest that published the packet.
    pub origin: String,
    /// The packet.
    pub packet: Packet,
}

/// What a bus message means to the receiving node.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A new ingest announced itself.
    Peer(String),
    /// A packet from another ingest.
    Packet(Packet),
    /// Our own echo, our own announcement, or garbage.
    Ignored,
}

/// Publish `packet` to every other ingest.
///
/// # Errors
///
/// Returns an error if the packet cannot be encoded or the publish fails.
pub async fn publish(store: &dyn Store, origin: &IngestId, packet: &Packet) -> Result<(), CoreError> {
    let payload = serde_json::to_string(&Envelope {
        origin: origin.to_string(),
        packet: packet.clone(),
    })?;
    store.publish(keys::GLOBAL_CHANNEL, &payload).await?;
    Ok(())
}

/// Interpret one bus message as seen by `ingest`.
pub fn decode(ingest: &IngestId, message: &BusMessage) -> Incoming {
    if message.channel == keys::DISCOVERY_CHANNEL {
        if message.payload != ingest.as_str() && IngestId::is_valid(&message.payload) {
            return Incoming::Peer(message.payload.clone());
        }
        return Incoming::Ignored;
    }

    match serde_json::from_str::<Envelope>(&message.payload) {
        Ok(envelope) if envelope.origin == ingest.as_str() => Incoming::Ignored,
        Ok(envelope) => Incoming::Packet(envelope.packet),
        Err(e) => {
            tracing::warn!(channel = %message.channel, error = %e, "Dropping undecodable bus message");
            Incoming::Ignored
        }
    }
}

/// Register this ingest and relay packets from other ingests into `relay`
/// for the rest of the process lifetime.
///
/// Subscribes before announcing, so nothing published after the
/// announcement is missed.
///
/// # Errors
///
/// Returns [`CoreError::BusClosed`] when the subscription ends,
/// [`CoreError::HubClosed`] when the hub stops accepting packets, or a
/// store error if registration fails.
pub async fn listen(
    store: Arc<dyn Store>,
    ingest: IngestId,
    relay: mpsc::Sender<Packet>,
) -> Result<(), CoreError> {
    let mut subscriber = store.subscriber().await?;
    subscriber.subscribe(keys::GLOBAL_CHANNEL).await?;
    subscriber.subscribe(keys::DISCOVERY_CHANNEL).await?;
    subscriber.subscribe(ingest.as_str()).await?;

    for peer in store.lrange(keys::INGESTS, 0, -1).await? {
        if peer != ingest.as_str() {
            subscriber.subscribe(&peer).await?;
        }
    }

    store.apply(Batch::new().rpush(keys::INGESTS, ingest.as_str())).await?;
    store.publish(keys::DISCOVERY_CHANNEL, ingest.as_str()).await?;
    tracing::info!(%ingest, "Registered ingest and listening for broadcasts");

    loop {
        let Some(message) = subscriber.next_message().await else {
            tracing::error!("Broadcast subscription closed");
            return Err(CoreError::BusClosed);
        };

        match decode(&ingest, &message) {
            Incoming::Peer(peer) => {
                tracing::info!(%peer, "Discovered ingest");
                if let Err(e) = subscriber.subscribe(&peer).await {
                    tracing::warn!(%peer, error = %e, "Failed to subscribe to ingest");
                }
            }
            Incoming::Packet(packet) => {
                relay.send(packet).await.map_err(|_closed| CoreError::HubClosed)?;
            }
            Incoming::Ignored => {}
        }
    }
}

/// Broadcasts from outside the hub loop.
///
/// Publishes to other ingests and queues the packet on the hub's relay
/// channel so this node's connections receive it too.
#[derive(Clone)]
pub struct Broadcaster {
    store: Arc<dyn Store>,
    ingest: IngestId,
    relay: mpsc::Sender<Packet>,
}

impl Broadcaster {
    /// Create a broadcaster feeding `relay`.
    pub fn new(store: Arc<dyn Store>, ingest: IngestId, relay: mpsc::Sender<Packet>) -> Self {
        Self { store, ingest, relay }
    }

    /// Send `packet` to every node, this one included.
    ///
    /// # Errors
    ///
    /// Returns an error if the publish fails or the hub has stopped.
    pub async fn broadcast(&self, packet: Packet) -> Result<(), CoreError> {
        publish(self.store.as_ref(), &self.ingest, &packet).await?;
        self.relay
            .send(packet)
            .await
            .map_err(|_closed| CoreError::HubClosed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use playground_db::MemoryStore;
    use playground_types::packets::ChatPacket;

    fn chat(text: &str) -> Packet {
        Packet::Chat(ChatPacket {
            id: "k".to_owned(),
            room: "home".to_owned(),
            mssg: text.to_owned(),
        })
    }

    #[test]
    fn own_echoes_and_announcements_are_ignored() {
        let me = IngestId::generate();
        let other = IngestId::generate();

        let announcement = |id: &IngestId| BusMessage {
            channel: keys::DISCOVERY_CHANNEL.to_owned(),
            payload: id.to_string(),
        };
        assert_eq!(decode(&me, &announcement(&me)), Incoming::Ignored);
        assert_eq!(decode(&me, &announcement(&other)), Incoming::Peer(other.to_string()));

        let envelope = |origin: &IngestId| BusMessage {
            channel: keys::GLOBAL_CHANNEL.to_owned(),
            payload: serde_json::to_string(&Envelope {
                origin: origin.to_string(),
                packet: chat("hi"),
            })
            .unwrap(),
        };
        assert_eq!(decode(&me, &envelope(&me)), Incoming::Ignored);
        assert_eq!(decode(&me, &envelope(&other)), Incoming::Packet(chat("hi")));

        let garbage = BusMessage {
            channel: keys::GLOBAL_CHANNEL.to_owned(),
            payload: "{".to_owned(),
        };
        assert_eq!(decode(&me, &garbage), Incoming::Ignored);
    }

    #[tokio::test]
    async fn listeners_register_and_relay_peer_broadcasts() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let me = IngestId::generate();
        let other = IngestId::generate();
        let (relay, mut relayed) = mpsc::channel(8);

        tokio::spawn(listen(Arc::clone(&store), me.clone(), relay));

        // Wait for registration.
        for _ in 0..50 {
            if store.llen(keys::INGESTS).await.unwrap() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.lrange(keys::INGESTS, 0, -1).await.unwrap(), vec![me.to_string()]);

        publish(store.as_ref(), &me, &chat("mine")).await.unwrap();
        publish(store.as_ref(), &other, &chat("theirs")).await.unwrap();

        let packet = tokio::time::timeout(Duration::from_secs(1), relayed.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(packet, chat("theirs"));
    }
}
