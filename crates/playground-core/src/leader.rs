//! Leader election and the global ticker.
//!
//! Every ingest runs a [`Ticker`] once per interval, talking to the store
//! directly. Each tick it:
//!
//! 1. takes a liveness snapshot: the named store connections that look like
//!    ingest ids,
//! 2. picks the leader: the oldest registered ingest that is still live,
//! 3. if it is the leader, reaps dead ingests, advances the song queue and
//!    walks the NPC.
//!
//! Leadership is never stored; every node derives it fresh from the same
//! two inputs, so nodes that see the same inputs agree. A store error
//! aborts the tick and the next tick starts over.

use std::collections::HashSet;
use std::time::Duration;

use playground_db::{Batch, DbError, Store, keys};
use playground_types::packets::LeavePacket;
use playground_types::{IngestId, Packet};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::bus::Broadcaster;
use crate::context::Context;
use crate::error::CoreError;
use crate::world::load_character;
use crate::{jukebox, npc};

/// The first registered ingest that is also live.
pub fn elect<'a>(registered: &'a [String], live: &HashSet<String>) -> Option<&'a str> {
    registered
        .iter()
        .find(|id| live.contains(id.as_str()))
        .map(String::as_str)
}

/// Names of live store connections that belong to ingests.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn liveness(store: &dyn Store) -> Result<HashSet<String>, DbError> {
    Ok(store
        .client_names()
        .await?
        .into_iter()
        .filter(|name| IngestId::is_valid(name))
        .collect())
}

/// Remove every character owned by the dead ingest `dead` from its room
/// and forget the ingest.
///
/// Character records are kept, and characters whose record names another
/// ingest are left where they are. Returns a `leave` for each character
/// that was removed from a room. Reaping an ingest that owns nothing only
/// unregisters it.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn reap(store: &dyn Store, dead: &str) -> Result<Vec<LeavePacket>, DbError> {
    let owned = store.smembers(&keys::ingest_characters(dead)).await?;
    let mut batch = Batch::new();
    let mut leaves = Vec::new();

    for id in owned {
        let Some(character) = load_character(store, &id).await? else {
            continue;
        };
        // Moved to a live ingest since; that ingest owns its room entry.
        if character.ingest != dead {
            continue;
        }
        batch = batch
            .srem(keys::room_characters(&character.room), id.as_str())
            .hdel(keys::character(&id), "ingest");
        leaves.push(LeavePacket {
            room: character.room.clone(),
            character: character.public(),
        });
    }

    store
        .apply(
            batch
                .del(keys::ingest_characters(dead))
                .lrem(keys::INGESTS, 0, dead),
        )
        .await?;

    tracing::info!(ingest = dead, characters = leaves.len(), "Reaped dead ingest");
    Ok(leaves)
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another ingest (or nobody) leads.
    Follower {
        /// The leader this node computed.
        leader: Option<String>,
    },
    /// This ingest led the tick.
    Leader {
        /// Dead ingests reaped.
        reaped: Vec<String>,
        /// Song started, if any.
        played: Option<String>,
        /// Whether the NPC moved.
        npc_moved: bool,
    },
}

/// Periodic leader work for one ingest.
pub struct Ticker {
    ctx: Context,
    broadcaster: Broadcaster,
    ticks: u64,
    rng: SmallRng,
}

impl Ticker {
    /// Create a ticker that broadcasts through `broadcaster`.
    pub fn new(ctx: Context, broadcaster: Broadcaster) -> Self {
        Self {
            ctx,
            broadcaster,
            ticks: 0,
            rng: SmallRng::from_os_rng(),
        }
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// Returns the first store or broadcast error; the rest of the tick is
    /// skipped.
    pub async fn tick(&mut self) -> Result<TickOutcome, CoreError> {
        self.ticks = self.ticks.wrapping_add(1);
        let store = self.ctx.store.as_ref();

        let live = liveness(store).await?;
        let registered = store.lrange(keys::INGESTS, 0, -1).await?;
        let leader = elect(&registered, &live);
        if leader != Some(self.ctx.ingest.as_str()) {
            return Ok(TickOutcome::Follower {
                leader: leader.map(str::to_owned),
            });
        }

        let mut reaped = Vec::new();
        for id in registered.iter().filter(|id| !live.contains(id.as_str())) {
            for leave in reap(store, id).await? {
                self.broadcaster.broadcast(Packet::Leave(leave)).await?;
            }
            reaped.push(id.clone());
        }

        let played = match jukebox::advance(store, self.ctx.clock.now()).await? {
            Some(play) => {
                let id = play.song.id.clone();
                self.broadcaster.broadcast(Packet::PlaySong(play)).await?;
                Some(id)
            }
            None => None,
        };

        let npc_moved = self.walk_npc().await?;

        Ok(TickOutcome::Leader {
            reaped,
            played,
            npc_moved,
        })
    }

    async fn walk_npc(&mut self) -> Result<bool, CoreError> {
        let ticker = &self.ctx.settings.ticker;
        if !ticker.npc_enabled || ticker.npc_interval_ticks == 0 {
            return Ok(false);
        }
        if self.ticks.checked_rem(ticker.npc_interval_ticks) != Some(0) {
            return Ok(false);
        }

        let spot = npc::random_spot(&mut self.rng);
        match npc::wander(self.ctx.store.as_ref(), &self.ctx.settings.npc.id, spot).await? {
            Some(step) => {
                self.broadcaster.broadcast(Packet::Move(step)).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Tick forever at the configured interval.
    pub async fn run(mut self) {
        let period = Duration::from_millis(self.ctx.settings.ticker.interval_ms.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(ingest = %self.ctx.ingest, interval_ms = period.as_millis(), "Leader ticker started");

        loop {
            interval.tick().await;
            match self.tick().await {
                Ok(TickOutcome::Leader { reaped, played, .. }) if !reaped.is_empty() || played.is_some() => {
                    tracing::debug!(?reaped, ?played, "Leader tick");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Tick aborted"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn oldest_live_ingest_leads() {
        let registered = ids(&["a", "b", "c"]);
        let live: HashSet<String> = ["b", "c"].iter().map(|s| (*s).to_owned()).collect();
        assert_eq!(elect(&registered, &live), Some("b"));

        let everyone: HashSet<String> = registered.iter().cloned().collect();
        assert_eq!(elect(&registered, &everyone), Some("a"));
        assert_eq!(elect(&registered, &HashSet::new()), None);
        assert_eq!(elect(&[], &everyone), None);
    }

    #[test]
    fn election_ignores_snapshot_order() {
        let registered = ids(&["a", "b"]);
        let one: HashSet<String> = ["b", "a"].iter().map(|s| (*s).to_owned()).collect();
        let two: HashSet<String> = ["a", "b"].iter().map(|s| (*s).to_owned()).collect();
        assert_eq!(elect(&registered, &one), elect(&registered, &two));
    }
}
