//! The shared store as seen by the rest of the ingest.
//!
//! [`Store`] is the narrow key-value interface every component talks to:
//! strings, hashes, sets, lists, pipelined write batches, the connected
//! client list and publish/subscribe. [`crate::DragonflyPool`] implements it
//! against a real server; [`crate::MemoryStore`] implements it in process for
//! tests.
//!
//! No operation spanning several keys is transactional. A [`Batch`] is sent
//! as one pipeline, which saves round trips but may be applied partially if
//! the connection drops half way.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::DbError;

/// One write inside a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    /// `SET key value`.
    Set {
        /// Key.
        key: String,
        /// Value.
        value: String,
    },
    /// `DEL key`.
    Del {
        /// Key.
        key: String,
    },
    /// `HSET key field value [field value ...]`.
    HSet {
        /// Key.
        key: String,
        /// Fields to set.
        fields: Vec<(String, String)>,
    },
    /// `HDEL key field`.
    HDel {
        /// Key.
        key: String,
        /// Field to remove.
        field: String,
    },
    /// `SADD key member`.
    SAdd {
        /// Key.
        key: String,
        /// Member to add.
        member: String,
    },
    /// `SREM key member`.
    SRem {
        /// Key.
        key: String,
        /// Member to remove.
        member: String,
    },
    /// `RPUSH key value`.
    RPush {
        /// Key.
        key: String,
        /// Value to append.
        value: String,
    },
    /// `LREM key count value`.
    LRem {
        /// Key.
        key: String,
        /// How many occurrences to remove; zero removes all.
        count: i64,
        /// Value to remove.
        value: String,
    },
}

/// An ordered list of writes sent to the store in one pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    writes: Vec<Write>,
}

impl Batch {
    /// An empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `SET`.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.writes.push(Write::Set {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Queue `DEL`.
    #[must_use]
    pub fn del(mut self, key: impl Into<String>) -> Self {
        self.writes.push(Write::Del { key: key.into() });
        self
    }

    /// Queue `HSET`. Empty field lists are skipped.
    #[must_use]
    pub fn hset(mut self, key: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        if !fields.is_empty() {
            self.writes.push(Write::HSet {
                key: key.into(),
                fields,
            });
        }
        self
    }

    /// Queue `HSET` of a single field.
    #[must_use]
    pub fn hset_one(
        self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.hset(key, vec![(field.into(), value.into())])
    }

    /// Queue `HDEL`.
    #[must_use]
    pub fn hdel(mut self, key: impl Into<String>, field: impl Into<String>) -> Self {
        self.writes.push(Write::HDel {
            key: key.into(),
            field: field.into(),
        });
        self
    }

    /// Queue `SADD`.
    #[must_use]
    pub fn sadd(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.writes.push(Write::SAdd {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    /// Queue `SREM`.
    #[must_use]
    pub fn srem(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.writes.push(Write::SRem {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    /// Queue `RPUSH`.
    #[must_use]
    pub fn rpush(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.writes.push(Write::RPush {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Queue `LREM`.
    #[must_use]
    pub fn lrem(mut self, key: impl Into<String>, count: i64, value: impl Into<String>) -> Self {
        self.writes.push(Write::LRem {
            key: key.into(),
            count,
            value: value.into(),
        });
        self
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Number of queued writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// The queued writes in order.
    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    /// Consume the batch.
    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}

/// A message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Channel the message arrived on.
    pub channel: String,
    /// Message body.
    pub payload: String,
}

/// A dedicated subscription connection.
#[async_trait]
pub trait Subscriber: Send {
    /// Start receiving messages published on `channel`.
    async fn subscribe(&mut self, channel: &str) -> Result<(), DbError>;

    /// Wait for the next message on any subscribed channel.
    ///
    /// Returns `None` once the subscription connection is gone for good.
    async fn next_message(&mut self) -> Option<BusMessage>;
}

/// The key-value store shared by every ingest.
#[async_trait]
pub trait Store: Send + Sync {
    /// `GET`.
    async fn get(&self, key: &str) -> Result<Option<String>, DbError>;

    /// `EXISTS`.
    async fn exists(&self, key: &str) -> Result<bool, DbError>;

    /// `HGET`.
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, DbError>;

    /// `HGETALL`. Missing keys read as an empty map.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, DbError>;

    /// `HINCRBY`, returning the new value.
    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64, DbError>;

    /// `SMEMBERS`.
    async fn smembers(&self, key: &str) -> Result<Vec<String>, DbError>;

    /// `SISMEMBER`.
    async fn sismember(&self, key: &str, member: &str) -> Result<bool, DbError>;

    /// `SCARD`.
    async fn scard(&self, key: &str) -> Result<u64, DbError>;

    /// `LRANGE` with Redis index semantics (negative indexes count from the
    /// end, both bounds inclusive).
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, DbError>;

    /// `LLEN`.
    async fn llen(&self, key: &str) -> Result<u64, DbError>;

    /// `LPOP` of a single element.
    async fn lpop(&self, key: &str) -> Result<Option<String>, DbError>;

    /// Send every write in `batch` as one pipeline.
    async fn apply(&self, batch: Batch) -> Result<(), DbError>;

    /// Names of every client currently connected to the store
    /// (`CLIENT LIST`), unnamed clients excluded.
    async fn client_names(&self) -> Result<Vec<String>, DbError>;

    /// `PUBLISH`.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), DbError>;

    /// Open a dedicated subscription connection.
    async fn subscriber(&self) -> Result<Box<dyn Subscriber>, DbError>;

    /// `FLUSHALL`. Destroys every key; used by `--reset` and tests.
    async fn flush(&self) -> Result<(), DbError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_preserves_order_and_skips_empty_hashes() {
        let batch = Batch::new()
            .sadd("rooms", "home")
            .hset("room:home", Vec::new())
            .hset_one("character:k", "room", "home")
            .lrem("ingests", 0, "ingest-a");
        assert_eq!(batch.len(), 3);
        assert!(matches!(batch.writes().first(), Some(Write::SAdd { .. })));
        assert!(matches!(batch.writes().last(), Some(Write::LRem { count: 0, .. })));
        assert!(Batch::new().is_empty());
    }
}
