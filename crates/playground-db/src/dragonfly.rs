//! `Dragonfly` (Redis-compatible) implementation of [`Store`].
//!
//! One multiplexed [`Client`] serves every command and pipeline. Each
//! [`Subscriber`] gets its own connection, since a connection in subscribe
//! mode cannot issue regular commands.
//!
//! Both connections reconnect forever with exponential backoff. The command
//! connection is named after the ingest (`CLIENT SETNAME`) so that peers can
//! tell which ingests are alive from `CLIENT LIST`; the name is reapplied
//! after every reconnect. Subscribers resubscribe to their channels after a
//! reconnect; messages published while they were down are lost.

use std::collections::HashMap;

use async_trait::async_trait;
use fred::clients::SubscriberClient;
use fred::interfaces::{ClientInterface, EventInterface};
use fred::prelude::*;
use fred::types::{Message, Value};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::error::DbError;
use crate::store::{Batch, BusMessage, Store, Subscriber, Write};

/// Reconnect forever, backing off from 100ms up to 30s between attempts.
fn reconnect_policy() -> ReconnectPolicy {
    ReconnectPolicy::new_exponential(0, 100, 30_000, 2)
}

fn builder(config: &Config) -> Builder {
    let mut builder = Builder::from_config(config.clone());
    builder.set_policy(reconnect_policy());
    builder
}

/// Log every reconnect of `client`. `rename` restores a command
/// connection's name, which the server forgets on reconnect.
fn watch_reconnects<C>(client: &C, role: &'static str, rename: Option<(Client, String)>)
where
    C: EventInterface,
{
    let mut reconnects = client.reconnect_rx();
    tokio::spawn(async move {
        loop {
            match reconnects.recv().await {
                Ok(server) => {
                    tracing::warn!(role, ?server, "Reconnected to Dragonfly");
                    let Some((client, name)) = &rename else {
                        continue;
                    };
                    let renamed: Result<(), _> = client.client_setname(name.as_str()).await;
                    if let Err(e) = renamed {
                        tracing::warn!(?server, error = %e, "Failed to rename reconnected client");
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
    config: Config,
}

impl DragonflyPool {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`. When `name` is given
    /// the connection is registered under it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str, name: Option<&str>) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = builder(&config).build()?;
        client.init().await?;

        if let Some(name) = name {
            let _: () = client.client_setname(name).await?;
        }
        watch_reconnects(&client, "commands", name.map(|n| (client.clone(), n.to_owned())));

        tracing::info!(name = name.unwrap_or_default(), "Connected to Dragonfly");
        Ok(Self { client, config })
    }

    /// Return a reference to the underlying [`Client`].
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

/// Extract client names from `CLIENT LIST` output.
///
/// Each line is a series of `key=value` pairs; unnamed clients carry an
/// empty `name=` and are skipped.
pub fn parse_client_names(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| {
            line.split_whitespace()
                .find_map(|pair| pair.strip_prefix("name="))
                .filter(|name| !name.is_empty())
                .map(str::to_owned)
        })
        .collect()
}

#[async_trait]
impl Store for DragonflyPool {
    async fn get(&self, key: &str) -> Result<Option<String>, DbError> {
        Ok(self.client.get(key).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool, DbError> {
        let count: u32 = self.client.exists(key).await?;
        Ok(count > 0)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, DbError> {
        Ok(self.client.hget(key, field).await?)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, DbError> {
        Ok(self.client.hgetall(key).await?)
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64, DbError> {
        Ok(self.client.hincrby(key, field, delta).await?)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, DbError> {
        Ok(self.client.smembers(key).await?)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, DbError> {
        Ok(self.client.sismember(key, member).await?)
    }

    async fn scard(&self, key: &str) -> Result<u64, DbError> {
        Ok(self.client.scard(key).await?)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, DbError> {
        Ok(self.client.lrange(key, start, stop).await?)
    }

    async fn llen(&self, key: &str) -> Result<u64, DbError> {
        Ok(self.client.llen(key).await?)
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>, DbError> {
        Ok(self.client.lpop(key, None).await?)
    }

    async fn apply(&self, batch: Batch) -> Result<(), DbError> {
        if batch.is_empty() {
            return Ok(());
        }

        let pipeline = self.client.pipeline();
        for write in batch.into_writes() {
            match write {
                Write::Set { key, value } => {
                    let _: () = pipeline.set(key, value, None, None, false).await?;
                }
                Write::Del { key } => {
                    let _: () = pipeline.del(key).await?;
                }
                Write::HSet { key, fields } => {
                    let map: HashMap<String, String> = fields.into_iter().collect();
                    let _: () = pipeline.hset(key, map).await?;
                }
                Write::HDel { key, field } => {
                    let _: () = pipeline.hdel(key, field).await?;
                }
                Write::SAdd { key, member } => {
                    let _: () = pipeline.sadd(key, member).await?;
                }
                Write::SRem { key, member } => {
                    let _: () = pipeline.srem(key, member).await?;
                }
                Write::RPush { key, value } => {
                    let _: () = pipeline.rpush(key, value).await?;
                }
                Write::LRem { key, count, value } => {
                    let _: () = pipeline.lrem(key, count, value).await?;
                }
            }
        }
        let _: Vec<Value> = pipeline.all().await?;
        Ok(())
    }

    async fn client_names(&self) -> Result<Vec<String>, DbError> {
        let raw: String = self.client.client_list::<String, String>(None, None).await?;
        Ok(parse_client_names(&raw))
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), DbError> {
        let _: i64 = self.client.publish(channel, payload).await?;
        Ok(())
    }

    async fn subscriber(&self) -> Result<Box<dyn Subscriber>, DbError> {
        let client = builder(&self.config).build_subscriber_client()?;
        let messages = client.message_rx();
        client.init().await?;
        watch_reconnects(&client, "subscriber", None);
        let resubscribe = client.manage_subscriptions();
        Ok(Box::new(DragonflySubscriber {
            client,
            messages,
            resubscribe,
        }))
    }

    async fn flush(&self) -> Result<(), DbError> {
        let _: () = self.client.flushall(false).await?;
        Ok(())
    }
}

/// Subscription connection backed by its own [`SubscriberClient`].
struct DragonflySubscriber {
    client: SubscriberClient,
    messages: broadcast::Receiver<Message>,
    resubscribe: JoinHandle<()>,
}

impl Drop for DragonflySubscriber {
    fn drop(&mut self) {
        self.resubscribe.abort();
    }
}

#[async_trait]
impl Subscriber for DragonflySubscriber {
    async fn subscribe(&mut self, channel: &str) -> Result<(), DbError> {
        let _: () = self.client.subscribe(channel).await?;
        tracing::debug!(channel, "Subscribed");
        Ok(())
    }

    async fn next_message(&mut self) -> Option<BusMessage> {
        loop {
            match self.messages.recv().await {
                Ok(message) => {
                    let channel = message.channel.to_string();
                    match message.value.convert::<String>() {
                        Ok(payload) => return Some(BusMessage { channel, payload }),
                        Err(e) => tracing::warn!(channel, error = %e, "Dropping non-text message"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Subscriber lagged; messages lost");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn both_connections_reconnect() {
        let config = Config::from_url("redis://127.0.0.1:6379").unwrap();
        let commands = builder(&config).build().unwrap();
        let subscriber = builder(&config).build_subscriber_client().unwrap();

        assert!(commands.client_reconnect_policy().is_some());
        assert!(subscriber.client_reconnect_policy().is_some());
    }

    #[test]
    fn client_names_skip_unnamed_connections() {
        let raw = "id=3 addr=127.0.0.1:5000 laddr=127.0.0.1:6379 fd=8 name=ingest-aa age=10 idle=0\n\
                   id=4 addr=127.0.0.1:5001 laddr=127.0.0.1:6379 fd=9 name= age=3 idle=3\n\
                   id=5 addr=127.0.0.1:5002 laddr=127.0.0.1:6379 fd=10 name=redis-cli age=1 idle=1\n";
        assert_eq!(parse_client_names(raw), vec!["ingest-aa", "redis-cli"]);
        assert!(parse_client_names("").is_empty());
    }
}
