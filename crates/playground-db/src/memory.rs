//! In-process [`Store`] used by tests and local experiments.
//!
//! Implements the subset of Redis semantics the ingest relies on, including
//! negative `LRANGE` indexes, `LREM` counts and pub/sub fan-out to every
//! [`Subscriber`]. Several simulated ingests may share one `MemoryStore`;
//! each registers its connection name with [`MemoryStore::connect_client`]
//! and can be "severed" with [`MemoryStore::disconnect_client`].

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};

use crate::error::DbError;
use crate::store::{Batch, BusMessage, Store, Subscriber, Write};

const BUS_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
enum Entry {
    Str(String),
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
    List(VecDeque<String>),
}

/// Shared in-memory store.
#[derive(Debug)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, Entry>>,
    clients: Mutex<Vec<String>>,
    bus: broadcast::Sender<BusMessage>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store with no connected clients.
    pub fn new() -> Self {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            data: Mutex::new(HashMap::new()),
            clients: Mutex::new(Vec::new()),
            bus,
            available: AtomicBool::new(true),
        }
    }

    /// Register a named client connection, as `CLIENT SETNAME` would.
    pub async fn connect_client(&self, name: &str) {
        let mut clients = self.clients.lock().await;
        if !clients.iter().any(|c| c == name) {
            clients.push(name.to_owned());
        }
    }

    /// Drop a named client connection, as if its process died.
    pub async fn disconnect_client(&self, name: &str) {
        self.clients.lock().await.retain(|c| c != name);
    }

    /// Make every subsequent operation fail (`false`) or succeed (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), DbError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DbError::Config("memory store unavailable".to_owned()))
        }
    }

    fn apply_one(data: &mut HashMap<String, Entry>, write: Write) -> Result<(), DbError> {
        match write {
            Write::Set { key, value } => {
                data.insert(key, Entry::Str(value));
            }
            Write::Del { key } => {
                data.remove(&key);
            }
            Write::HSet { key, fields } => {
                let entry = data
                    .entry(key.clone())
                    .or_insert_with(|| Entry::Hash(HashMap::new()));
                let Entry::Hash(hash) = entry else {
                    return Err(DbError::WrongType(key));
                };
                hash.extend(fields);
            }
            Write::HDel { key, field } => {
                if let Some(Entry::Hash(hash)) = data.get_mut(&key) {
                    hash.remove(&field);
                    if hash.is_empty() {
                        data.remove(&key);
                    }
                }
            }
            Write::SAdd { key, member } => {
                let entry = data
                    .entry(key.clone())
                    .or_insert_with(|| Entry::Set(BTreeSet::new()));
                let Entry::Set(set) = entry else {
                    return Err(DbError::WrongType(key));
                };
                set.insert(member);
            }
            Write::SRem { key, member } => {
                if let Some(Entry::Set(set)) = data.get_mut(&key) {
                    set.remove(&member);
                    if set.is_empty() {
                        data.remove(&key);
                    }
                }
            }
            Write::RPush { key, value } => {
                let entry = data
                    .entry(key.clone())
                    .or_insert_with(|| Entry::List(VecDeque::new()));
                let Entry::List(list) = entry else {
                    return Err(DbError::WrongType(key));
                };
                list.push_back(value);
            }
            Write::LRem { key, count, value } => {
                if let Some(Entry::List(list)) = data.get_mut(&key) {
                    remove_occurrences(list, count, &value);
                    if list.is_empty() {
                        data.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }
}

/// `LREM` semantics: positive counts remove from the head, negative from the
/// tail, zero removes every occurrence.
fn remove_occurrences(list: &mut VecDeque<String>, count: i64, value: &str) {
    let limit = usize::try_from(count.unsigned_abs()).unwrap_or(usize::MAX);
    let limit = if count == 0 { usize::MAX } else { limit };
    let mut removed = 0_usize;
    if count < 0 {
        let mut kept: VecDeque<String> = VecDeque::with_capacity(list.len());
        while let Some(item) = list.pop_back() {
            if removed < limit && item == value {
                removed = removed.saturating_add(1);
            } else {
                kept.push_front(item);
            }
        }
        *list = kept;
    } else {
        list.retain(|item| {
            if removed < limit && item == value {
                removed = removed.saturating_add(1);
                false
            } else {
                true
            }
        });
    }
}

/// Resolve Redis-style inclusive `[start, stop]` against a list length.
fn range_bounds(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let start = if start < 0 { start.saturating_add(len) } else { start }.max(0);
    let stop = if stop < 0 { stop.saturating_add(len) } else { stop }.min(len.saturating_sub(1));
    if start > stop || start >= len {
        return None;
    }
    let skip = usize::try_from(start).ok()?;
    let take = usize::try_from(stop.saturating_sub(start).saturating_add(1)).ok()?;
    Some((skip, take))
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DbError> {
        self.check()?;
        match self.data.lock().await.get(key) {
            None => Ok(None),
            Some(Entry::Str(value)) => Ok(Some(value.clone())),
            Some(_) => Err(DbError::WrongType(key.to_owned())),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, DbError> {
        self.check()?;
        Ok(self.data.lock().await.contains_key(key))
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, DbError> {
        self.check()?;
        match self.data.lock().await.get(key) {
            None => Ok(None),
            Some(Entry::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(DbError::WrongType(key.to_owned())),
        }
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, DbError> {
        self.check()?;
        match self.data.lock().await.get(key) {
            None => Ok(HashMap::new()),
            Some(Entry::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(DbError::WrongType(key.to_owned())),
        }
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64, DbError> {
        self.check()?;
        let mut data = self.data.lock().await;
        let entry = data
            .entry(key.to_owned())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        let Entry::Hash(hash) = entry else {
            return Err(DbError::WrongType(key.to_owned()));
        };
        let current: i64 = hash
            .get(field)
            .map(|v| v.parse().map_err(|_| DbError::WrongType(key.to_owned())))
            .transpose()?
            .unwrap_or(0);
        let next = current.saturating_add(delta);
        hash.insert(field.to_owned(), next.to_string());
        Ok(next)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, DbError> {
        self.check()?;
        match self.data.lock().await.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(DbError::WrongType(key.to_owned())),
        }
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, DbError> {
        self.check()?;
        match self.data.lock().await.get(key) {
            None => Ok(false),
            Some(Entry::Set(set)) => Ok(set.contains(member)),
            Some(_) => Err(DbError::WrongType(key.to_owned())),
        }
    }

    async fn scard(&self, key: &str) -> Result<u64, DbError> {
        self.check()?;
        match self.data.lock().await.get(key) {
            None => Ok(0),
            Some(Entry::Set(set)) => Ok(u64::try_from(set.len()).unwrap_or(u64::MAX)),
            Some(_) => Err(DbError::WrongType(key.to_owned())),
        }
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, DbError> {
        self.check()?;
        match self.data.lock().await.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::List(list)) => Ok(range_bounds(list.len(), start, stop)
                .map(|(skip, take)| list.iter().skip(skip).take(take).cloned().collect())
                .unwrap_or_default()),
            Some(_) => Err(DbError::WrongType(key.to_owned())),
        }
    }

    async fn llen(&self, key: &str) -> Result<u64, DbError> {
        self.check()?;
        match self.data.lock().await.get(key) {
            None => Ok(0),
            Some(Entry::List(list)) => Ok(u64::try_from(list.len()).unwrap_or(u64::MAX)),
            Some(_) => Err(DbError::WrongType(key.to_owned())),
        }
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>, DbError> {
        self.check()?;
        let mut data = self.data.lock().await;
        let popped = match data.get_mut(key) {
            None => return Ok(None),
            Some(Entry::List(list)) => (list.pop_front(), list.is_empty()),
            Some(_) => return Err(DbError::WrongType(key.to_owned())),
        };
        if popped.1 {
            data.remove(key);
        }
        Ok(popped.0)
    }

    async fn apply(&self, batch: Batch) -> Result<(), DbError> {
        self.check()?;
        let mut data = self.data.lock().await;
        for write in batch.into_writes() {
            Self::apply_one(&mut data, write)?;
        }
        Ok(())
    }

    async fn client_names(&self) -> Result<Vec<String>, DbError> {
        self.check()?;
        Ok(self.clients.lock().await.clone())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), DbError> {
        self.check()?;
        // No receivers is not an error for PUBLISH.
        let _ = self.bus.send(BusMessage {
            channel: channel.to_owned(),
            payload: payload.to_owned(),
        });
        Ok(())
    }

    async fn subscriber(&self) -> Result<Box<dyn Subscriber>, DbError> {
        self.check()?;
        Ok(Box::new(MemorySubscriber {
            messages: self.bus.subscribe(),
            channels: HashSet::new(),
        }))
    }

    async fn flush(&self) -> Result<(), DbError> {
        self.check()?;
        self.data.lock().await.clear();
        Ok(())
    }
}

struct MemorySubscriber {
    messages: broadcast::Receiver<BusMessage>,
    channels: HashSet<String>,
}

#[async_trait]
impl Subscriber for MemorySubscriber {
    async fn subscribe(&mut self, channel: &str) -> Result<(), DbError> {
        self.channels.insert(channel.to_owned());
        Ok(())
    }

    async fn next_message(&mut self) -> Option<BusMessage> {
        loop {
            match self.messages.recv().await {
                Ok(message) if self.channels.contains(&message.channel) => return Some(message),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
