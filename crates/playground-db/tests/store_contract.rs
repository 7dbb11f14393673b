//! Behavioral contract shared by every [`Store`] implementation.
//!
//! The same checks run against [`MemoryStore`] on every `cargo test` and
//! against a live Dragonfly when requested:
//!
//! ```bash
//! docker compose up -d dragonfly
//! cargo test -p playground-db -- --ignored
//! ```

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing
)]

use std::time::Duration;

use playground_db::{Batch, DragonflyPool, MemoryStore, Store, keys};

/// Dragonfly connection URL for the local Docker instance.
const DRAGONFLY_URL: &str = "redis://localhost:6379";

async fn hashes_and_sets(store: &dyn Store) {
    store
        .apply(
            Batch::new()
                .hset(
                    keys::character("k"),
                    vec![
                        ("name".to_owned(), "Kay".to_owned()),
                        ("room".to_owned(), "home".to_owned()),
                    ],
                )
                .sadd(keys::room_characters("home"), "k")
                .sadd(keys::room_characters("home"), "j"),
        )
        .await
        .unwrap();

    assert_eq!(
        store.hget(&keys::character("k"), "room").await.unwrap().as_deref(),
        Some("home")
    );
    assert_eq!(store.hgetall(&keys::character("k")).await.unwrap().len(), 2);
    assert!(store.hgetall(&keys::character("nobody")).await.unwrap().is_empty());
    assert!(store.sismember(&keys::room_characters("home"), "k").await.unwrap());
    assert_eq!(store.scard(&keys::room_characters("home")).await.unwrap(), 2);

    store
        .apply(Batch::new().srem(keys::room_characters("home"), "k"))
        .await
        .unwrap();
    assert_eq!(
        store.smembers(&keys::room_characters("home")).await.unwrap(),
        vec!["j".to_owned()]
    );

    assert_eq!(
        store
            .hincrby(&keys::character("k"), "numSponsorsVisited", 1)
            .await
            .unwrap(),
        1
    );
}

async fn lists(store: &dyn Store) {
    store
        .apply(
            Batch::new()
                .rpush(keys::SONGS, "a")
                .rpush(keys::SONGS, "b")
                .rpush(keys::SONGS, "c"),
        )
        .await
        .unwrap();

    assert_eq!(store.llen(keys::SONGS).await.unwrap(), 3);
    assert_eq!(store.lrange(keys::SONGS, -2, -1).await.unwrap(), vec!["b", "c"]);
    assert_eq!(store.lpop(keys::SONGS).await.unwrap().as_deref(), Some("a"));

    store
        .apply(Batch::new().lrem(keys::SONGS, 0, "c"))
        .await
        .unwrap();
    assert_eq!(store.lrange(keys::SONGS, 0, -1).await.unwrap(), vec!["b"]);
    assert_eq!(store.lpop(keys::SONGS).await.unwrap().as_deref(), Some("b"));
    assert_eq!(store.lpop(keys::SONGS).await.unwrap(), None);
}

async fn strings(store: &dyn Store) {
    assert_eq!(store.get(keys::QUEUE_STATUS).await.unwrap(), None);
    store
        .apply(Batch::new().set(keys::QUEUE_STATUS, "100"))
        .await
        .unwrap();
    assert_eq!(store.get(keys::QUEUE_STATUS).await.unwrap().as_deref(), Some("100"));
    assert!(store.exists(keys::QUEUE_STATUS).await.unwrap());
    store.apply(Batch::new().del(keys::QUEUE_STATUS)).await.unwrap();
    assert!(!store.exists(keys::QUEUE_STATUS).await.unwrap());
}

async fn pubsub(store: &dyn Store) {
    let mut subscriber = store.subscriber().await.unwrap();
    subscriber.subscribe(keys::GLOBAL_CHANNEL).await.unwrap();
    // Give a real server time to register the subscription.
    tokio::time::sleep(Duration::from_millis(50)).await;

    store.publish("elsewhere", "ignored").await.unwrap();
    store.publish(keys::GLOBAL_CHANNEL, "hello").await.unwrap();

    let message = tokio::time::timeout(Duration::from_secs(2), subscriber.next_message())
        .await
        .expect("no message within timeout")
        .expect("subscription closed");
    assert_eq!(message.channel, keys::GLOBAL_CHANNEL);
    assert_eq!(message.payload, "hello");
}

#[tokio::test]
async fn memory_store_contract() {
    let store = MemoryStore::new();
    hashes_and_sets(&store).await;
    lists(&store).await;
    strings(&store).await;
    pubsub(&store).await;
}

#[tokio::test]
async fn memory_store_client_list_tracks_connections() {
    let store = MemoryStore::new();
    store.connect_client("ingest-a").await;
    store.connect_client("ingest-b").await;
    store.connect_client("ingest-a").await;
    assert_eq!(store.client_names().await.unwrap(), vec!["ingest-a", "ingest-b"]);

    store.disconnect_client("ingest-a").await;
    assert_eq!(store.client_names().await.unwrap(), vec!["ingest-b"]);
}

#[tokio::test]
async fn memory_store_outage_fails_every_call() {
    let store = MemoryStore::new();
    store.set_available(false);
    assert!(store.get("x").await.is_err());
    assert!(store.apply(Batch::new().set("x", "1")).await.is_err());
    store.set_available(true);
    assert!(store.apply(Batch::new().set("x", "1")).await.is_ok());
}

#[tokio::test]
#[ignore = "requires a live Dragonfly on localhost:6379"]
async fn dragonfly_contract() {
    let store = DragonflyPool::connect(DRAGONFLY_URL, Some("ingest-00000000000000000000000000000000"))
        .await
        .expect("Failed to connect to Dragonfly");
    store.flush().await.expect("Failed to flush");

    hashes_and_sets(&store).await;
    lists(&store).await;
    strings(&store).await;
    pubsub(&store).await;

    let names = store.client_names().await.unwrap();
    assert!(names.iter().any(|n| n == "ingest-00000000000000000000000000000000"));

    store.flush().await.expect("Failed to flush");
}
