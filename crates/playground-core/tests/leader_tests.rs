//! Leader election, dead ingest reaping and the song queue, driven tick by
//! tick over a shared in-memory store.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::missing_panics_doc
)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use playground_core::leader::{TickOutcome, reap};
use playground_core::{Broadcaster, Context, ManualClock, Secrets, Services, Settings, Ticker};
use playground_db::{Batch, MemoryStore, Store, keys};
use playground_types::{Character, HashRecord, IngestId, Packet, Role, Song};
use tokio::sync::mpsc;

fn noon() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-09-12T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

struct Node {
    ingest: IngestId,
    ticker: Ticker,
    relayed: mpsc::Receiver<Packet>,
}

async fn node(store: &Arc<MemoryStore>, clock: &Arc<ManualClock>) -> Node {
    let ingest = IngestId::generate();
    let mut settings = Settings::default();
    settings.ticker.npc_enabled = false;

    let ctx = Context::new(
        store.clone(),
        ingest.clone(),
        settings,
        Secrets::with_jwt_secret("leader-test-secret"),
        Services::disabled(),
    )
    .with_clock(clock.clone());

    store.connect_client(ingest.as_str()).await;
    store
        .apply(Batch::new().rpush(keys::INGESTS, ingest.as_str()))
        .await
        .unwrap();

    let (relay, relayed) = mpsc::channel(64);
    let broadcaster = Broadcaster::new(ctx.store.clone(), ingest.clone(), relay);
    Node {
        ingest,
        ticker: Ticker::new(ctx, broadcaster),
        relayed,
    }
}

async fn place(store: &MemoryStore, id: &str, room: &str, ingest: &IngestId) {
    let mut character = Character::new(id, id.to_uppercase(), Role::Hacker);
    character.room = room.to_owned();
    character.ingest = ingest.to_string();
    store
        .apply(
            Batch::new()
                .hset(keys::character(id), character.to_fields())
                .sadd(keys::room_characters(room), id)
                .sadd(keys::ingest_characters(ingest.as_str()), id),
        )
        .await
        .unwrap();
}

fn leader_of(outcome: &TickOutcome, me: &IngestId) -> Option<String> {
    match outcome {
        TickOutcome::Leader { .. } => Some(me.to_string()),
        TickOutcome::Follower { leader } => leader.clone(),
    }
}

#[tokio::test]
async fn stable_fleets_agree_on_the_leader() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at(noon()));
    let mut a = node(&store, &clock).await;
    let mut b = node(&store, &clock).await;

    let seen_by_a = a.ticker.tick().await.unwrap();
    let seen_by_b = b.ticker.tick().await.unwrap();

    assert!(matches!(seen_by_a, TickOutcome::Leader { .. }));
    assert_eq!(leader_of(&seen_by_a, &a.ingest), leader_of(&seen_by_b, &b.ingest));
    assert_eq!(leader_of(&seen_by_b, &b.ingest), Some(a.ingest.to_string()));
}

#[tokio::test]
async fn survivor_takes_over_and_reaps_the_dead_ingest() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at(noon()));
    let a = node(&store, &clock).await;
    let mut b = node(&store, &clock).await;
    place(&store, "k", "home", &a.ingest).await;
    place(&store, "j", "home", &b.ingest).await;

    assert!(matches!(b.ticker.tick().await.unwrap(), TickOutcome::Follower { .. }));

    store.disconnect_client(a.ingest.as_str()).await;

    let TickOutcome::Leader { reaped, .. } = b.ticker.tick().await.unwrap() else {
        panic!("the survivor should lead");
    };
    assert_eq!(reaped, vec![a.ingest.to_string()]);

    let home = store.smembers(&keys::room_characters("home")).await.unwrap();
    assert_eq!(home, vec!["j".to_owned()]);
    assert_eq!(store.hget(&keys::character("k"), "ingest").await.unwrap(), None);
    assert_eq!(store.hget(&keys::character("k"), "name").await.unwrap().as_deref(), Some("K"));
    assert_eq!(
        store.lrange(keys::INGESTS, 0, -1).await.unwrap(),
        vec![b.ingest.to_string()]
    );

    let Packet::Leave(leave) = b.relayed.recv().await.unwrap() else {
        panic!("expected a leave");
    };
    assert_eq!(leave.character.id, "k");
    assert_eq!(leave.room, "home");
}

#[tokio::test]
async fn reaping_an_empty_ingest_changes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let dead = IngestId::generate();
    let alive = IngestId::generate();
    place(&store, "j", "home", &alive).await;

    assert!(reap(store.as_ref(), dead.as_str()).await.unwrap().is_empty());
    assert!(reap(store.as_ref(), dead.as_str()).await.unwrap().is_empty());

    assert_eq!(
        store.smembers(&keys::room_characters("home")).await.unwrap(),
        vec!["j".to_owned()]
    );
    assert!(store.sismember(&keys::ingest_characters(alive.as_str()), "j").await.unwrap());
}

#[tokio::test]
async fn expired_songs_advance_on_the_leader_tick() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at(noon()));
    let mut a = node(&store, &clock).await;

    let song = Song {
        id: "s".to_owned(),
        vid_code: "abc".to_owned(),
        title: "Three minutes".to_owned(),
        duration: 180,
        ..Song::default()
    };
    let past = noon().timestamp().saturating_sub(10);
    store
        .apply(
            Batch::new()
                .hset(keys::song("s"), song.to_fields())
                .rpush(keys::SONGS, "s")
                .set(keys::QUEUE_STATUS, past.to_string()),
        )
        .await
        .unwrap();

    let TickOutcome::Leader { played, .. } = a.ticker.tick().await.unwrap() else {
        panic!("a lone ingest leads");
    };
    assert_eq!(played.as_deref(), Some("s"));

    let end = noon().timestamp().saturating_add(180);
    assert_eq!(store.get(keys::QUEUE_STATUS).await.unwrap(), Some(end.to_string()));
    assert_eq!(store.get(keys::CURRENT_SONG).await.unwrap().as_deref(), Some("s"));
    assert_eq!(store.llen(keys::SONGS).await.unwrap(), 0);

    let Packet::PlaySong(play) = a.relayed.recv().await.unwrap() else {
        panic!("expected play_song");
    };
    assert_eq!(play.start, 0);
    assert_eq!(play.end, end);
    assert_eq!(play.song.title, "Three minutes");
}

#[tokio::test]
async fn reaping_spares_characters_that_moved_to_a_live_ingest() {
    let store = Arc::new(MemoryStore::new());
    let dead = IngestId::generate();
    let live = IngestId::generate();
    place(&store, "k", "home", &live).await;
    // Left behind by a join on `live` that raced the dead ingest's cleanup.
    store
        .apply(Batch::new().sadd(keys::ingest_characters(dead.as_str()), "k"))
        .await
        .unwrap();

    let leaves = reap(store.as_ref(), dead.as_str()).await.unwrap();

    assert!(leaves.is_empty());
    assert!(store.sismember(&keys::room_characters("home"), "k").await.unwrap());
    assert_eq!(
        store.hget(&keys::character("k"), "ingest").await.unwrap().as_deref(),
        Some(live.as_str())
    );
    assert!(store.smembers(&keys::ingest_characters(dead.as_str())).await.unwrap().is_empty());
    assert!(store.sismember(&keys::ingest_characters(live.as_str()), "k").await.unwrap());
}

#[tokio::test]
async fn playing_songs_are_never_cut_short() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at(noon()));
    let mut a = node(&store, &clock).await;

    for id in ["s", "t"] {
        let song = Song {
            id: id.to_owned(),
            duration: 180,
            ..Song::default()
        };
        store
            .apply(
                Batch::new()
                    .hset(keys::song(id), song.to_fields())
                    .rpush(keys::SONGS, id),
            )
            .await
            .unwrap();
    }

    let first = a.ticker.tick().await.unwrap();
    assert!(matches!(first, TickOutcome::Leader { played: Some(_), .. }));
    let end = store.get(keys::QUEUE_STATUS).await.unwrap();

    clock.advance(Duration::seconds(179));
    let second = a.ticker.tick().await.unwrap();
    assert!(matches!(second, TickOutcome::Leader { played: None, .. }));
    assert_eq!(store.get(keys::QUEUE_STATUS).await.unwrap(), end);
    assert_eq!(store.llen(keys::SONGS).await.unwrap(), 1);

    clock.advance(Duration::seconds(1));
    let third = a.ticker.tick().await.unwrap();
    assert!(matches!(third, TickOutcome::Leader { played: Some(ref id), .. } if id == "t"));
    assert_eq!(store.llen(keys::SONGS).await.unwrap(), 0);
}
