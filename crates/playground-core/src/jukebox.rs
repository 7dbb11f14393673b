//! The fleet-wide song queue.
//!
//! The queue is a list of song ids; `queuestatus` holds the unix second at
//! which the playing song ends and `currentsong` its id. The queue has two
//! states: playing until `queuestatus`, and idle once that time has passed.
//! Only the leader calls [`advance`]; the check-then-pop is idempotent, so
//! a brief second leader cannot pop twice for one expiry.

use chrono::{DateTime, Utc};
use playground_db::{Batch, DbError, Store, keys};
use playground_types::Song;
use playground_types::packets::PlaySongPacket;

use crate::world::load_record;

/// Unix second at which the current song ends; 0 when nothing ever played.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn song_end(store: &dyn Store) -> Result<i64, DbError> {
    Ok(store
        .get(keys::QUEUE_STATUS)
        .await?
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(0))
}

/// Start the next song if the current one has ended.
///
/// Returns the `play_song` packet to broadcast when a song was popped.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn advance(store: &dyn Store, now: DateTime<Utc>) -> Result<Option<PlaySongPacket>, DbError> {
    let now = now.timestamp();
    if song_end(store).await? > now {
        return Ok(None);
    }
    if store.llen(keys::SONGS).await? == 0 {
        return Ok(None);
    }
    let Some(id) = store.lpop(keys::SONGS).await? else {
        return Ok(None);
    };

    let song = load_record::<Song>(store, &keys::song(&id), &id)
        .await?
        .unwrap_or_else(|| Song {
            id: id.clone(),
            ..Song::default()
        });
    let end = now.saturating_add(i64::from(song.duration));

    store
        .apply(
            Batch::new()
                .set(keys::QUEUE_STATUS, end.to_string())
                .set(keys::CURRENT_SONG, id.as_str()),
        )
        .await?;

    tracing::info!(song = %id, title = %song.title, end, "Started next song");
    Ok(Some(PlaySongPacket { song, start: 0, end }))
}

/// The playing song, with `start` set to the seconds already played.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn current(store: &dyn Store, now: DateTime<Utc>) -> Result<PlaySongPacket, DbError> {
    let end = song_end(store).await?;
    let id = store.get(keys::CURRENT_SONG).await?.unwrap_or_default();
    let song = if id.is_empty() {
        Song::default()
    } else {
        load_record::<Song>(store, &keys::song(&id), &id)
            .await?
            .unwrap_or_else(|| Song {
                id: id.clone(),
                ..Song::default()
            })
    };

    let start = if song.duration == 0 {
        0
    } else {
        let duration = i64::from(song.duration);
        let remaining = end.saturating_sub(now.timestamp());
        duration.saturating_sub(remaining).clamp(0, duration)
    };

    Ok(PlaySongPacket { song, start, end })
}

/// Every queued song in play order.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn queue(store: &dyn Store) -> Result<Vec<Song>, DbError> {
    let mut songs = Vec::new();
    for id in store.lrange(keys::SONGS, 0, -1).await? {
        if let Some(song) = load_record::<Song>(store, &keys::song(&id), &id).await? {
            songs.push(song);
        }
    }
    Ok(songs)
}
