//! Song submission and queue queries.

use chrono::{DateTime, Duration, Utc};
use playground_db::{Batch, keys};
use playground_types::models::achievements;
use playground_types::packets::{Empty, SongPacket, SongsPacket};
use playground_types::record::flag;
use playground_types::{Character, ConnectionId, ErrorCode, HashRecord, Packet, Role, Song};

use super::{Completion, Hub};
use crate::error::CoreError;
use crate::jukebox;
use crate::services::{ServiceError, VideoInfo};
use crate::world::new_id;

/// A `song` submission waiting on its video lookup.
pub(super) struct SongLookup {
    sender: ConnectionId,
    character_id: String,
    role: Role,
    packet: SongPacket,
    first_time: bool,
    lookup: Result<VideoInfo, ServiceError>,
}

impl Hub {
    /// `song`: queue a video, or remove a queued one.
    pub(super) async fn song(&mut self, sender: ConnectionId, me: &Character, p: SongPacket) -> Result<(), CoreError> {
        let store = self.ctx.store.clone();

        if p.remove {
            store
                .apply(
                    Batch::new()
                        .del(keys::song(&p.song.id))
                        .lrem(keys::SONGS, 1, p.song.id.as_str()),
                )
                .await?;
            return self.broadcast(Packet::Song(p)).await;
        }

        let now = self.ctx.clock.now();
        let (allowed_at, first_time) = self.cooldown(&me.id, now).await?;
        if first_time {
            self.send_to(sender, &Packet::JukeboxWarning(Empty {}));
        }
        if me.role != Role::Organizer && allowed_at > now {
            self.send_to(sender, &Packet::error(ErrorCode::SONG_COOLDOWN));
            return Ok(());
        }

        let video = self.ctx.services.video.clone();
        let completions = self.completions.clone();
        let character_id = me.id.clone();
        let role = me.role;
        tokio::spawn(async move {
            let lookup = video.lookup(&p.song.vid_code).await;
            let done = Completion::Song(Box::new(SongLookup {
                sender,
                character_id,
                role,
                packet: p,
                first_time,
                lookup,
            }));
            if completions.send(done).await.is_err() {
                tracing::debug!(connection = %sender, "Hub stopped before a video lookup finished");
            }
        });
        Ok(())
    }

    /// When `character_id` may next submit, and whether it never has.
    async fn cooldown(&self, character_id: &str, now: DateTime<Utc>) -> Result<(DateTime<Utc>, bool), CoreError> {
        Ok(match self.ctx.store.get(&keys::jukebox_timestamp(character_id)).await? {
            Some(raw) => (
                DateTime::parse_from_rfc3339(raw.trim()).map_or(now, |t| t.with_timezone(&Utc)),
                false,
            ),
            None => (now, true),
        })
    }

    /// Queue a song whose video lookup has come back.
    ///
    /// The cooldown is checked again: another submission from the same
    /// character may have been queued while this lookup was in flight.
    pub(super) async fn finish_song(&mut self, done: SongLookup) -> Result<(), CoreError> {
        let SongLookup {
            sender,
            character_id,
            role,
            packet,
            first_time,
            lookup,
        } = done;
        if !self.connections.contains_key(&sender) {
            tracing::debug!(connection = %sender, "Connection closed during video lookup");
            return Ok(());
        }

        let now = self.ctx.clock.now();
        let (allowed_at, _) = self.cooldown(&character_id, now).await?;
        if role != Role::Organizer && allowed_at > now {
            self.send_to(sender, &Packet::error(ErrorCode::SONG_COOLDOWN));
            return Ok(());
        }

        let info = match lookup {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(vid_code = %packet.song.vid_code, error = %e, "Video lookup failed");
                self.send_to(sender, &Packet::error(ErrorCode::SONG_LOOKUP_FAILED));
                return Ok(());
            }
        };
        if info.duration_secs >= self.ctx.settings.jukebox.max_song_seconds {
            self.send_to(sender, &Packet::error(ErrorCode::SONG_TOO_LONG));
            return Ok(());
        }

        let song = Song {
            id: new_id(),
            vid_code: packet.song.vid_code,
            title: info.title,
            thumbnail_url: info.thumbnail_url,
            duration: info.duration_secs,
            character_id: character_id.clone(),
        };
        let next_allowed = now + Duration::minutes(self.ctx.settings.jukebox.cooldown_minutes);

        self.ctx
            .store
            .apply(
                Batch::new()
                    .hset(keys::song(&song.id), song.to_fields())
                    .rpush(keys::SONGS, song.id.as_str())
                    .set(keys::jukebox_timestamp(&character_id), next_allowed.to_rfc3339())
                    .hset_one(keys::achievements(&character_id), achievements::DJ, flag(true)),
            )
            .await?;

        tracing::info!(song = %song.id, character = %character_id, duration = song.duration, "Song queued");
        self.broadcast(Packet::Song(SongPacket {
            song,
            requires_warning: first_time,
            remove: false,
        }))
        .await
    }

    /// `get_songs`: the queue, to the sender.
    pub(super) async fn get_songs(&mut self, sender: ConnectionId) -> Result<(), CoreError> {
        let songs = jukebox::queue(self.ctx.store.as_ref()).await?;
        self.send_to(sender, &Packet::Songs(SongsPacket { songs }));
        Ok(())
    }

    /// `get_current_song`: the playing song and how far in it is, to the sender.
    pub(super) async fn get_current_song(&mut self, sender: ConnectionId) -> Result<(), CoreError> {
        let current = jukebox::current(self.ctx.store.as_ref(), self.ctx.clock.now()).await?;
        self.send_to(sender, &Packet::PlaySong(current));
        Ok(())
    }
}
