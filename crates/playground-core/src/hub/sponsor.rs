//! Sponsor records and sponsor queues.
//!
//! A sponsor queue is the list `sponsor:<id>:hackerqueue` of waiting
//! hackers. Reps watching it are in `sponsor:<id>:subscribed`. After every
//! change each hacker learns their position and every watching rep gets
//! the full subscriber list.

use playground_db::{Batch, keys};
use playground_types::models::achievements;
use playground_types::packets::{
    GetSponsorPacket, QueueJoinPacket, QueueRemovePacket, QueueSubscriptionPacket,
    QueueUpdateHackerPacket, QueueUpdateSponsorPacket, SponsorPacket, UpdateSponsorPacket,
};
use playground_types::record::{field, flag};
use playground_types::{
    Character, ConnectionId, ErrorCode, HashRecord, Packet, QueueSubscriber, Role,
};

use super::Hub;
use crate::error::CoreError;
use crate::world::{load_record, load_sponsor};

impl Hub {
    /// `get_sponsor`.
    pub(super) async fn get_sponsor(&mut self, sender: ConnectionId, p: GetSponsorPacket) -> Result<(), CoreError> {
        if let Some(sponsor) = load_sponsor(self.ctx.store.as_ref(), &p.id).await? {
            self.send_to(sender, &Packet::Sponsor(SponsorPacket { sponsor }));
        }
        Ok(())
    }

    /// `update_sponsor`: edit the sender's own sponsor. Empty fields are
    /// left alone.
    pub(super) async fn update_sponsor(
        &mut self,
        sender: ConnectionId,
        me: &Character,
        p: UpdateSponsorPacket,
    ) -> Result<(), CoreError> {
        if me.sponsor_id.is_empty() {
            return Ok(());
        }

        let edit = p.sponsor;
        let mut fields = Vec::new();
        if !edit.challenges.is_empty() {
            fields.push(field("challenges", &edit.challenges));
        }
        if !edit.description.is_empty() {
            fields.push(field("description", &edit.description));
        }
        if !edit.url.is_empty() {
            fields.push(field("url", &edit.url));
        }
        if p.set_queue_open {
            fields.push(("queueOpen".to_owned(), flag(edit.queue_open)));
        }

        let store = self.ctx.store.clone();
        store
            .apply(Batch::new().hset(keys::sponsor(&me.sponsor_id), fields))
            .await?;

        self.get_sponsor(
            sender,
            GetSponsorPacket {
                id: me.sponsor_id.clone(),
            },
        )
        .await
    }

    /// `queue_join`.
    pub(super) async fn queue_join(
        &mut self,
        sender: ConnectionId,
        me: &Character,
        p: QueueJoinPacket,
    ) -> Result<(), CoreError> {
        let store = self.ctx.store.clone();
        let Some(sponsor) = load_sponsor(store.as_ref(), &p.sponsor_id).await? else {
            return Ok(());
        };
        if !sponsor.queue_open {
            return Ok(());
        }

        let queue_key = keys::sponsor_queue(&sponsor.id);
        if store.lrange(&queue_key, 0, -1).await?.contains(&me.id) {
            return Ok(());
        }

        if !me.is_college && me.role != Role::Organizer {
            self.send_to(sender, &Packet::error(ErrorCode::HIGH_SCHOOL_SPONSOR_QUEUE));
            return Ok(());
        }

        let subscriber = QueueSubscriber {
            id: me.id.clone(),
            name: me.name.clone(),
            school: me.school.clone(),
            grad_year: me.grad_year,
            interests: p.interests.join(","),
        };
        store
            .apply(
                Batch::new()
                    .rpush(queue_key, me.id.as_str())
                    .hset_one(keys::character(&me.id), "queueId", sponsor.id.as_str())
                    .hset(keys::queue_subscriber(&me.id), subscriber.to_fields())
                    .hset_one(keys::achievements(&me.id), achievements::SPONSOR_QUEUE, flag(true)),
            )
            .await?;

        self.update_character(sender, |c| c.queue_id.clone_from(&sponsor.id));
        tracing::info!(character = %me.id, sponsor = %sponsor.id, "Joined sponsor queue");
        self.queue_update(&sponsor.id).await
    }

    /// `queue_remove`: a hacker leaving, or a rep calling them in.
    pub(super) async fn queue_remove(&mut self, me: &Character, p: QueueRemovePacket) -> Result<(), CoreError> {
        let store = self.ctx.store.clone();
        store
            .apply(
                Batch::new()
                    .lrem(keys::sponsor_queue(&p.sponsor_id), 0, p.character_id.as_str())
                    .hset_one(keys::character(&p.character_id), "queueId", ""),
            )
            .await?;
        for conn in self.connections.values_mut() {
            if let Some(character) = conn.character.as_mut().filter(|c| c.id == p.character_id) {
                character.queue_id.clear();
            }
        }

        self.queue_update(&p.sponsor_id).await?;

        if me.role != Role::SponsorRep {
            return Ok(());
        }

        self.broadcast(Packet::QueueUpdateHacker(QueueUpdateHackerPacket {
            sponsor_id: p.sponsor_id.clone(),
            position: 0,
            url: p.zoom.clone(),
            character_ids: vec![p.character_id.clone()],
        }))
        .await?;

        let phone = store
            .hget(&keys::settings(&p.character_id), "phoneNumber")
            .await?
            .unwrap_or_default();
        let sponsor_name = store
            .hget(&keys::sponsor(&p.sponsor_id), "name")
            .await?
            .unwrap_or_default();
        if phone.is_empty() || sponsor_name.is_empty() {
            return Ok(());
        }

        let body = format!("It's your turn to talk to {sponsor_name}! Meet with them at {}", p.zoom);
        let sms = self.ctx.services.sms.clone();
        tokio::spawn(async move {
            if let Err(e) = sms.send(&phone, &body).await {
                tracing::warn!(error = %e, "Failed to send queue text");
            }
        });
        Ok(())
    }

    /// `queue_subscribe`: start watching a queue.
    pub(super) async fn queue_subscribe(&mut self, me: &Character, p: QueueSubscriptionPacket) -> Result<(), CoreError> {
        self.ctx
            .store
            .apply(Batch::new().sadd(keys::sponsor_subscribers(&p.sponsor_id), me.id.as_str()))
            .await?;
        self.queue_update(&p.sponsor_id).await
    }

    /// `queue_unsubscribe`.
    pub(super) async fn queue_unsubscribe(&mut self, me: &Character, p: QueueSubscriptionPacket) -> Result<(), CoreError> {
        self.ctx
            .store
            .apply(Batch::new().srem(keys::sponsor_subscribers(&p.sponsor_id), me.id.as_str()))
            .await?;
        Ok(())
    }

    /// Tell every waiting hacker their position and every watching rep the
    /// whole queue.
    async fn queue_update(&mut self, sponsor_id: &str) -> Result<(), CoreError> {
        let store = self.ctx.store.clone();
        let hackers = store.lrange(&keys::sponsor_queue(sponsor_id), 0, -1).await?;
        let reps = store.smembers(&keys::sponsor_subscribers(sponsor_id)).await?;

        let mut subscribers = Vec::with_capacity(hackers.len());
        for (index, hacker) in hackers.into_iter().enumerate() {
            let subscriber = load_record::<QueueSubscriber>(store.as_ref(), &keys::queue_subscriber(&hacker), &hacker)
                .await?
                .unwrap_or_else(|| QueueSubscriber {
                    id: hacker.clone(),
                    ..QueueSubscriber::default()
                });
            let position = u32::try_from(index.saturating_add(1)).unwrap_or(u32::MAX);

            self.broadcast(Packet::QueueUpdateHacker(QueueUpdateHackerPacket {
                sponsor_id: sponsor_id.to_owned(),
                position,
                url: String::new(),
                character_ids: vec![hacker],
            }))
            .await?;
            subscribers.push(subscriber);
        }

        self.broadcast(Packet::QueueUpdateSponsor(QueueUpdateSponsorPacket {
            sponsor_id: sponsor_id.to_owned(),
            subscribers,
            character_ids: reps,
        }))
        .await
    }
}
