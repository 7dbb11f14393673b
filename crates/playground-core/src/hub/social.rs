//! Direct messages, friends and achievements.

use std::collections::BTreeMap;

use playground_db::{Batch, Store, keys};
use playground_types::models::achievements;
use playground_types::packets::{
    AchievementsPacket, FriendRequestPacket, FriendUpdatePacket, GetAchievementsPacket,
    GetMessagesPacket, MessagePacket, MessagesPacket,
};
use playground_types::record::{flag, parse_flag};
use playground_types::{Character, ConnectionId, Friend, HashRecord, Message, Packet, Presence};

use super::Hub;
use crate::error::CoreError;
use crate::world::{load_character, load_record, new_id};

/// Messages returned by `get_messages`.
const CONVERSATION_PAGE: i64 = 100;

/// Every achievement a character can earn.
const ACHIEVEMENTS: &[&str] = &[
    achievements::COMPANY_TOUR,
    achievements::HANGOUTS,
    achievements::SPONSOR_QUEUE,
    achievements::DJ,
];

impl Hub {
    /// `message`: persist and deliver to both sides.
    pub(super) async fn message(&mut self, me: &Character, p: MessagePacket) -> Result<(), CoreError> {
        let mut message = p.message;
        if !message.text.is_ascii() || message.to.is_empty() {
            tracing::debug!(character = %me.id, "Dropping invalid direct message");
            return Ok(());
        }

        message.id = new_id();
        message.from.clone_from(&me.id);
        message.timestamp = self.ctx.clock.now().timestamp();

        self.ctx
            .store
            .apply(
                Batch::new()
                    .hset(keys::message(&message.id), message.to_fields())
                    .rpush(keys::conversation(&message.from, &message.to), message.id.as_str()),
            )
            .await?;

        self.broadcast(Packet::Message(MessagePacket { message })).await
    }

    /// `get_messages`: the latest page of a conversation, oldest first.
    pub(super) async fn get_messages(
        &mut self,
        sender: ConnectionId,
        me: &Character,
        p: GetMessagesPacket,
    ) -> Result<(), CoreError> {
        let store = self.ctx.store.clone();
        let ids = store
            .lrange(&keys::conversation(&me.id, &p.recipient), -CONVERSATION_PAGE, -1)
            .await?;

        let mut messages = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(message) = load_record::<Message>(store.as_ref(), &keys::message(&id), &id).await? {
                messages.push(message);
            }
        }

        self.send_to(
            sender,
            &Packet::Messages(MessagesPacket {
                messages,
                recipient: p.recipient,
            }),
        );
        Ok(())
    }

    /// `friend_request`: a request, or an acceptance when the other side
    /// already asked.
    pub(super) async fn friend_request(&mut self, me: &Character, p: FriendRequestPacket) -> Result<(), CoreError> {
        let store = self.ctx.store.clone();
        let recipient = p.recipient_id;
        if recipient.is_empty() || recipient == me.id {
            return Ok(());
        }

        let accepted = store.sismember(&keys::friend_requests(&me.id), &recipient).await?;
        if !accepted {
            store
                .apply(Batch::new().sadd(keys::friend_requests(&recipient), me.id.as_str()))
                .await?;
            let friend = friend_entry(store.as_ref(), &recipient, &me.id, self.ctx.clock.now()).await?;
            return self
                .broadcast(Packet::FriendUpdate(FriendUpdatePacket {
                    recipient_id: recipient,
                    friend,
                }))
                .await;
        }

        store
            .apply(
                Batch::new()
                    .srem(keys::friend_requests(&me.id), recipient.as_str())
                    .sadd(keys::friends(&me.id), recipient.as_str())
                    .sadd(keys::friends(&recipient), me.id.as_str()),
            )
            .await?;

        let threshold = self.ctx.settings.achievements.num_friends;
        let mut batch = Batch::new();
        for id in [me.id.as_str(), recipient.as_str()] {
            if store.scard(&keys::friends(id)).await? == threshold {
                batch = batch.hset_one(keys::achievements(id), achievements::HANGOUTS, flag(true));
            }
        }
        store.apply(batch).await?;

        let now = self.ctx.clock.now();
        let theirs = friend_entry(store.as_ref(), &recipient, &me.id, now).await?;
        let mine = friend_entry(store.as_ref(), &me.id, &recipient, now).await?;
        self.broadcast(Packet::FriendUpdate(FriendUpdatePacket {
            recipient_id: recipient.clone(),
            friend: theirs,
        }))
        .await?;
        self.broadcast(Packet::FriendUpdate(FriendUpdatePacket {
            recipient_id: me.id.clone(),
            friend: mine,
        }))
        .await
    }

    /// `get_achievements`: the sender's, or another character's.
    pub(super) async fn get_achievements(
        &mut self,
        sender: ConnectionId,
        me: &Character,
        p: GetAchievementsPacket,
    ) -> Result<(), CoreError> {
        let id = if p.id.is_empty() { me.id.clone() } else { p.id };
        let stored = self.ctx.store.hgetall(&keys::achievements(&id)).await?;

        let mut earned: BTreeMap<String, bool> = ACHIEVEMENTS
            .iter()
            .map(|name| ((*name).to_owned(), false))
            .collect();
        for (name, value) in stored {
            earned.insert(name, parse_flag(&value));
        }

        self.send_to(
            sender,
            &Packet::Achievements(AchievementsPacket {
                id,
                achievements: earned,
            }),
        );
        Ok(())
    }
}

/// How `friend_id` appears in the friend list of `owner`.
async fn friend_entry(
    store: &dyn Store,
    owner: &str,
    friend_id: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Friend, CoreError> {
    let character = load_character(store, friend_id).await?.unwrap_or_default();
    let status = match store.get(&keys::character_active(friend_id)).await?.as_deref() {
        Some("true") => Presence::Online,
        Some(_) => Presence::Away,
        None => Presence::Offline,
    };

    Ok(Friend {
        id: friend_id.to_owned(),
        name: character.name,
        school: character.school,
        status,
        teammate: store.sismember(&keys::teammates(owner), friend_id).await?,
        pending: store.sismember(&keys::friend_requests(owner), friend_id).await?,
        last_seen: Some(now),
    })
}
