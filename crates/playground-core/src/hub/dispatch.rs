//! From raw frame to handler.

use playground_types::{Character, ConnectionId, Packet, Role};

use super::{Hub, Inbound};
use crate::error::CoreError;

impl Hub {
    /// Parse, authorize and handle one frame.
    ///
    /// Unparseable frames and refused packets are dropped; the connection
    /// stays open.
    pub(super) async fn dispatch(&mut self, inbound: Inbound) -> Result<(), CoreError> {
        let Inbound { sender, frame } = inbound;
        if !self.connections.contains_key(&sender) {
            return Ok(());
        }

        let packet = match Packet::parse(frame.as_bytes()) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(connection = %sender, error = %e, "Dropping invalid frame");
                return Ok(());
            }
        };

        let me = self.character_of(sender).cloned();
        let role = me.as_ref().map_or(Role::Guest, |c| c.role);
        if !packet.permitted(me.as_ref().map(|c| c.id.as_str()), role) {
            tracing::debug!(
                connection = %sender,
                kind = packet.wire_type(),
                "Permission denied; dropping packet"
            );
            return Ok(());
        }

        match packet {
            Packet::Join(p) => self.login(sender, p, true).await,
            Packet::Auth(p) => self.login(sender, p, false).await,
            Packet::EmailCode(p) => self.email_code(p).await,
            other => match me {
                Some(me) => self.handle(sender, me, other).await,
                None => Ok(()),
            },
        }
    }

    async fn handle(&mut self, sender: ConnectionId, me: Character, packet: Packet) -> Result<(), CoreError> {
        match packet {
            Packet::AddEmail(p) => self.add_email(p).await,
            Packet::Register(p) => self.register_profile(sender, &me, p).await,
            Packet::Settings(p) => self.update_settings(sender, &me, p).await,
            Packet::Status(p) => self.status(&me, p).await,

            Packet::Chat(p) => self.chat(&me, p).await,
            Packet::Dance(p) => self.dance(&me, p).await,
            Packet::Move(p) => self.move_to(sender, &me, p).await,
            Packet::Teleport(p) => self.teleport(sender, &me, p, false).await,
            Packet::TeleportHome(p) => self.teleport(sender, &me, p, true).await,
            Packet::WardrobeChange(p) => self.wardrobe_change(sender, &me, p).await,
            Packet::ElementToggle(p) => self.element_toggle(&me, p).await,
            Packet::ElementAdd(p) => self.element_add(&me, p).await,
            Packet::ElementUpdate(p) => self.element_update(&me, p).await,
            Packet::ElementDelete(p) => self.element_delete(&me, p).await,
            Packet::HallwayAdd(p) => self.hallway_add(&me, p).await,
            Packet::HallwayUpdate(p) => self.hallway_update(&me, p).await,
            Packet::HallwayDelete(p) => self.hallway_delete(&me, p).await,

            Packet::Message(p) => self.message(&me, p).await,
            Packet::GetMessages(p) => self.get_messages(sender, &me, p).await,
            Packet::FriendRequest(p) => self.friend_request(&me, p).await,
            Packet::GetAchievements(p) => self.get_achievements(sender, &me, p).await,

            Packet::Song(p) => self.song(sender, &me, p).await,
            Packet::GetSongs(_) => self.get_songs(sender).await,
            Packet::GetCurrentSong(_) => self.get_current_song(sender).await,

            Packet::GetSponsor(p) => self.get_sponsor(sender, p).await,
            Packet::UpdateSponsor(p) => self.update_sponsor(sender, &me, p).await,
            Packet::QueueJoin(p) => self.queue_join(sender, &me, p).await,
            Packet::QueueRemove(p) => self.queue_remove(&me, p).await,
            Packet::QueueSubscribe(p) => self.queue_subscribe(&me, p).await,
            Packet::QueueUnsubscribe(p) => self.queue_unsubscribe(&me, p).await,

            other => {
                tracing::debug!(kind = other.wire_type(), "Ignoring server-only packet");
                Ok(())
            }
        }
    }
}
