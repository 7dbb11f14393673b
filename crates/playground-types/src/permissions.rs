//! Authorization predicates for client packets.
//!
//! | Who | Packets |
//! |-----|---------|
//! | anyone | `join`, `auth`, `email_code` |
//! | any signed-in character | movement, chat, social, `get_*`, `settings`, `register`, song submission |
//! | organizers | room editing, `add_email`, song removal |
//! | hackers and organizers | `queue_join` |
//! | sponsor reps, or the hacker themself | `queue_remove` |
//! | sponsor reps and organizers | `update_sponsor`, queue subscriptions |
//!
//! Server-only packets are never accepted from a client.

use crate::models::Role;
use crate::packets::{Packet, WardrobeChangePacket};

/// Eye colors any character may pick.
pub const EYE_COLORS: &[&str] = &["#634e34", "#2e536f", "#3d671d", "#1c7847", "#497665", "#ff0000"];
/// Skin colors any character may pick.
pub const SKIN_COLORS: &[&str] = &["#8d5524", "#c68642", "#e0ac69", "#f1c27d", "#ffdbac"];
/// Shirt colors any character may pick.
pub const SHIRT_COLORS: &[&str] = &["#d6e2f9", "#75c05c", "#e4c3a4", "#f7f1d3", "#b93434"];
/// Pants colors any character may pick.
pub const PANTS_COLORS: &[&str] = &["#ecf0f1"];

impl Packet {
    /// Whether a client may send this packet.
    ///
    /// `sender` is the id of the character bound to the sending connection,
    /// `None` while the connection is unauthenticated.
    pub fn permitted(&self, sender: Option<&str>, role: Role) -> bool {
        let Some(sender) = sender.filter(|id| !id.is_empty()) else {
            return matches!(self, Self::Join(_) | Self::Auth(_) | Self::EmailCode(_));
        };
        let organizer = role == Role::Organizer;

        match self {
            Self::Join(_)
            | Self::Auth(_)
            | Self::EmailCode(_)
            | Self::Chat(_)
            | Self::Dance(_)
            | Self::Move(_)
            | Self::Teleport(_)
            | Self::TeleportHome(_)
            | Self::Status(_)
            | Self::Message(_)
            | Self::GetMessages(_)
            | Self::FriendRequest(_)
            | Self::ElementToggle(_)
            | Self::GetSongs(_)
            | Self::GetCurrentSong(_)
            | Self::GetAchievements(_)
            | Self::GetSponsor(_)
            | Self::Register(_)
            | Self::Settings(_) => true,

            Self::Song(p) => !p.remove || organizer,

            Self::AddEmail(_)
            | Self::ElementAdd(_)
            | Self::ElementUpdate(_)
            | Self::ElementDelete(_)
            | Self::HallwayAdd(_)
            | Self::HallwayUpdate(_)
            | Self::HallwayDelete(_) => organizer,

            Self::WardrobeChange(p) => organizer || p.uses_palette(),

            Self::QueueJoin(_) => matches!(role, Role::Hacker | Role::Organizer),
            Self::QueueRemove(p) => role == Role::SponsorRep || p.character_id == sender,
            Self::UpdateSponsor(_) | Self::QueueSubscribe(_) | Self::QueueUnsubscribe(_) => {
                matches!(role, Role::SponsorRep | Role::Organizer)
            }

            Self::Leave(_)
            | Self::Messages(_)
            | Self::FriendUpdate(_)
            | Self::Songs(_)
            | Self::PlaySong(_)
            | Self::JukeboxWarning(_)
            | Self::Init(_)
            | Self::Error(_)
            | Self::Achievements(_)
            | Self::Sponsor(_)
            | Self::QueueUpdateHacker(_)
            | Self::QueueUpdateSponsor(_) => false,
        }
    }
}

impl WardrobeChangePacket {
    /// Whether every color comes from the public palettes.
    pub fn uses_palette(&self) -> bool {
        EYE_COLORS.contains(&self.eye_color.as_str())
            && SKIN_COLORS.contains(&self.skin_color.as_str())
            && SHIRT_COLORS.contains(&self.shirt_color.as_str())
            && PANTS_COLORS.contains(&self.pants_color.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::{
        ChatPacket, Empty, JoinPacket, LeavePacket, QueueJoinPacket, QueueRemovePacket,
        SongPacket,
    };

    #[test]
    fn anonymous_senders_may_only_authenticate() {
        assert!(Packet::Join(JoinPacket::default()).permitted(None, Role::Guest));
        assert!(Packet::Auth(JoinPacket::default()).permitted(None, Role::Guest));
        assert!(!Packet::Chat(ChatPacket::default()).permitted(None, Role::Organizer));
        assert!(!Packet::Chat(ChatPacket::default()).permitted(Some(""), Role::Organizer));
        assert!(Packet::Chat(ChatPacket::default()).permitted(Some("k"), Role::Guest));
    }

    #[test]
    fn server_only_packets_are_refused() {
        assert!(!Packet::Leave(LeavePacket::default()).permitted(Some("k"), Role::Organizer));
        assert!(!Packet::JukeboxWarning(Empty {}).permitted(Some("k"), Role::Organizer));
    }

    #[test]
    fn song_removal_is_organizer_only() {
        let remove = Packet::Song(SongPacket {
            remove: true,
            ..SongPacket::default()
        });
        assert!(!remove.permitted(Some("k"), Role::Hacker));
        assert!(remove.permitted(Some("k"), Role::Organizer));
        assert!(Packet::Song(SongPacket::default()).permitted(Some("k"), Role::Hacker));
    }

    #[test]
    fn queue_rules() {
        let join = Packet::QueueJoin(QueueJoinPacket::default());
        assert!(join.permitted(Some("k"), Role::Hacker));
        assert!(join.permitted(Some("k"), Role::Organizer));
        assert!(!join.permitted(Some("k"), Role::Mentor));

        let remove_self = Packet::QueueRemove(QueueRemovePacket {
            character_id: "k".to_owned(),
            ..QueueRemovePacket::default()
        });
        assert!(remove_self.permitted(Some("k"), Role::Hacker));
        assert!(!remove_self.permitted(Some("j"), Role::Hacker));
        assert!(remove_self.permitted(Some("rep"), Role::SponsorRep));
    }

    #[test]
    fn wardrobe_is_palette_gated_except_for_organizers() {
        let palette = WardrobeChangePacket {
            eye_color: "#2e536f".to_owned(),
            skin_color: "#8d5524".to_owned(),
            shirt_color: "#b93434".to_owned(),
            pants_color: "#ecf0f1".to_owned(),
            ..WardrobeChangePacket::default()
        };
        let custom = WardrobeChangePacket {
            shirt_color: "#123456".to_owned(),
            ..palette.clone()
        };
        assert!(Packet::WardrobeChange(palette).permitted(Some("k"), Role::Hacker));
        assert!(!Packet::WardrobeChange(custom.clone()).permitted(Some("k"), Role::Hacker));
        assert!(Packet::WardrobeChange(custom).permitted(Some("k"), Role::Organizer));
    }
}
