//! The closed set of packets spoken over the WebSocket and the broadcast bus.
//!
//! Every frame is one JSON object whose `type` field selects the variant.
//! Payload fields are camelCase and default when absent, so a client may
//! send `{"type":"move","x":0.4,"y":0.6}` and let the server fill `id` and
//! `room`.
//!
//! Some variants are server-only (`init`, `leave`, `error`, ...). They parse
//! like any other packet so the bus can carry them, but
//! [`Packet::permitted`](crate::permissions) refuses them from clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::models::{
    Character, Element, Friend, Hallway, Message, QueueSubscriber, Role, RoomSnapshot, Settings,
    Song, Sponsor,
};

/// Fixed codes carried by `error` packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    /// Credentials were rejected.
    pub const BAD_LOGIN: Self = Self(1);
    /// High school students may not enter the nightclub.
    pub const HIGH_SCHOOL_NIGHT_CLUB: Self = Self(2);
    /// High school students may not join sponsor queues.
    pub const HIGH_SCHOOL_SPONSOR_QUEUE: Self = Self(4);
    /// Submitted song is too long.
    pub const SONG_TOO_LONG: Self = Self(400);
    /// Song submitted before the cooldown elapsed.
    pub const SONG_COOLDOWN: Self = Self(401);
    /// Video metadata lookup failed.
    pub const SONG_LOOKUP_FAILED: Self = Self(500);
}

/// Payload with no fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// `join` and `auth`: credentials in, character out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoinPacket {
    /// Display name (unused for credentialed logins).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// SSO token to exchange.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub quill_token: String,
    /// Previously issued bearer token.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,
    /// Email for code login.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    /// Code mailed to `email`.
    #[serde(skip_serializing_if = "is_zero")]
    pub code: u32,
    /// Server-filled joining character.
    pub character: Option<Character>,
    /// Server-filled id of the connection that joined.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_id: String,
    /// Server-filled room joined.
    pub room: String,
}

impl JoinPacket {
    /// Copy with credentials and the connection id removed, as delivered to
    /// clients.
    #[must_use]
    pub fn stripped(&self) -> Self {
        Self {
            character: self.character.as_ref().map(Character::public),
            room: self.room.clone(),
            ..Self::default()
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// `add_email`: put an address on a role allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AddEmailPacket {
    /// Address to allow.
    pub email: String,
    /// Role the address signs in as.
    pub role: Role,
    /// Sponsor the address belongs to, for sponsor reps.
    pub sponsor_id: String,
}

/// `email_code`: request a login code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmailCodePacket {
    /// Address to send the code to.
    pub email: String,
    /// Allow-list the address is checked against.
    pub role: Role,
}

/// `chat`: speech bubble in the sender's room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatPacket {
    /// Server-filled speaker id.
    pub id: String,
    /// Server-filled room.
    pub room: String,
    /// Message text.
    pub mssg: String,
}

/// `dance`: play a dance animation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DancePacket {
    /// Server-filled dancer id.
    pub id: String,
    /// Server-filled room.
    pub room: String,
    /// Which dance.
    pub dance: i32,
}

/// `move`: new position in the current room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MovePacket {
    /// Server-filled mover id.
    pub id: String,
    /// Server-filled room.
    pub room: String,
    /// Target x.
    pub x: f64,
    /// Target y.
    pub y: f64,
}

/// `teleport` and `teleport_home`: change rooms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TeleportPacket {
    /// Server-filled traveller.
    pub character: Option<Character>,
    /// Server-filled origin room.
    pub from: String,
    /// Destination room, or `character:<id>` to follow a friend.
    pub to: String,
    /// Arrival x.
    pub x: f64,
    /// Arrival y.
    pub y: f64,
}

/// `leave`: a character left a room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeavePacket {
    /// Who left.
    pub character: Character,
    /// Room left.
    pub room: String,
}

/// `status`: presence change of one character.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusPacket {
    /// Server-filled character id.
    pub id: String,
    /// Window focused.
    pub active: bool,
    /// Tab open.
    pub online: bool,
    /// Server-filled recipients; stripped before delivery.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub friend_ids: Vec<String>,
    /// Server-filled recipients; stripped before delivery.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub teammate_ids: Vec<String>,
}

/// `message`: direct message between two characters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessagePacket {
    /// The message; `id`, `from` and `timestamp` are server-filled.
    #[serde(flatten)]
    pub message: Message,
}

/// `get_messages`: request a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GetMessagesPacket {
    /// Other side of the conversation.
    pub recipient: String,
}

/// `messages`: a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessagesPacket {
    /// Messages oldest first.
    pub messages: Vec<Message>,
    /// Other side of the conversation.
    pub recipient: String,
}

/// `friend_request`: ask (or accept) a friendship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FriendRequestPacket {
    /// Server-filled requester.
    pub sender_id: String,
    /// Requested friend.
    pub recipient_id: String,
}

/// `friend_update`: one entry of the recipient's friend list changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FriendUpdatePacket {
    /// Whose list changed; stripped before delivery.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub recipient_id: String,
    /// The changed entry.
    pub friend: Friend,
}

/// `element_toggle`: advance an element to its next image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementTogglePacket {
    /// Element id.
    pub id: String,
}

/// `element_add` and `element_update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementPacket {
    /// Server-filled room.
    pub room: String,
    /// Element id; server-filled on add.
    pub id: String,
    /// Element contents.
    pub element: Element,
}

/// `hallway_add` and `hallway_update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HallwayPacket {
    /// Server-filled room.
    pub room: String,
    /// Hallway id; server-filled on add.
    pub id: String,
    /// Hallway contents.
    pub hallway: Hallway,
}

/// `element_delete` and `hallway_delete`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeletePacket {
    /// Server-filled room.
    pub room: String,
    /// Id to delete.
    pub id: String,
}

/// `song`: a song was queued or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SongPacket {
    /// The song; only `vidCode` is read from clients.
    #[serde(flatten)]
    pub song: Song,
    /// The submitter had not queued a song before.
    pub requires_warning: bool,
    /// Remove the song with this id instead of adding one.
    pub remove: bool,
}

/// `songs`: the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SongsPacket {
    /// Queued songs in play order.
    pub songs: Vec<Song>,
}

/// `play_song`: the song now playing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaySongPacket {
    /// The song.
    #[serde(flatten)]
    pub song: Song,
    /// Seconds already played.
    pub start: i64,
    /// Unix seconds when the song ends.
    pub end: i64,
}

/// `init`: everything a client needs after joining or changing rooms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InitPacket {
    /// The client's own character.
    pub character: Character,
    /// The room the character is in.
    pub room: RoomSnapshot,
    /// Fresh bearer token, on join only.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,
    /// Whether the character was just created.
    pub first_time: bool,
}

/// `error`: a request failed in a way the client should show.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ErrorPacket {
    /// What went wrong.
    pub code: ErrorCode,
}

/// `get_achievements`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GetAchievementsPacket {
    /// Character to look up; the sender when empty.
    pub id: String,
}

/// `achievements`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AchievementsPacket {
    /// Character the achievements belong to.
    pub id: String,
    /// Achievement name to earned flag.
    pub achievements: BTreeMap<String, bool>,
}

/// `register`: fill in the profile after first login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterPacket {
    /// Display name.
    pub name: String,
    /// Home location.
    pub location: String,
    /// Bio.
    pub bio: String,
    /// Phone number for queue notifications.
    pub phone_number: String,
}

/// `settings`: replace the client's preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsPacket {
    /// New preferences.
    pub settings: Settings,
}

/// `wardrobe_change`: new avatar colors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WardrobeChangePacket {
    /// Server-filled character id.
    pub character_id: String,
    /// Server-filled room.
    pub room: String,
    /// Eye color.
    pub eye_color: String,
    /// Skin color.
    pub skin_color: String,
    /// Shirt color.
    pub shirt_color: String,
    /// Pants color.
    pub pants_color: String,
}

/// `get_sponsor`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GetSponsorPacket {
    /// Sponsor id.
    pub id: String,
}

/// `sponsor`: one sponsor record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SponsorPacket {
    /// The sponsor.
    pub sponsor: Sponsor,
}

/// `update_sponsor`: edit the sender's sponsor record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateSponsorPacket {
    /// New values; empty strings leave fields unchanged.
    #[serde(flatten)]
    pub sponsor: Sponsor,
    /// Whether `queueOpen` should be applied.
    pub set_queue_open: bool,
}

/// `queue_join`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueJoinPacket {
    /// Sponsor whose queue to join.
    pub sponsor_id: String,
    /// Topics to discuss.
    pub interests: Vec<String>,
}

/// `queue_remove`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueRemovePacket {
    /// Sponsor whose queue to leave.
    pub sponsor_id: String,
    /// Hacker to remove.
    pub character_id: String,
    /// Meeting link handed to the hacker when a rep removes them.
    pub zoom: String,
}

/// `queue_subscribe` and `queue_unsubscribe`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueSubscriptionPacket {
    /// Sponsor whose queue to watch.
    pub sponsor_id: String,
}

/// `queue_update_hacker`: a hacker's place in a sponsor queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueUpdateHackerPacket {
    /// Sponsor queue.
    pub sponsor_id: String,
    /// One-based position; zero when the hacker was removed.
    pub position: u32,
    /// Meeting link, when a rep called the hacker in.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    /// Recipients; stripped before delivery.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub character_ids: Vec<String>,
}

/// `queue_update_sponsor`: the waiting hackers, for reps watching a queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueUpdateSponsorPacket {
    /// Sponsor queue.
    pub sponsor_id: String,
    /// Hackers in queue order.
    pub subscribers: Vec<QueueSubscriber>,
    /// Recipients; stripped before delivery.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub character_ids: Vec<String>,
}

/// Every packet, tagged by its wire `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    /// Allow-list an email address.
    AddEmail(AddEmailPacket),
    /// Authenticate without entering a room.
    Auth(JoinPacket),
    /// Authenticate and enter the character's room.
    Join(JoinPacket),
    /// Request a login code.
    EmailCode(EmailCodePacket),
    /// Speech bubble.
    Chat(ChatPacket),
    /// Dance animation.
    Dance(DancePacket),
    /// Position change.
    Move(MovePacket),
    /// Room change.
    Teleport(TeleportPacket),
    /// Room change to the sender's home.
    TeleportHome(TeleportPacket),
    /// Left a room (server only).
    Leave(LeavePacket),
    /// Presence change.
    Status(StatusPacket),
    /// Direct message.
    Message(MessagePacket),
    /// Request a conversation.
    GetMessages(GetMessagesPacket),
    /// A conversation (server only).
    Messages(MessagesPacket),
    /// Friend request.
    FriendRequest(FriendRequestPacket),
    /// Friend list entry changed (server only).
    FriendUpdate(FriendUpdatePacket),
    /// Cycle an element's image.
    ElementToggle(ElementTogglePacket),
    /// Add an element.
    ElementAdd(ElementPacket),
    /// Change an element.
    ElementUpdate(ElementPacket),
    /// Delete an element.
    ElementDelete(DeletePacket),
    /// Add a hallway.
    HallwayAdd(HallwayPacket),
    /// Change a hallway.
    HallwayUpdate(HallwayPacket),
    /// Delete a hallway.
    HallwayDelete(DeletePacket),
    /// Queue or remove a song.
    Song(SongPacket),
    /// Request the song queue.
    GetSongs(Empty),
    /// The song queue (server only).
    Songs(SongsPacket),
    /// Request the playing song.
    GetCurrentSong(Empty),
    /// The playing song (server only).
    PlaySong(PlaySongPacket),
    /// First song submission notice (server only).
    JukeboxWarning(Empty),
    /// Session bootstrap (server only).
    Init(InitPacket),
    /// Failure notice (server only).
    Error(ErrorPacket),
    /// Request achievements.
    GetAchievements(GetAchievementsPacket),
    /// Achievements (server only).
    Achievements(AchievementsPacket),
    /// Profile registration.
    Register(RegisterPacket),
    /// Preferences change.
    Settings(SettingsPacket),
    /// Avatar color change.
    WardrobeChange(WardrobeChangePacket),
    /// Request a sponsor record.
    GetSponsor(GetSponsorPacket),
    /// A sponsor record (server only).
    Sponsor(SponsorPacket),
    /// Edit a sponsor record.
    UpdateSponsor(UpdateSponsorPacket),
    /// Join a sponsor queue.
    QueueJoin(QueueJoinPacket),
    /// Leave, or remove someone from, a sponsor queue.
    QueueRemove(QueueRemovePacket),
    /// Watch a sponsor queue.
    QueueSubscribe(QueueSubscriptionPacket),
    /// Stop watching a sponsor queue.
    QueueUnsubscribe(QueueSubscriptionPacket),
    /// Hacker queue position (server only).
    QueueUpdateHacker(QueueUpdateHackerPacket),
    /// Queue contents for reps (server only).
    QueueUpdateSponsor(QueueUpdateSponsorPacket),
}

/// Every wire `type` this server understands.
pub const WIRE_TYPES: &[&str] = &[
    "add_email",
    "auth",
    "join",
    "email_code",
    "chat",
    "dance",
    "move",
    "teleport",
    "teleport_home",
    "leave",
    "status",
    "message",
    "get_messages",
    "messages",
    "friend_request",
    "friend_update",
    "element_toggle",
    "element_add",
    "element_update",
    "element_delete",
    "hallway_add",
    "hallway_update",
    "hallway_delete",
    "song",
    "get_songs",
    "songs",
    "get_current_song",
    "play_song",
    "jukebox_warning",
    "init",
    "error",
    "get_achievements",
    "achievements",
    "register",
    "settings",
    "wardrobe_change",
    "get_sponsor",
    "sponsor",
    "update_sponsor",
    "queue_join",
    "queue_remove",
    "queue_subscribe",
    "queue_unsubscribe",
    "queue_update_hacker",
    "queue_update_sponsor",
];

impl Packet {
    /// Decode one frame.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MissingType`] when the frame is not an object with a
    /// string `type`, [`ProtocolError::UnknownType`] for a type outside
    /// [`WIRE_TYPES`], [`ProtocolError::Malformed`] for invalid JSON or a
    /// payload that does not fit its type.
    pub fn parse(frame: &[u8]) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_slice(frame)?;
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(ProtocolError::MissingType)?;
        if !WIRE_TYPES.contains(&kind) {
            return Err(ProtocolError::UnknownType(kind.to_owned()));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Encode as one frame.
    ///
    /// # Errors
    ///
    /// Returns an error only if a payload cannot be represented as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The wire `type` of this packet.
    pub const fn wire_type(&self) -> &'static str {
        match self {
            Self::AddEmail(_) => "add_email",
            Self::Auth(_) => "auth",
            Self::Join(_) => "join",
            Self::EmailCode(_) => "email_code",
            Self::Chat(_) => "chat",
            Self::Dance(_) => "dance",
            Self::Move(_) => "move",
            Self::Teleport(_) => "teleport",
            Self::TeleportHome(_) => "teleport_home",
            Self::Leave(_) => "leave",
            Self::Status(_) => "status",
            Self::Message(_) => "message",
            Self::GetMessages(_) => "get_messages",
            Self::Messages(_) => "messages",
            Self::FriendRequest(_) => "friend_request",
            Self::FriendUpdate(_) => "friend_update",
            Self::ElementToggle(_) => "element_toggle",
            Self::ElementAdd(_) => "element_add",
            Self::ElementUpdate(_) => "element_update",
            Self::ElementDelete(_) => "element_delete",
            Self::HallwayAdd(_) => "hallway_add",
            Self::HallwayUpdate(_) => "hallway_update",
            Self::HallwayDelete(_) => "hallway_delete",
            Self::Song(_) => "song",
            Self::GetSongs(_) => "get_songs",
            Self::Songs(_) => "songs",
            Self::GetCurrentSong(_) => "get_current_song",
            Self::PlaySong(_) => "play_song",
            Self::JukeboxWarning(_) => "jukebox_warning",
            Self::Init(_) => "init",
            Self::Error(_) => "error",
            Self::GetAchievements(_) => "get_achievements",
            Self::Achievements(_) => "achievements",
            Self::Register(_) => "register",
            Self::Settings(_) => "settings",
            Self::WardrobeChange(_) => "wardrobe_change",
            Self::GetSponsor(_) => "get_sponsor",
            Self::Sponsor(_) => "sponsor",
            Self::UpdateSponsor(_) => "update_sponsor",
            Self::QueueJoin(_) => "queue_join",
            Self::QueueRemove(_) => "queue_remove",
            Self::QueueSubscribe(_) => "queue_subscribe",
            Self::QueueUnsubscribe(_) => "queue_unsubscribe",
            Self::QueueUpdateHacker(_) => "queue_update_hacker",
            Self::QueueUpdateSponsor(_) => "queue_update_sponsor",
        }
    }

    /// Shorthand for an `error` packet.
    pub const fn error(code: ErrorCode) -> Self {
        Self::Error(ErrorPacket { code })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn partial_move_parses_with_defaults() {
        let packet = Packet::parse(br#"{"type":"move","x":0.4,"y":0.6}"#);
        let Ok(Packet::Move(p)) = packet else {
            panic!("expected move, got {packet:?}");
        };
        assert!(p.id.is_empty());
        assert!(p.room.is_empty());
        assert!((p.x - 0.4).abs() < f64::EPSILON);
        assert!((p.y - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_and_unknown_types_are_protocol_errors() {
        assert!(matches!(
            Packet::parse(br#"{"x":1}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            Packet::parse(br"[1,2]"),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            Packet::parse(br#"{"type":"fly"}"#),
            Err(ProtocolError::UnknownType(t)) if t == "fly"
        ));
        assert!(matches!(
            Packet::parse(b"not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            Packet::parse(br#"{"type":"move","x":"left"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn every_variant_type_is_listed() {
        let samples = [
            Packet::Move(MovePacket::default()),
            Packet::TeleportHome(TeleportPacket::default()),
            Packet::GetSongs(Empty {}),
            Packet::QueueUpdateSponsor(QueueUpdateSponsorPacket::default()),
            Packet::error(ErrorCode::BAD_LOGIN),
        ];
        for packet in samples {
            assert!(WIRE_TYPES.contains(&packet.wire_type()));
            let json = packet.to_json().unwrap();
            let reparsed = Packet::parse(json.as_bytes());
            assert!(matches!(reparsed, Ok(ref p) if p == &packet), "{json}");
        }
    }

    #[test]
    fn move_wire_shape() {
        let packet = Packet::Move(MovePacket {
            id: "K".to_owned(),
            room: "home".to_owned(),
            x: 0.4,
            y: 0.6,
        });
        let value: serde_json::Value =
            serde_json::from_str(&packet.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type":"move","id":"K","room":"home","x":0.4,"y":0.6})
        );
    }

    #[test]
    fn song_fields_are_top_level() {
        let packet = Packet::parse(br#"{"type":"song","vidCode":"dQw4w9WgXcQ"}"#);
        let Ok(Packet::Song(p)) = packet else {
            panic!("expected song, got {packet:?}");
        };
        assert_eq!(p.song.vid_code, "dQw4w9WgXcQ");
        assert!(!p.remove);

        let play = Packet::PlaySong(PlaySongPacket {
            song: Song {
                id: "s1".to_owned(),
                duration: 180,
                ..Song::default()
            },
            start: 0,
            end: 1_000,
        });
        let value = serde_json::to_value(&play).unwrap();
        assert_eq!(value.get("type"), Some(&serde_json::json!("play_song")));
        assert_eq!(value.get("duration"), Some(&serde_json::json!(180)));
        assert_eq!(value.get("start"), Some(&serde_json::json!(0)));
    }

    #[test]
    fn stripped_join_hides_credentials_and_client_id() {
        let mut character = Character::new("k", "Kay", Role::Hacker);
        character.email = "kay@example.com".to_owned();
        let join = JoinPacket {
            token: "secret".to_owned(),
            client_id: "c1".to_owned(),
            character: Some(character),
            room: "home".to_owned(),
            ..JoinPacket::default()
        };
        let value = serde_json::to_value(Packet::Join(join.stripped())).unwrap();
        assert!(value.get("token").is_none());
        assert!(value.get("clientId").is_none());
        assert_eq!(value.get("room"), Some(&serde_json::json!("home")));
        assert!(
            value
                .get("character")
                .and_then(|c| c.get("email"))
                .is_none()
        );
    }

    #[test]
    fn error_codes_are_plain_numbers() {
        let value = serde_json::to_value(Packet::error(ErrorCode::SONG_COOLDOWN)).unwrap();
        assert_eq!(value, serde_json::json!({"type":"error","code":401}));
    }
}
