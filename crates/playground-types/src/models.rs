//! Durable world records: characters, rooms and what they contain, songs,
//! sponsors and social records.
//!
//! Field names are camelCase on the wire and in the store; clients depend on
//! them.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{Fields, HashRecord, field, flag};

/// Default avatar colors for new characters.
pub const DEFAULT_EYE_COLOR: &str = "#634e34";
/// Default skin color.
pub const DEFAULT_SKIN_COLOR: &str = "#e0ac69";
/// Default shirt color.
pub const DEFAULT_SHIRT_COLOR: &str = "#d6e2f8";
/// Default pants color.
pub const DEFAULT_PANTS_COLOR: &str = "#ecf0f1";

/// Room every new character starts in.
pub const DEFAULT_ROOM: &str = "home";

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// What a character is allowed to do. Encoded as an integer on the wire and
/// in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Role {
    /// Not signed in through any allow-list.
    #[default]
    Guest,
    /// Event staff; may edit rooms and bypass most gates.
    Organizer,
    /// Representative of a sponsor; owns a sponsor queue.
    SponsorRep,
    /// Mentor.
    Mentor,
    /// Event participant.
    Hacker,
}

impl Role {
    /// Store field name of the email allow-list for this role, if any.
    pub const fn allow_list_key(self) -> Option<&'static str> {
        match self {
            Self::Organizer => Some("organizer_emails"),
            Self::SponsorRep => Some("sponsor_emails"),
            Self::Mentor => Some("mentor_emails"),
            Self::Guest | Self::Hacker => None,
        }
    }
}

impl From<Role> for u8 {
    fn from(role: Role) -> Self {
        match role {
            Role::Guest => 0,
            Role::Organizer => 1,
            Role::SponsorRep => 2,
            Role::Mentor => 3,
            Role::Hacker => 4,
        }
    }
}

impl TryFrom<u8> for Role {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Guest),
            1 => Ok(Self::Organizer),
            2 => Ok(Self::SponsorRep),
            3 => Ok(Self::Mentor),
            4 => Ok(Self::Hacker),
            other => Err(format!("unknown role {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Character
// ---------------------------------------------------------------------------

/// A user's avatar. Persists across sessions; owned at any moment by the
/// ingest holding its live connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Character {
    /// Character id (store key suffix, never a hash field).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form home location.
    pub location: String,
    /// Free-form bio.
    pub bio: String,
    /// School name.
    pub school: String,
    /// Expected graduation year.
    pub grad_year: i32,
    /// Horizontal position in the room, in `(0, 1)`.
    pub x: f64,
    /// Vertical position in the room, in `(0, 1)`.
    pub y: f64,
    /// Current room id.
    pub room: String,
    /// Ingest currently owning the live connection, empty when offline.
    pub ingest: String,
    /// Login email. Cleared before the character is broadcast.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    /// Permission role.
    pub role: Role,
    /// Whether the character is a college student.
    pub is_college: bool,
    /// Sponsor queue the character is waiting in, if any.
    pub queue_id: String,
    /// Sponsor a representative belongs to.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sponsor_id: String,
    /// Meeting link a representative hands to hackers.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub zoom: String,
    /// Number of sponsor rooms entered.
    pub num_sponsors_visited: u32,
    /// Avatar eye color.
    pub eye_color: String,
    /// Avatar skin color.
    pub skin_color: String,
    /// Avatar shirt color.
    pub shirt_color: String,
    /// Avatar pants color.
    pub pants_color: String,
}

impl Default for Character {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            location: String::new(),
            bio: String::new(),
            school: String::new(),
            grad_year: 0,
            x: 0.5,
            y: 0.5,
            room: DEFAULT_ROOM.to_owned(),
            ingest: String::new(),
            email: String::new(),
            role: Role::Guest,
            is_college: false,
            queue_id: String::new(),
            sponsor_id: String::new(),
            zoom: String::new(),
            num_sponsors_visited: 0,
            eye_color: DEFAULT_EYE_COLOR.to_owned(),
            skin_color: DEFAULT_SKIN_COLOR.to_owned(),
            shirt_color: DEFAULT_SHIRT_COLOR.to_owned(),
            pants_color: DEFAULT_PANTS_COLOR.to_owned(),
        }
    }
}

impl Character {
    /// A fresh character in the default room with default colors.
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            ..Self::default()
        }
    }

    /// Copy safe to hand to other clients: no email.
    #[must_use]
    pub fn public(&self) -> Self {
        Self {
            email: String::new(),
            ..self.clone()
        }
    }
}

impl HashRecord for Character {
    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            field("name", &self.name),
            field("location", &self.location),
            field("bio", &self.bio),
            field("school", &self.school),
            field("gradYear", self.grad_year),
            field("x", self.x),
            field("y", self.y),
            field("room", &self.room),
            field("ingest", &self.ingest),
            field("email", &self.email),
            field("role", u8::from(self.role)),
            ("isCollege".to_owned(), flag(self.is_college)),
            field("queueId", &self.queue_id),
            field("sponsorId", &self.sponsor_id),
            field("zoom", &self.zoom),
            field("numSponsorsVisited", self.num_sponsors_visited),
            field("eyeColor", &self.eye_color),
            field("skinColor", &self.skin_color),
            field("shirtColor", &self.shirt_color),
            field("pantsColor", &self.pants_color),
        ]
    }

    fn from_fields(id: &str, fields: &HashMap<String, String>) -> Self {
        let f = Fields(fields);
        Self {
            id: id.to_owned(),
            name: f.string("name"),
            location: f.string("location"),
            bio: f.string("bio"),
            school: f.string("school"),
            grad_year: f.number("gradYear"),
            x: f.float_or("x", 0.5),
            y: f.float_or("y", 0.5),
            room: f.string_or("room", DEFAULT_ROOM),
            ingest: f.string("ingest"),
            email: f.string("email"),
            role: Role::try_from(f.number::<u8>("role")).unwrap_or_default(),
            is_college: f.flag("isCollege"),
            queue_id: f.string("queueId"),
            sponsor_id: f.string("sponsorId"),
            zoom: f.string("zoom"),
            num_sponsors_visited: f.number("numSponsorsVisited"),
            eye_color: f.string_or("eyeColor", DEFAULT_EYE_COLOR),
            skin_color: f.string_or("skinColor", DEFAULT_SKIN_COLOR),
            shirt_color: f.string_or("shirtColor", DEFAULT_SHIRT_COLOR),
            pants_color: f.string_or("pantsColor", DEFAULT_PANTS_COLOR),
        }
    }
}

// ---------------------------------------------------------------------------
// Rooms, elements, hallways
// ---------------------------------------------------------------------------

/// The room hash itself; contents live under separate keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Room {
    /// Room id.
    pub id: String,
    /// Background image path.
    pub background: String,
    /// Whether the room belongs to a sponsor.
    pub sponsor: bool,
}

impl HashRecord for Room {
    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            field("id", &self.id),
            field("background", &self.background),
            ("sponsor".to_owned(), flag(self.sponsor)),
        ]
    }

    fn from_fields(id: &str, fields: &HashMap<String, String>) -> Self {
        let f = Fields(fields);
        Self {
            id: id.to_owned(),
            background: f.string("background"),
            sponsor: f.flag("sponsor"),
        }
    }
}

/// Everything a client needs to render a room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// Room metadata.
    #[serde(flatten)]
    pub room: Room,
    /// Resident characters keyed by id.
    pub characters: BTreeMap<String, Character>,
    /// Interactive objects in display order.
    pub elements: Vec<Element>,
    /// Portals keyed by id.
    pub hallways: BTreeMap<String, Hallway>,
}

/// An interactive object placed in a room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Element {
    /// Element id.
    pub id: String,
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
    /// Width relative to the room.
    pub width: f64,
    /// Image path, or a comma-separated list of images for stateful elements.
    pub path: String,
    /// Index into the path list.
    pub state: u32,
    /// Client-side action triggered on click.
    pub action: i32,
}

impl Element {
    /// Number of distinct images the element cycles through.
    pub fn state_count(&self) -> u32 {
        u32::try_from(self.path.split(',').count()).unwrap_or(1).max(1)
    }
}

impl HashRecord for Element {
    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            field("x", self.x),
            field("y", self.y),
            field("width", self.width),
            field("path", &self.path),
            field("state", self.state),
            field("action", self.action),
        ]
    }

    fn from_fields(id: &str, fields: &HashMap<String, String>) -> Self {
        let f = Fields(fields);
        Self {
            id: id.to_owned(),
            x: f.float_or("x", 0.5),
            y: f.float_or("y", 0.5),
            width: f.float_or("width", 0.1),
            path: f.string("path"),
            state: f.number("state"),
            action: f.number("action"),
        }
    }
}

/// A circular portal to another room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Hallway {
    /// Hallway id.
    pub id: String,
    /// Center x.
    pub x: f64,
    /// Center y.
    pub y: f64,
    /// Radius relative to the room.
    pub radius: f64,
    /// Destination room id.
    pub to: String,
    /// Arrival x in the destination room.
    pub to_x: f64,
    /// Arrival y in the destination room.
    pub to_y: f64,
}

impl HashRecord for Hallway {
    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            field("x", self.x),
            field("y", self.y),
            field("radius", self.radius),
            field("to", &self.to),
            field("toX", self.to_x),
            field("toY", self.to_y),
        ]
    }

    fn from_fields(id: &str, fields: &HashMap<String, String>) -> Self {
        let f = Fields(fields);
        Self {
            id: id.to_owned(),
            x: f.float_or("x", 0.5),
            y: f.float_or("y", 0.5),
            radius: f.float_or("radius", 0.05),
            to: f.string("to"),
            to_x: f.float_or("toX", 0.5),
            to_y: f.float_or("toY", 0.5),
        }
    }
}

// ---------------------------------------------------------------------------
// Jukebox
// ---------------------------------------------------------------------------

/// A queued or playing song.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Song {
    /// Song id.
    pub id: String,
    /// Video code on the video platform.
    pub vid_code: String,
    /// Video title.
    pub title: String,
    /// Thumbnail image url.
    pub thumbnail_url: String,
    /// Length in seconds.
    pub duration: u32,
    /// Character who queued the song.
    pub character_id: String,
}

impl HashRecord for Song {
    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            field("vidCode", &self.vid_code),
            field("title", &self.title),
            field("thumbnailUrl", &self.thumbnail_url),
            field("duration", self.duration),
            field("characterId", &self.character_id),
        ]
    }

    fn from_fields(id: &str, fields: &HashMap<String, String>) -> Self {
        let f = Fields(fields);
        Self {
            id: id.to_owned(),
            vid_code: f.string("vidCode"),
            title: f.string("title"),
            thumbnail_url: f.string("thumbnailUrl"),
            duration: f.number("duration"),
            character_id: f.string("characterId"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sponsors
// ---------------------------------------------------------------------------

/// A sponsor company and its queue state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Sponsor {
    /// Sponsor id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Website.
    pub url: String,
    /// Challenge descriptions.
    pub challenges: String,
    /// Whether hackers may join the queue.
    pub queue_open: bool,
}

impl HashRecord for Sponsor {
    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            field("name", &self.name),
            field("description", &self.description),
            field("url", &self.url),
            field("challenges", &self.challenges),
            ("queueOpen".to_owned(), flag(self.queue_open)),
        ]
    }

    fn from_fields(id: &str, fields: &HashMap<String, String>) -> Self {
        let f = Fields(fields);
        Self {
            id: id.to_owned(),
            name: f.string("name"),
            description: f.string("description"),
            url: f.string("url"),
            challenges: f.string("challenges"),
            queue_open: f.flag("queueOpen"),
        }
    }
}

/// What a sponsor rep sees about a hacker waiting in their queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueSubscriber {
    /// Character id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// School.
    pub school: String,
    /// Graduation year.
    pub grad_year: i32,
    /// Topics the hacker wants to discuss, comma-separated.
    pub interests: String,
}

impl HashRecord for QueueSubscriber {
    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            field("name", &self.name),
            field("school", &self.school),
            field("gradYear", self.grad_year),
            field("interests", &self.interests),
        ]
    }

    fn from_fields(id: &str, fields: &HashMap<String, String>) -> Self {
        let f = Fields(fields);
        Self {
            id: id.to_owned(),
            name: f.string("name"),
            school: f.string("school"),
            grad_year: f.number("gradYear"),
            interests: f.string("interests"),
        }
    }
}

// ---------------------------------------------------------------------------
// Social
// ---------------------------------------------------------------------------

/// One direct message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Message {
    /// Message id.
    pub id: String,
    /// Sender character id.
    pub from: String,
    /// Recipient character id.
    pub to: String,
    /// Message body.
    pub text: String,
    /// Unix seconds when the message was sent.
    pub timestamp: i64,
}

impl HashRecord for Message {
    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            field("from", &self.from),
            field("to", &self.to),
            field("text", &self.text),
            field("timestamp", self.timestamp),
        ]
    }

    fn from_fields(id: &str, fields: &HashMap<String, String>) -> Self {
        let f = Fields(fields);
        Self {
            id: id.to_owned(),
            from: f.string("from"),
            to: f.string("to"),
            text: f.string("text"),
            timestamp: f.number("timestamp"),
        }
    }
}

/// Presence of a friend as shown in a friend list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Presence {
    /// No live connection.
    #[default]
    Offline,
    /// Connected with the tab unfocused.
    Away,
    /// Connected and focused.
    Online,
}

impl From<Presence> for u8 {
    fn from(presence: Presence) -> Self {
        match presence {
            Presence::Offline => 0,
            Presence::Away => 1,
            Presence::Online => 2,
        }
    }
}

impl TryFrom<u8> for Presence {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Offline),
            1 => Ok(Self::Away),
            2 => Ok(Self::Online),
            other => Err(format!("unknown presence {other}")),
        }
    }
}

/// A friend-list entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Friend {
    /// Friend's character id.
    pub id: String,
    /// Friend's display name.
    pub name: String,
    /// Friend's school.
    pub school: String,
    /// Current presence.
    pub status: Presence,
    /// Whether the friend is also a teammate.
    pub teammate: bool,
    /// Whether the request is still awaiting acceptance.
    pub pending: bool,
    /// When the friend was last seen, if ever.
    pub last_seen: Option<DateTime<Utc>>,
}

/// Per-character client preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Background music muted.
    pub music_muted: bool,
    /// Sound effects muted.
    pub sound_muted: bool,
    /// Phone number for queue notifications.
    pub phone_number: String,
}

impl HashRecord for Settings {
    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("musicMuted".to_owned(), flag(self.music_muted)),
            ("soundMuted".to_owned(), flag(self.sound_muted)),
            field("phoneNumber", &self.phone_number),
        ]
    }

    fn from_fields(_id: &str, fields: &HashMap<String, String>) -> Self {
        let f = Fields(fields);
        Self {
            music_muted: f.flag("musicMuted"),
            sound_muted: f.flag("soundMuted"),
            phone_number: f.string("phoneNumber"),
        }
    }
}

/// Achievement names tracked per character.
pub mod achievements {
    /// Visited enough sponsor rooms.
    pub const COMPANY_TOUR: &str = "companyTour";
    /// Made enough friends.
    pub const HANGOUTS: &str = "hangouts";
    /// Joined a sponsor queue.
    pub const SPONSOR_QUEUE: &str = "sponsorQueue";
    /// Queued a song.
    pub const DJ: &str = "dj";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_integers_on_the_wire() {
        assert_eq!(serde_json::to_string(&Role::Hacker).unwrap(), "4");
        let role: Role = serde_json::from_str("2").unwrap();
        assert_eq!(role, Role::SponsorRep);
        assert!(serde_json::from_str::<Role>("9").is_err());
    }

    #[test]
    fn character_survives_the_store_hash() {
        let mut character = Character::new("k", "Kay", Role::Hacker);
        character.x = 0.4;
        character.y = 0.6;
        character.is_college = true;
        character.sponsor_id = "acme".to_owned();

        let stored: HashMap<String, String> = character.to_fields().into_iter().collect();
        assert!(!stored.contains_key("id"));
        let loaded = Character::from_fields("k", &stored);
        assert_eq!(loaded, character);
    }

    #[test]
    fn character_defaults_fill_missing_fields() {
        let loaded = Character::from_fields("k", &HashMap::new());
        assert_eq!(loaded.room, DEFAULT_ROOM);
        assert_eq!(loaded.eye_color, DEFAULT_EYE_COLOR);
        assert!((loaded.x - 0.5).abs() < f64::EPSILON);
        assert_eq!(loaded.role, Role::Guest);
    }

    #[test]
    fn public_copy_drops_email() {
        let mut character = Character::new("k", "Kay", Role::Hacker);
        character.email = "kay@example.com".to_owned();
        let json = serde_json::to_value(character.public()).unwrap();
        assert!(json.get("email").is_none());
        assert!(json.get("sponsorId").is_none());
        assert_eq!(json.get("gradYear"), Some(&serde_json::json!(0)));
    }

    #[test]
    fn snapshot_flattens_room_fields() {
        let snapshot = RoomSnapshot {
            room: Room {
                id: "home".to_owned(),
                background: "home.svg".to_owned(),
                sponsor: false,
            },
            ..RoomSnapshot::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json.get("id"), Some(&serde_json::json!("home")));
        assert_eq!(json.get("background"), Some(&serde_json::json!("home.svg")));
        assert!(json.get("characters").is_some_and(serde_json::Value::is_object));
    }

    #[test]
    fn element_state_count_follows_path_list() {
        let element = Element {
            path: "lamp_off.svg,lamp_on.svg".to_owned(),
            ..Element::default()
        };
        assert_eq!(element.state_count(), 2);
        assert_eq!(Element::default().state_count(), 1);
    }
}
