//! Key and channel names in the shared store.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `character:{id}` | Hash | Character record |
//! | `character:{id}:active` | String | `true` while the window is focused |
//! | `character:{id}:friends` | Set | Accepted friends |
//! | `character:{id}:teammates` | Set | Teammates |
//! | `character:{id}:requests` | Set | Pending incoming friend requests |
//! | `character:{id}:achievements` | Hash | Achievement flags |
//! | `character:{id}:settings` | Hash | Client preferences |
//! | `character:{id}:jukeboxTimestamp` | String | RFC 3339 time of next allowed song |
//! | `rooms` | Set | Every room id |
//! | `room:{id}` | Hash | Room record |
//! | `room:{id}:characters` | Set | Resident character ids |
//! | `room:{id}:elements` | List | Element ids in display order |
//! | `room:{id}:hallways` | Set | Hallway ids |
//! | `element:{id}` / `hallway:{id}` | Hash | Room contents |
//! | `ingests` | List | Registered ingest ids, oldest first |
//! | `ingest:{id}:characters` | Set | Characters owned by an ingest |
//! | `songs` | List | Queued song ids |
//! | `song:{id}` | Hash | Song record |
//! | `queuestatus` | String | Unix seconds when the current song ends |
//! | `currentsong` | String | Id of the current song |
//! | `login_requests` | Set | Outstanding `email,code` pairs |
//! | `{role}_emails` | Set | Email allow-lists |
//! | `emailToCharacter` / `quillToCharacter` / `emailToSponsor` | Hash | Login indexes |
//! | `sponsors` | Set | Sponsor ids |
//! | `sponsor:{id}` | Hash | Sponsor record |
//! | `sponsor:{id}:hackerqueue` | List | Waiting hacker ids |
//! | `sponsor:{id}:subscribed` | Set | Reps watching the queue |
//! | `subscriber:{id}` | Hash | What reps see about a waiting hacker |
//! | `conversation:{a}:{b}` | List | Message ids between two characters |
//! | `message:{id}` | Hash | Message record |

/// Every room id.
pub const ROOMS: &str = "rooms";
/// Registered ingest ids, oldest first.
pub const INGESTS: &str = "ingests";
/// Song queue.
pub const SONGS: &str = "songs";
/// End of the current song, unix seconds.
pub const QUEUE_STATUS: &str = "queuestatus";
/// Id of the current song.
pub const CURRENT_SONG: &str = "currentsong";
/// Outstanding login codes.
pub const LOGIN_REQUESTS: &str = "login_requests";
/// Email to character id.
pub const EMAIL_TO_CHARACTER: &str = "emailToCharacter";
/// SSO id to character id.
pub const QUILL_TO_CHARACTER: &str = "quillToCharacter";
/// Sponsor rep email to sponsor id.
pub const EMAIL_TO_SPONSOR: &str = "emailToSponsor";
/// Every sponsor id.
pub const SPONSORS: &str = "sponsors";

/// Channel every ingest publishes broadcasts on.
pub const GLOBAL_CHANNEL: &str = "playground:global";
/// Channel on which new ingests announce themselves.
pub const DISCOVERY_CHANNEL: &str = "playground:ingest";

/// `character:{id}`.
pub fn character(id: &str) -> String {
    format!("character:{id}")
}

/// `character:{id}:active`.
pub fn character_active(id: &str) -> String {
    format!("character:{id}:active")
}

/// `character:{id}:friends`.
pub fn friends(id: &str) -> String {
    format!("character:{id}:friends")
}

/// `character:{id}:teammates`.
pub fn teammates(id: &str) -> String {
    format!("character:{id}:teammates")
}

/// `character:{id}:requests`.
pub fn friend_requests(id: &str) -> String {
    format!("character:{id}:requests")
}

/// `character:{id}:achievements`.
pub fn achievements(id: &str) -> String {
    format!("character:{id}:achievements")
}

/// `character:{id}:settings`.
pub fn settings(id: &str) -> String {
    format!("character:{id}:settings")
}

/// `character:{id}:jukeboxTimestamp`.
pub fn jukebox_timestamp(id: &str) -> String {
    format!("character:{id}:jukeboxTimestamp")
}

/// `room:{id}`.
pub fn room(id: &str) -> String {
    format!("room:{id}")
}

/// `room:{id}:characters`.
pub fn room_characters(id: &str) -> String {
    format!("room:{id}:characters")
}

/// `room:{id}:elements`.
pub fn room_elements(id: &str) -> String {
    format!("room:{id}:elements")
}

/// `room:{id}:hallways`.
pub fn room_hallways(id: &str) -> String {
    format!("room:{id}:hallways")
}

/// `element:{id}`.
pub fn element(id: &str) -> String {
    format!("element:{id}")
}

/// `hallway:{id}`.
pub fn hallway(id: &str) -> String {
    format!("hallway:{id}")
}

/// `ingest:{id}:characters`.
pub fn ingest_characters(id: &str) -> String {
    format!("ingest:{id}:characters")
}

/// `song:{id}`.
pub fn song(id: &str) -> String {
    format!("song:{id}")
}

/// `sponsor:{id}`.
pub fn sponsor(id: &str) -> String {
    format!("sponsor:{id}")
}

/// `sponsor:{id}:hackerqueue`.
pub fn sponsor_queue(id: &str) -> String {
    format!("sponsor:{id}:hackerqueue")
}

/// `sponsor:{id}:subscribed`.
pub fn sponsor_subscribers(id: &str) -> String {
    format!("sponsor:{id}:subscribed")
}

/// `subscriber:{id}`.
pub fn queue_subscriber(id: &str) -> String {
    format!("subscriber:{id}")
}

/// `message:{id}`.
pub fn message(id: &str) -> String {
    format!("message:{id}")
}

/// `conversation:{a}:{b}`, with the two ids in a fixed order so both sides
/// of a conversation share one list.
pub fn conversation(a: &str, b: &str) -> String {
    if fnv1a(a) < fnv1a(b) {
        format!("conversation:{a}:{b}")
    } else {
        format!("conversation:{b}:{a}")
    }
}

/// 32-bit FNV-1a.
fn fnv1a(input: &str) -> u32 {
    input.bytes().fold(0x811c_9dc5_u32, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    })
}
