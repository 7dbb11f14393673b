//! Identifiers for ingest processes and live connections.
//!
//! Character, room, element and song ids are plain strings: they come from
//! the store, the SSO provider or room templates and carry no shape. The two
//! identifiers here are generated by this process and have a checked shape.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix shared by every ingest id.
pub const INGEST_PREFIX: &str = "ingest-";

/// Identity of one ingest process.
///
/// Used as the store connection name (so peers can see which ingests are
/// alive through `CLIENT LIST`) and as the name of the ingest's private
/// broadcast channel. The shape is `ingest-` followed by 32 lowercase hex
/// digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IngestId(String);

impl IngestId {
    /// Generate a fresh ingest id from a random UUID.
    pub fn generate() -> Self {
        Self(format!("{INGEST_PREFIX}{}", Uuid::new_v4().simple()))
    }

    /// Parse an ingest id, returning `None` when `raw` does not have the
    /// ingest id shape.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::is_valid(raw).then(|| Self(raw.to_owned()))
    }

    /// Whether `raw` has the ingest id shape.
    ///
    /// Store connections opened by other tools (CLI sessions, monitoring)
    /// fail this check and are ignored during leader election.
    pub fn is_valid(raw: &str) -> bool {
        raw.strip_prefix(INGEST_PREFIX).is_some_and(|hex| {
            hex.len() == 32
                && hex
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        })
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for IngestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for IngestId {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        if Self::is_valid(&raw) {
            Ok(Self(raw))
        } else {
            Err(format!("not an ingest id: {raw}"))
        }
    }
}

impl From<IngestId> for String {
    fn from(id: IngestId) -> Self {
        id.0
    }
}

/// Opaque identifier of one live WebSocket connection on this process.
///
/// Travels on the wire as the `clientId` of a `join` so that other nodes can
/// tell the new connection apart from a stale one bound to the same
/// character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_have_the_ingest_shape() {
        let id = IngestId::generate();
        assert!(IngestId::is_valid(id.as_str()));
        assert_eq!(id.as_str().len(), INGEST_PREFIX.len() + 32);
    }

    #[test]
    fn foreign_client_names_are_rejected() {
        assert!(!IngestId::is_valid(""));
        assert!(!IngestId::is_valid("redis-cli"));
        assert!(!IngestId::is_valid("ingest-"));
        assert!(!IngestId::is_valid("ingest-0123456789ABCDEF0123456789abcdef"));
        assert!(!IngestId::is_valid("ingest-0123456789abcdef0123456789abcde"));
        assert!(IngestId::is_valid("ingest-0123456789abcdef0123456789abcdef"));
    }

    #[test]
    fn ingest_id_deserialization_checks_shape() {
        let ok: Result<IngestId, _> =
            serde_json::from_str("\"ingest-0123456789abcdef0123456789abcdef\"");
        assert!(ok.is_ok());
        let bad: Result<IngestId, _> = serde_json::from_str("\"node-1\"");
        assert!(bad.is_err());
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}
