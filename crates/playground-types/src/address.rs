//! Delivery addresses for packets fanned out to local connections.

use serde::{Deserialize, Serialize};

use crate::models::Character;

/// Prefix of point-to-point addresses.
pub const CHARACTER_PREFIX: &str = "character:";

/// Where a packet is delivered on each node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Address {
    /// Every bound connection (`*`).
    Everyone,
    /// Every connection whose character is in the room.
    Room(String),
    /// The connection bound to one character (`character:<id>`).
    Character(String),
}

impl Address {
    /// Whether a connection bound to `character` receives packets sent to
    /// this address.
    pub fn matches(&self, character: &Character) -> bool {
        match self {
            Self::Everyone => true,
            Self::Room(room) => character.room == *room,
            Self::Character(id) => character.id == *id,
        }
    }
}

impl From<String> for Address {
    fn from(raw: String) -> Self {
        if raw == "*" {
            Self::Everyone
        } else if let Some(id) = raw.strip_prefix(CHARACTER_PREFIX) {
            Self::Character(id.to_owned())
        } else {
            Self::Room(raw)
        }
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl core::fmt::Display for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Everyone => f.write_str("*"),
            Self::Room(room) => f.write_str(room),
            Self::Character(id) => write!(f, "{CHARACTER_PREFIX}{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn in_room(id: &str, room: &str) -> Character {
        let mut character = Character::new(id, id, Role::Hacker);
        room.clone_into(&mut character.room);
        character
    }

    #[test]
    fn parses_all_address_forms() {
        assert_eq!(Address::from("*".to_owned()), Address::Everyone);
        assert_eq!(
            Address::from("character:k".to_owned()),
            Address::Character("k".to_owned())
        );
        assert_eq!(
            Address::from("home:k".to_owned()),
            Address::Room("home:k".to_owned())
        );
        assert_eq!(Address::Character("k".to_owned()).to_string(), "character:k");
    }

    #[test]
    fn room_address_only_matches_residents() {
        let address = Address::Room("home".to_owned());
        assert!(address.matches(&in_room("a", "home")));
        assert!(!address.matches(&in_room("b", "plaza")));
    }

    #[test]
    fn character_address_matches_exact_id() {
        let address = Address::Character("a".to_owned());
        assert!(address.matches(&in_room("a", "home")));
        assert!(!address.matches(&in_room("ab", "home")));
        assert!(Address::Everyone.matches(&in_room("b", "plaza")));
    }
}
