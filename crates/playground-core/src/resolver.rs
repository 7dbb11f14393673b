//! Where each broadcast packet is delivered on every node.
//!
//! [`route`] is a pure function of the packet: every node runs it on every
//! packet it receives from the bus (and on its own broadcasts) and hands
//! the result to local delivery. Packets with a recipient list are split
//! into one delivery per recipient with the list cleared, so no client sees
//! who else received the packet.

use playground_types::packets::{JoinPacket, LeavePacket};
use playground_types::{Address, Character, Packet};

/// One packet bound for one address.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Recipients on each node.
    pub address: Address,
    /// What they receive.
    pub packet: Packet,
}

impl Delivery {
    fn new(address: Address, packet: Packet) -> Self {
        Self { address, packet }
    }
}

/// Compute the deliveries for a broadcast packet.
///
/// Packets that are never broadcast (requests, replies sent straight to
/// one connection) produce no deliveries.
pub fn route(packet: &Packet) -> Vec<Delivery> {
    match packet {
        Packet::Message(p) => {
            let message = &p.message;
            let mut deliveries = vec![Delivery::new(
                Address::Character(message.to.clone()),
                packet.clone(),
            )];
            if message.from != message.to {
                deliveries.push(Delivery::new(
                    Address::Character(message.from.clone()),
                    packet.clone(),
                ));
            }
            deliveries
        }

        Packet::Chat(p) => to_room(&p.room, packet),
        Packet::Dance(p) => to_room(&p.room, packet),
        Packet::Move(p) => to_room(&p.room, packet),
        Packet::Leave(p) => to_room(&p.room, packet),
        Packet::WardrobeChange(p) => to_room(&p.room, packet),
        Packet::ElementAdd(p) | Packet::ElementUpdate(p) => to_room(&p.room, packet),
        Packet::HallwayAdd(p) | Packet::HallwayUpdate(p) => to_room(&p.room, packet),
        Packet::ElementDelete(p) | Packet::HallwayDelete(p) => to_room(&p.room, packet),

        Packet::Song(_) | Packet::PlaySong(_) => {
            vec![Delivery::new(Address::Everyone, packet.clone())]
        }

        Packet::Join(p) => {
            let room = p
                .character
                .as_ref()
                .map_or_else(|| p.room.clone(), |character| character.room.clone());
            vec![Delivery::new(Address::Room(room), Packet::Join(p.stripped()))]
        }

        Packet::FriendUpdate(p) => {
            let mut stripped = p.clone();
            let recipient = std::mem::take(&mut stripped.recipient_id);
            vec![Delivery::new(
                Address::Character(recipient),
                Packet::FriendUpdate(stripped),
            )]
        }

        Packet::QueueUpdateHacker(p) => {
            let mut stripped = p.clone();
            let recipients = std::mem::take(&mut stripped.character_ids);
            fan_out(recipients, &Packet::QueueUpdateHacker(stripped))
        }

        Packet::QueueUpdateSponsor(p) => {
            let mut stripped = p.clone();
            let recipients = std::mem::take(&mut stripped.character_ids);
            fan_out(recipients, &Packet::QueueUpdateSponsor(stripped))
        }

        Packet::Status(p) => {
            let mut stripped = p.clone();
            let mut recipients = std::mem::take(&mut stripped.teammate_ids);
            recipients.append(&mut stripped.friend_ids);
            fan_out(recipients, &Packet::Status(stripped))
        }

        Packet::Teleport(p) | Packet::TeleportHome(p) => {
            let character = p.character.clone().unwrap_or_default();
            let leave = Packet::Leave(LeavePacket {
                character: character.public(),
                room: p.from.clone(),
            });
            let join = Packet::Join(
                JoinPacket {
                    character: Some(character),
                    room: p.to.clone(),
                    ..JoinPacket::default()
                }
                .stripped(),
            );
            vec![
                Delivery::new(Address::Room(p.from.clone()), leave),
                Delivery::new(Address::Room(p.to.clone()), join),
            ]
        }

        _ => Vec::new(),
    }
}

fn to_room(room: &str, packet: &Packet) -> Vec<Delivery> {
    vec![Delivery::new(Address::Room(room.to_owned()), packet.clone())]
}

fn fan_out(recipients: Vec<String>, packet: &Packet) -> Vec<Delivery> {
    recipients
        .into_iter()
        .map(|id| Delivery::new(Address::Character(id), packet.clone()))
        .collect()
}

/// The character a join or teleport carries, used to evict stale holders.
pub fn joining_character(packet: &Packet) -> Option<(&Character, &str)> {
    match packet {
        Packet::Join(p) => p.character.as_ref().map(|c| (c, p.client_id.as_str())),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use super::*;
    use playground_types::models::Message;
    use playground_types::packets::{
        ChatPacket, FriendUpdatePacket, MessagePacket, MovePacket, QueueUpdateHackerPacket,
        StatusPacket, TeleportPacket,
    };
    use playground_types::{Friend, Role};

    #[test]
    fn room_packets_go_to_their_room() {
        let packet = Packet::Move(MovePacket {
            id: "k".to_owned(),
            room: "home".to_owned(),
            x: 0.4,
            y: 0.6,
        });
        let deliveries = route(&packet);
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].address, Address::Room("home".to_owned()));
        assert_eq!(deliveries[0].packet, packet);
    }

    #[test]
    fn messages_reach_both_sides_once() {
        let message = |from: &str, to: &str| {
            Packet::Message(MessagePacket {
                message: Message {
                    from: from.to_owned(),
                    to: to.to_owned(),
                    text: "hi".to_owned(),
                    ..Message::default()
                },
            })
        };
        let addresses: Vec<_> = route(&message("a", "b")).into_iter().map(|d| d.address).collect();
        assert_eq!(
            addresses,
            vec![Address::Character("b".to_owned()), Address::Character("a".to_owned())]
        );
        assert_eq!(route(&message("a", "a")).len(), 1);
    }

    #[test]
    fn recipient_lists_are_stripped() {
        let status = Packet::Status(StatusPacket {
            id: "k".to_owned(),
            online: true,
            friend_ids: vec!["f".to_owned()],
            teammate_ids: vec!["t".to_owned()],
            ..StatusPacket::default()
        });
        let deliveries = route(&status);
        assert_eq!(deliveries.len(), 2);
        for delivery in &deliveries {
            let Packet::Status(p) = &delivery.packet else { panic!("not a status") };
            assert!(p.friend_ids.is_empty() && p.teammate_ids.is_empty());
        }

        let queue = Packet::QueueUpdateHacker(QueueUpdateHackerPacket {
            sponsor_id: "acme".to_owned(),
            position: 1,
            character_ids: vec!["h".to_owned()],
            ..QueueUpdateHackerPacket::default()
        });
        let deliveries = route(&queue);
        assert_eq!(deliveries[0].address, Address::Character("h".to_owned()));
        let Packet::QueueUpdateHacker(p) = &deliveries[0].packet else { panic!() };
        assert!(p.character_ids.is_empty());

        let update = Packet::FriendUpdate(FriendUpdatePacket {
            recipient_id: "r".to_owned(),
            friend: Friend::default(),
        });
        let deliveries = route(&update);
        assert_eq!(deliveries[0].address, Address::Character("r".to_owned()));
        let Packet::FriendUpdate(p) = &deliveries[0].packet else { panic!() };
        assert!(p.recipient_id.is_empty());
    }

    #[test]
    fn teleports_split_into_leave_and_join() {
        let packet = Packet::Teleport(TeleportPacket {
            character: Some(Character::new("k", "Kay", Role::Hacker)),
            from: "home".to_owned(),
            to: "plaza".to_owned(),
            x: 0.5,
            y: 0.5,
        });
        let deliveries = route(&packet);
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].address, Address::Room("home".to_owned()));
        assert!(matches!(deliveries[0].packet, Packet::Leave(_)));
        assert_eq!(deliveries[1].address, Address::Room("plaza".to_owned()));
        let Packet::Join(join) = &deliveries[1].packet else { panic!() };
        assert_eq!(join.room, "plaza");
    }

    #[test]
    fn joins_are_stripped_of_credentials() {
        let mut character = Character::new("k", "Kay", Role::Hacker);
        character.email = "kay@example.com".to_owned();
        let packet = Packet::Join(JoinPacket {
            token: "secret".to_owned(),
            client_id: "conn".to_owned(),
            character: Some(character),
            room: "home".to_owned(),
            ..JoinPacket::default()
        });
        let deliveries = route(&packet);
        let Packet::Join(join) = &deliveries[0].packet else { panic!() };
        assert!(join.token.is_empty() && join.client_id.is_empty());
        assert!(join.character.as_ref().unwrap().email.is_empty());
    }

    #[test]
    fn chat_is_routed_to_its_room() {
        let chat = Packet::Chat(ChatPacket {
            id: "k".to_owned(),
            room: "plaza".to_owned(),
            mssg: "hi".to_owned(),
        });
        let deliveries = route(&chat);
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].address, Address::Room("plaza".to_owned()));
    }

    #[test]
    fn requests_are_not_routed() {
        use playground_types::packets::Empty;

        assert!(route(&Packet::GetSongs(Empty {})).is_empty());
        assert!(route(&Packet::GetCurrentSong(Empty {})).is_empty());
    }
}
