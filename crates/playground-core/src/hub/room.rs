//! Movement, room changes and room editing.

use playground_db::{Batch, keys};
use playground_types::address::CHARACTER_PREFIX;
use playground_types::models::achievements;
use playground_types::packets::{
    ChatPacket, DancePacket, DeletePacket, ElementPacket, ElementTogglePacket, HallwayPacket,
    MovePacket, TeleportPacket, WardrobeChangePacket,
};
use playground_types::record::{field, flag};
use playground_types::{Character, ConnectionId, Element, ErrorCode, HashRecord, Packet, Role};

use super::Hub;
use crate::error::CoreError;
use crate::world::{self, load_character, load_record, new_id};

/// Room only college students and organizers may enter.
const NIGHTCLUB: &str = "nightclub";

/// Prefix of sponsor room ids.
const SPONSOR_ROOM_PREFIX: &str = "sponsor:";

/// Keep a client-supplied coordinate strictly inside the room.
fn clamp_coordinate(value: f64) -> f64 {
    if value.is_nan() {
        0.5
    } else {
        value.clamp(0.01, 0.99)
    }
}

/// Arrival coordinate: anything outside `(0, 1)` lands in the middle.
fn arrival_coordinate(value: f64) -> f64 {
    if value > 0.0 && value < 1.0 { value } else { 0.5 }
}

impl Hub {
    /// `chat`: printable ASCII only.
    pub(super) async fn chat(&mut self, me: &Character, p: ChatPacket) -> Result<(), CoreError> {
        if !p.mssg.is_ascii() {
            tracing::debug!(character = %me.id, "Dropping non-ASCII chat");
            return Ok(());
        }
        self.broadcast(Packet::Chat(ChatPacket {
            id: me.id.clone(),
            room: me.room.clone(),
            mssg: p.mssg,
        }))
        .await
    }

    /// `dance`.
    pub(super) async fn dance(&mut self, me: &Character, p: DancePacket) -> Result<(), CoreError> {
        self.broadcast(Packet::Dance(DancePacket {
            id: me.id.clone(),
            room: me.room.clone(),
            dance: p.dance,
        }))
        .await
    }

    /// `move`. A failed position write is fatal to the node.
    pub(super) async fn move_to(
        &mut self,
        sender: ConnectionId,
        me: &Character,
        p: MovePacket,
    ) -> Result<(), CoreError> {
        let x = clamp_coordinate(p.x);
        let y = clamp_coordinate(p.y);

        self.ctx
            .store
            .apply(Batch::new().hset(keys::character(&me.id), vec![field("x", x), field("y", y)]))
            .await
            .map_err(CoreError::PositionPersistence)?;

        self.update_character(sender, |c| {
            c.x = x;
            c.y = y;
        });

        self.broadcast(Packet::Move(MovePacket {
            id: me.id.clone(),
            room: me.room.clone(),
            x,
            y,
        }))
        .await
    }

    /// `teleport` and `teleport_home`.
    pub(super) async fn teleport(
        &mut self,
        sender: ConnectionId,
        me: &Character,
        p: TeleportPacket,
        home: bool,
    ) -> Result<(), CoreError> {
        let store = self.ctx.store.clone();
        let from = me.room.clone();
        let x = arrival_coordinate(p.x);
        let y = arrival_coordinate(p.y);

        let mut to = if home {
            if me.sponsor_id.is_empty() {
                world::ensure_personal_room(store.as_ref(), &self.ctx.settings, &me.id).await?
            } else {
                format!("{SPONSOR_ROOM_PREFIX}{}", me.sponsor_id)
            }
        } else {
            p.to
        };

        if let Some(friend) = to.strip_prefix(CHARACTER_PREFIX).map(str::to_owned) {
            if !store.sismember(&keys::friends(&me.id), &friend).await? {
                tracing::debug!(character = %me.id, %friend, "Refusing teleport to a non-friend");
                return Ok(());
            }
            let Some(room) = store.hget(&keys::character(&friend), "room").await? else {
                return Ok(());
            };
            to = room;
        }

        if !world::room_exists(store.as_ref(), &to).await? {
            tracing::debug!(character = %me.id, room = %to, "Refusing teleport to an unknown room");
            return Ok(());
        }

        if to == NIGHTCLUB && !me.is_college && me.role != Role::Organizer {
            self.send_to(sender, &Packet::error(ErrorCode::HIGH_SCHOOL_NIGHT_CLUB));
            return Ok(());
        }

        store
            .apply(
                Batch::new()
                    .hset(
                        keys::character(&me.id),
                        vec![field("room", &to), field("x", x), field("y", y)],
                    )
                    .srem(keys::room_characters(&from), me.id.as_str()),
            )
            .await?;

        let init = world::init_packet(store.as_ref(), &self.ctx.secrets.jwt_secret, &me.id, &to, false).await?;
        self.send_to(sender, &Packet::Init(init));

        store
            .apply(Batch::new().sadd(keys::room_characters(&to), me.id.as_str()))
            .await?;

        if to.starts_with(SPONSOR_ROOM_PREFIX) {
            let visited = store
                .hincrby(&keys::character(&me.id), "numSponsorsVisited", 1)
                .await?;
            if visited == self.ctx.settings.achievements.num_sponsors {
                store
                    .apply(Batch::new().hset_one(
                        keys::achievements(&me.id),
                        achievements::COMPANY_TOUR,
                        flag(true),
                    ))
                    .await?;
            }
        }

        let character = load_character(store.as_ref(), &me.id)
            .await?
            .unwrap_or_else(|| me.clone());
        self.update_character(sender, |c| {
            c.room.clone_from(&to);
            c.x = x;
            c.y = y;
            c.num_sponsors_visited = character.num_sponsors_visited;
        });

        let teleport = TeleportPacket {
            character: Some(character.public()),
            from,
            to,
            x,
            y,
        };
        let packet = if home {
            Packet::TeleportHome(teleport)
        } else {
            Packet::Teleport(teleport)
        };
        self.broadcast(packet).await
    }

    /// `wardrobe_change`.
    pub(super) async fn wardrobe_change(
        &mut self,
        sender: ConnectionId,
        me: &Character,
        p: WardrobeChangePacket,
    ) -> Result<(), CoreError> {
        self.ctx
            .store
            .apply(Batch::new().hset(
                keys::character(&me.id),
                vec![
                    field("eyeColor", &p.eye_color),
                    field("skinColor", &p.skin_color),
                    field("shirtColor", &p.shirt_color),
                    field("pantsColor", &p.pants_color),
                ],
            ))
            .await?;

        self.update_character(sender, |c| {
            c.eye_color.clone_from(&p.eye_color);
            c.skin_color.clone_from(&p.skin_color);
            c.shirt_color.clone_from(&p.shirt_color);
            c.pants_color.clone_from(&p.pants_color);
        });

        self.broadcast(Packet::WardrobeChange(WardrobeChangePacket {
            character_id: me.id.clone(),
            room: me.room.clone(),
            ..p
        }))
        .await
    }

    /// `element_toggle`: advance to the element's next image. Only elements
    /// of the sender's own room can be toggled.
    pub(super) async fn element_toggle(&mut self, me: &Character, p: ElementTogglePacket) -> Result<(), CoreError> {
        let store = self.ctx.store.clone();
        if !store.lrange(&keys::room_elements(&me.room), 0, -1).await?.contains(&p.id) {
            tracing::debug!(character = %me.id, element = %p.id, "Element is not in the sender's room");
            return Ok(());
        }
        let Some(mut element) = load_record::<Element>(store.as_ref(), &keys::element(&p.id), &p.id).await? else {
            return Ok(());
        };

        let next = element.state.saturating_add(1);
        element.state = if next < element.state_count() { next } else { 0 };
        store
            .apply(Batch::new().hset_one(keys::element(&p.id), "state", element.state.to_string()))
            .await?;

        self.broadcast(Packet::ElementUpdate(ElementPacket {
            room: me.room.clone(),
            id: p.id,
            element,
        }))
        .await
    }

    /// `element_add`.
    pub(super) async fn element_add(&mut self, me: &Character, mut p: ElementPacket) -> Result<(), CoreError> {
        p.room.clone_from(&me.room);
        p.id = new_id();
        p.element.id.clone_from(&p.id);

        self.ctx
            .store
            .apply(
                Batch::new()
                    .hset(keys::element(&p.id), p.element.to_fields())
                    .rpush(keys::room_elements(&p.room), p.id.as_str()),
            )
            .await?;
        self.broadcast(Packet::ElementAdd(p)).await
    }

    /// `element_update`.
    pub(super) async fn element_update(&mut self, me: &Character, mut p: ElementPacket) -> Result<(), CoreError> {
        p.room.clone_from(&me.room);
        p.element.id.clone_from(&p.id);

        self.ctx
            .store
            .apply(Batch::new().hset(keys::element(&p.id), p.element.to_fields()))
            .await?;
        self.broadcast(Packet::ElementUpdate(p)).await
    }

    /// `element_delete`.
    pub(super) async fn element_delete(&mut self, me: &Character, mut p: DeletePacket) -> Result<(), CoreError> {
        p.room.clone_from(&me.room);

        self.ctx
            .store
            .apply(
                Batch::new()
                    .del(keys::element(&p.id))
                    .lrem(keys::room_elements(&p.room), 0, p.id.as_str()),
            )
            .await?;
        self.broadcast(Packet::ElementDelete(p)).await
    }

    /// `hallway_add`.
    pub(super) async fn hallway_add(&mut self, me: &Character, mut p: HallwayPacket) -> Result<(), CoreError> {
        p.room.clone_from(&me.room);
        p.id = new_id();
        p.hallway.id.clone_from(&p.id);

        self.ctx
            .store
            .apply(
                Batch::new()
                    .hset(keys::hallway(&p.id), p.hallway.to_fields())
                    .sadd(keys::room_hallways(&p.room), p.id.as_str()),
            )
            .await?;
        self.broadcast(Packet::HallwayAdd(p)).await
    }

    /// `hallway_update`.
    pub(super) async fn hallway_update(&mut self, me: &Character, mut p: HallwayPacket) -> Result<(), CoreError> {
        p.room.clone_from(&me.room);
        p.hallway.id.clone_from(&p.id);

        self.ctx
            .store
            .apply(Batch::new().hset(keys::hallway(&p.id), p.hallway.to_fields()))
            .await?;
        self.broadcast(Packet::HallwayUpdate(p)).await
    }

    /// `hallway_delete`.
    pub(super) async fn hallway_delete(&mut self, me: &Character, mut p: DeletePacket) -> Result<(), CoreError> {
        p.room.clone_from(&me.room);

        self.ctx
            .store
            .apply(
                Batch::new()
                    .del(keys::hallway(&p.id))
                    .srem(keys::room_hallways(&p.room), p.id.as_str()),
            )
            .await?;
        self.broadcast(Packet::HallwayDelete(p)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_are_clamped_inside_the_room() {
        assert!((clamp_coordinate(0.4) - 0.4).abs() < f64::EPSILON);
        assert!((clamp_coordinate(-3.0) - 0.01).abs() < f64::EPSILON);
        assert!((clamp_coordinate(1.0) - 0.99).abs() < f64::EPSILON);
        assert!((clamp_coordinate(f64::NAN) - 0.5).abs() < f64::EPSILON);
        assert!((clamp_coordinate(f64::INFINITY) - 0.99).abs() < f64::EPSILON);
    }

    #[test]
    fn arrivals_outside_the_room_land_in_the_middle() {
        assert!((arrival_coordinate(0.25) - 0.25).abs() < f64::EPSILON);
        assert!((arrival_coordinate(0.0) - 0.5).abs() < f64::EPSILON);
        assert!((arrival_coordinate(1.5) - 0.5).abs() < f64::EPSILON);
        assert!((arrival_coordinate(f64::NAN) - 0.5).abs() < f64::EPSILON);
    }
}
