//! Reading and writing characters and rooms in the shared store.
//!
//! Rooms are built from the templates in [`RoomsConfig`](crate::config::RoomsConfig):
//! seeded rooms on reset, personal rooms (`home:<character>`) lazily on
//! the first `teleport_home`, and arbitrary rooms through the REST API.

use playground_db::{Batch, DbError, Store, keys};
use playground_types::packets::InitPacket;
use playground_types::{Character, Element, Hallway, HashRecord, Role, Room, RoomSnapshot, Sponsor};

use crate::auth;
use crate::config::{RoomTemplate, Settings};
use crate::error::CoreError;

/// Load the record stored under `key`, or `None` when the hash is empty.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn load_record<T: HashRecord>(
    store: &dyn Store,
    key: &str,
    id: &str,
) -> Result<Option<T>, DbError> {
    let fields = store.hgetall(key).await?;
    if fields.is_empty() {
        return Ok(None);
    }
    Ok(Some(T::from_fields(id, &fields)))
}

/// Load a character.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn load_character(store: &dyn Store, id: &str) -> Result<Option<Character>, DbError> {
    load_record(store, &keys::character(id), id).await
}

/// Load a sponsor.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn load_sponsor(store: &dyn Store, id: &str) -> Result<Option<Sponsor>, DbError> {
    load_record(store, &keys::sponsor(id), id).await
}

/// Write every field of `character`.
#[must_use]
pub fn save_character(batch: Batch, character: &Character) -> Batch {
    batch.hset(keys::character(&character.id), character.to_fields())
}

/// Whether a room with this id was ever created.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn room_exists(store: &dyn Store, id: &str) -> Result<bool, DbError> {
    store.sismember(keys::ROOMS, id).await
}

/// Every room id, sorted.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn room_ids(store: &dyn Store) -> Result<Vec<String>, DbError> {
    let mut ids = store.smembers(keys::ROOMS).await?;
    ids.sort();
    Ok(ids)
}

/// Everything a client needs to render `room_id`.
///
/// Residents whose records are missing are skipped; emails are removed.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn room_snapshot(store: &dyn Store, room_id: &str) -> Result<RoomSnapshot, DbError> {
    let room = load_record::<Room>(store, &keys::room(room_id), room_id)
        .await?
        .unwrap_or_else(|| Room {
            id: room_id.to_owned(),
            ..Room::default()
        });

    let mut snapshot = RoomSnapshot {
        room,
        ..RoomSnapshot::default()
    };

    for id in store.smembers(&keys::room_characters(room_id)).await? {
        if let Some(character) = load_character(store, &id).await? {
            snapshot.characters.insert(id, character.public());
        }
    }

    for id in store.lrange(&keys::room_elements(room_id), 0, -1).await? {
        if let Some(element) = load_record::<Element>(store, &keys::element(&id), &id).await? {
            snapshot.elements.push(element);
        }
    }

    for id in store.smembers(&keys::room_hallways(room_id)).await? {
        if let Some(hallway) = load_record::<Hallway>(store, &keys::hallway(&id), &id).await? {
            snapshot.hallways.insert(id, hallway);
        }
    }

    Ok(snapshot)
}

/// The value substituted for `<id>` in a template: the part of the room id
/// after its first `:`, or the whole id.
fn template_subject(room_id: &str) -> &str {
    room_id.split_once(':').map_or(room_id, |(_, rest)| rest)
}

/// Create `room_id` from `template`, replacing anything already stored
/// under the room hash.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn create_room(store: &dyn Store, room_id: &str, template: &RoomTemplate) -> Result<(), DbError> {
    let subject = template_subject(room_id);
    let room = Room {
        id: room_id.to_owned(),
        background: template.background.replace("<id>", subject),
        sponsor: template.sponsor,
    };

    let mut batch = Batch::new().hset(keys::room(room_id), room.to_fields());

    for seed in &template.elements {
        let element = seed.instantiate(new_id(), subject);
        batch = batch
            .hset(keys::element(&element.id), element.to_fields())
            .rpush(keys::room_elements(room_id), element.id);
    }

    for seed in &template.hallways {
        let hallway = seed.instantiate(new_id());
        batch = batch
            .hset(keys::hallway(&hallway.id), hallway.to_fields())
            .sadd(keys::room_hallways(room_id), hallway.id);
    }

    store.apply(batch.sadd(keys::ROOMS, room_id)).await?;
    tracing::debug!(room = room_id, "Created room");
    Ok(())
}

/// The personal room of `character_id`, created from the personal
/// template the first time it is needed.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn ensure_personal_room(
    store: &dyn Store,
    settings: &Settings,
    character_id: &str,
) -> Result<String, DbError> {
    let room_id = format!("home:{character_id}");
    if !room_exists(store, &room_id).await? {
        let template = settings
            .rooms
            .templates
            .get(&settings.rooms.personal_template)
            .cloned()
            .unwrap_or_default();
        create_room(store, &room_id, &template).await?;
    }
    Ok(room_id)
}

/// Wipe the store and create the configured rooms, sponsors and NPC.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn reset(store: &dyn Store, settings: &Settings) -> Result<(), DbError> {
    store.flush().await?;

    for seed in &settings.rooms.seed {
        let Some(template) = settings.rooms.templates.get(&seed.template) else {
            tracing::warn!(room = %seed.id, template = %seed.template, "Unknown room template; skipping");
            continue;
        };
        create_room(store, &seed.id, template).await?;
    }

    for seed in &settings.sponsors {
        let sponsor = Sponsor {
            id: seed.id.clone(),
            name: seed.name.clone(),
            description: seed.description.clone(),
            url: seed.url.clone(),
            challenges: seed.challenges.clone(),
            queue_open: false,
        };
        store
            .apply(
                Batch::new()
                    .hset(keys::sponsor(&sponsor.id), sponsor.to_fields())
                    .sadd(keys::SPONSORS, &sponsor.id),
            )
            .await?;

        let template = settings.rooms.templates.get(&seed.template).cloned().unwrap_or_default();
        create_room(store, &format!("sponsor:{}", seed.id), &template).await?;
    }

    let npc = &settings.npc;
    let mut character = Character::new(&npc.id, &npc.name, Role::Guest);
    character.bio.clone_from(&npc.bio);
    character.room.clone_from(&npc.room);
    character.is_college = true;
    store
        .apply(save_character(Batch::new(), &character).sadd(keys::room_characters(&npc.room), &npc.id))
        .await?;

    tracing::info!(
        rooms = settings.rooms.seed.len(),
        sponsors = settings.sponsors.len(),
        "Store reset and seeded"
    );
    Ok(())
}

/// Build the `init` packet for `character_id` entering `room_id`.
///
/// When `with_token` is set a fresh bearer token is included.
///
/// # Errors
///
/// Returns an error if a store call fails or the token cannot be signed.
pub async fn init_packet(
    store: &dyn Store,
    jwt_secret: &str,
    character_id: &str,
    room_id: &str,
    with_token: bool,
) -> Result<InitPacket, CoreError> {
    let character = load_character(store, character_id)
        .await?
        .unwrap_or_else(|| Character::new(character_id, "", Role::Guest));
    let room = room_snapshot(store, room_id).await?;
    let token = if with_token {
        auth::issue_token(jwt_secret, character_id)?
    } else {
        String::new()
    };

    Ok(InitPacket {
        character,
        room,
        token,
        first_time: false,
    })
}

/// A fresh random id for a stored record.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::{ElementSeed, HallwaySeed, RoomSeed, SponsorSeed};
    use playground_db::MemoryStore;

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.rooms.templates.insert(
            "home".to_owned(),
            RoomTemplate {
                background: "town_square.svg".to_owned(),
                sponsor: false,
                elements: vec![
                    ElementSeed {
                        path: "lamp.svg".to_owned(),
                        ..ElementSeed::default()
                    },
                    ElementSeed {
                        path: "fountain.svg".to_owned(),
                        ..ElementSeed::default()
                    },
                ],
                hallways: vec![HallwaySeed {
                    to: "plaza".to_owned(),
                    ..HallwaySeed::default()
                }],
            },
        );
        settings.rooms.templates.insert(
            "sponsor".to_owned(),
            RoomTemplate {
                background: "sponsors/<id>.svg".to_owned(),
                sponsor: true,
                ..RoomTemplate::default()
            },
        );
        settings.rooms.seed.push(RoomSeed {
            id: "home".to_owned(),
            template: "home".to_owned(),
        });
        settings.sponsors.push(SponsorSeed {
            id: "acme".to_owned(),
            name: "Acme".to_owned(),
            description: String::new(),
            url: String::new(),
            challenges: String::new(),
            template: "sponsor".to_owned(),
        });
        settings
    }

    #[tokio::test]
    async fn reset_seeds_rooms_sponsors_and_npc() {
        let store = MemoryStore::new();
        let settings = settings();
        reset(&store, &settings).await.unwrap();

        assert_eq!(room_ids(&store).await.unwrap(), vec!["home", "sponsor:acme"]);

        let home = room_snapshot(&store, "home").await.unwrap();
        assert_eq!(home.room.background, "town_square.svg");
        assert_eq!(home.elements.len(), 2);
        assert_eq!(home.elements[0].path, "lamp.svg");
        assert_eq!(home.hallways.len(), 1);
        assert!(home.characters.contains_key("tim"));

        let acme = room_snapshot(&store, "sponsor:acme").await.unwrap();
        assert!(acme.room.sponsor);
        assert_eq!(acme.room.background, "sponsors/acme.svg");
        assert_eq!(load_sponsor(&store, "acme").await.unwrap().unwrap().name, "Acme");
    }

    #[tokio::test]
    async fn personal_rooms_are_created_once() {
        let store = MemoryStore::new();
        let settings = settings();
        let room = ensure_personal_room(&store, &settings, "k").await.unwrap();
        assert_eq!(room, "home:k");
        assert!(room_exists(&store, "home:k").await.unwrap());

        let again = ensure_personal_room(&store, &settings, "k").await.unwrap();
        assert_eq!(again, room);
        assert_eq!(room_ids(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn snapshots_hide_emails() {
        let store = MemoryStore::new();
        let mut character = Character::new("k", "Kay", Role::Hacker);
        character.email = "kay@example.com".to_owned();
        store
            .apply(save_character(Batch::new(), &character).sadd(keys::room_characters("home"), "k"))
            .await
            .unwrap();

        let snapshot = room_snapshot(&store, "home").await.unwrap();
        assert_eq!(snapshot.characters["k"].name, "Kay");
        assert!(snapshot.characters["k"].email.is_empty());
    }

    #[tokio::test]
    async fn init_packets_carry_a_verifiable_token() {
        let store = MemoryStore::new();
        store
            .apply(save_character(Batch::new(), &Character::new("k", "Kay", Role::Hacker)))
            .await
            .unwrap();

        let init = init_packet(&store, "secret", "k", "home", true).await.unwrap();
        assert_eq!(init.character.name, "Kay");
        assert_eq!(auth::verify_token("secret", &init.token).unwrap(), "k");

        let init = init_packet(&store, "secret", "k", "home", false).await.unwrap();
        assert!(init.token.is_empty());
    }
}
