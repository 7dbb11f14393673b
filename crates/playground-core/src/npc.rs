//! The idle non-player character the leader walks around its room.

use playground_db::{Batch, DbError, Store, keys};
use playground_types::packets::MovePacket;
use playground_types::record::field;
use rand::Rng;

use crate::world::load_character;

/// A random position away from the room edges.
pub fn random_spot(rng: &mut impl Rng) -> (f64, f64) {
    (rng.random_range(0.1..0.9), rng.random_range(0.1..0.9))
}

/// Move the NPC `id` to `spot` and return the `move` to broadcast.
///
/// Returns `None` when the NPC has not been seeded.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn wander(store: &dyn Store, id: &str, spot: (f64, f64)) -> Result<Option<MovePacket>, DbError> {
    let Some(npc) = load_character(store, id).await? else {
        return Ok(None);
    };
    let (x, y) = spot;

    store
        .apply(
            Batch::new().hset(keys::character(id), vec![field("x", x), field("y", y)]),
        )
        .await?;

    Ok(Some(MovePacket {
        id: npc.id,
        room: npc.room,
        x,
        y,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use playground_types::{Character, HashRecord, Role};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use playground_db::MemoryStore;

    #[test]
    fn spots_stay_inside_the_room() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..100 {
            let (x, y) = random_spot(&mut rng);
            assert!((0.1..0.9).contains(&x));
            assert!((0.1..0.9).contains(&y));
        }
    }

    #[tokio::test]
    async fn wander_moves_a_seeded_npc() {
        let store = MemoryStore::new();
        assert_eq!(wander(&store, "tim", (0.3, 0.4)).await.unwrap(), None);

        let mut tim = Character::new("tim", "TIM the Beaver", Role::Guest);
        tim.room = "plaza".to_owned();
        store
            .apply(Batch::new().hset(keys::character("tim"), tim.to_fields()))
            .await
            .unwrap();

        let moved = wander(&store, "tim", (0.3, 0.4)).await.unwrap().unwrap();
        assert_eq!(moved.room, "plaza");
        let stored = load_character(&store, "tim").await.unwrap().unwrap();
        assert!((stored.x - 0.3).abs() < f64::EPSILON);
        assert!((stored.y - 0.4).abs() < f64::EPSILON);
    }
}
