//! Arena geometry and player spawning

use rand::Rng;

use crate::ecs::{
    Collider, EntityId, Health, Input, PlayerId, PlayerLink, Position, Transform, Velocity, World,
};
use crate::math::Vec3;

/// Arena spans [-MAP_EXTENT, MAP_EXTENT] on x and y
pub const MAP_EXTENT: f32 = 75.0;
pub const PLAYER_HALF_EXTENTS: Vec3 = Vec3::new(0.5, 1.0, 0.5);
pub const PLAYER_MAX_HEALTH: f32 = 100.0;
pub const DEFAULT_RATING: f32 = 1000.0;

/// Minimum planar distance between a new spawn and existing players
pub const MIN_SPAWN_DISTANCE: f32 = 5.0;
pub const MAX_SPAWN_ATTEMPTS: usize = 50;
/// Fallback spawns are pulled toward the center by this factor
const FALLBACK_SCALE: f32 = 0.3;

/// Static box obstacle (center, full size)
#[derive(Debug, Clone, Copy)]
pub struct Obstacle {
    pub center: Vec3,
    pub size: Vec3,
}

const fn obstacle(x: f32, y: f32, w: f32) -> Obstacle {
    Obstacle {
        center: Vec3::new(x, y, 0.0),
        size: Vec3::new(w, w, 2.0),
    }
}

/// Fixed layout: corner blocks, a center block, four mid-field blocks and four small pillars
pub const OBSTACLES: [Obstacle; 13] = [
    obstacle(-70.0, -70.0, 8.0),
    obstacle(70.0, -70.0, 8.0),
    obstacle(-70.0, 70.0, 8.0),
    obstacle(70.0, 70.0, 8.0),
    obstacle(0.0, 0.0, 6.0),
    obstacle(-30.0, -30.0, 4.0),
    obstacle(30.0, -30.0, 4.0),
    obstacle(-30.0, 30.0, 4.0),
    obstacle(30.0, 30.0, 4.0),
    obstacle(-50.0, 0.0, 3.0),
    obstacle(50.0, 0.0, 3.0),
    obstacle(0.0, -50.0, 3.0),
    obstacle(0.0, 50.0, 3.0),
];

/// Create one static collider entity per obstacle
pub fn build_arena(world: &mut World) -> Vec<EntityId> {
    OBSTACLES
        .iter()
        .map(|o| {
            let id = world.create_entity();
            world.add(id, Position { value: o.center });
            world.add(id, Collider::new(o.center, o.size * 0.5, true));
            id
        })
        .collect()
}

/// Pick a spawn point on the ground plane away from `occupied`.
/// Returns the point and whether the fallback was used.
pub fn pick_spawn_point<R: Rng + ?Sized>(rng: &mut R, occupied: &[Vec3]) -> (Vec3, bool) {
    for _ in 0..MAX_SPAWN_ATTEMPTS {
        let candidate = Vec3::new(
            rng.gen_range(-MAP_EXTENT..MAP_EXTENT),
            rng.gen_range(-MAP_EXTENT..MAP_EXTENT),
            0.0,
        );
        let clear = occupied.iter().all(|p| {
            let dx = candidate.x - p.x;
            let dy = candidate.y - p.y;
            (dx * dx + dy * dy).sqrt() >= MIN_SPAWN_DISTANCE
        });
        if clear {
            return (candidate, false);
        }
    }

    let fallback = Vec3::new(
        rng.gen_range(-MAP_EXTENT..MAP_EXTENT) * FALLBACK_SCALE,
        rng.gen_range(-MAP_EXTENT..MAP_EXTENT) * FALLBACK_SCALE,
        0.0,
    );
    (fallback, true)
}

/// Create a player entity with the full player component set
pub fn spawn_player(world: &mut World, player_id: PlayerId, at: Vec3) -> EntityId {
    let id = world.create_entity();
    world.add(id, Position { value: at });
    world.add(id, Velocity::default());
    world.add(id, Health::full(PLAYER_MAX_HEALTH));
    world.add(
        id,
        PlayerLink {
            player_id,
            rating: DEFAULT_RATING,
        },
    );
    world.add(
        id,
        Transform {
            position: at,
            rotation: Vec3::ZERO,
        },
    );
    world.add(id, Input::default());
    world.add(id, Collider::new(at, PLAYER_HALF_EXTENTS, false));
    id
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::ecs::{ComponentKind, ComponentMask};

    #[test]
    fn arena_has_thirteen_static_walls() {
        let mut world = World::new();
        let walls = build_arena(&mut world);
        assert_eq!(walls.len(), 13);
        for id in walls {
            let c = world.get::<Collider>(id).unwrap();
            assert!(c.is_static && !c.is_trigger);
            assert!(world.get::<PlayerLink>(id).is_none());
        }
        let center = world.get::<Collider>(EntityId(4)).unwrap().bounds;
        assert_eq!(center.min, Vec3::new(-3.0, -3.0, -1.0));
    }

    #[test]
    fn spawns_keep_their_distance() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut occupied = Vec::new();
        for _ in 0..10 {
            let (p, fallback) = pick_spawn_point(&mut rng, &occupied);
            assert!(!fallback);
            assert!(p.x.abs() <= MAP_EXTENT && p.y.abs() <= MAP_EXTENT);
            for q in &occupied {
                let d: Vec3 = p - *q;
                assert!((d.x * d.x + d.y * d.y).sqrt() >= MIN_SPAWN_DISTANCE);
            }
            occupied.push(p);
        }
    }

    #[test]
    fn crowded_arena_falls_back_near_center() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        // A grid every 3 units leaves no point 5 units from everything
        let occupied: Vec<Vec3> = (-26..=26)
            .flat_map(|x| (-26..=26).map(move |y| Vec3::new(x as f32 * 3.0, y as f32 * 3.0, 0.0)))
            .collect();
        let (p, fallback) = pick_spawn_point(&mut rng, &occupied);
        assert!(fallback);
        assert!(p.x.abs() <= MAP_EXTENT * FALLBACK_SCALE);
        assert!(p.y.abs() <= MAP_EXTENT * FALLBACK_SCALE);
    }

    #[test]
    fn player_entity_carries_full_component_set() {
        let mut world = World::new();
        let e = spawn_player(&mut world, PlayerId(3), Vec3::new(1.0, 2.0, 0.0));
        let mask = ComponentMask::of(&ComponentKind::ALL);
        assert_eq!(world.mask_of(e), Some(mask));
        assert_eq!(world.get::<PlayerLink>(e).unwrap().player_id, PlayerId(3));
        assert_eq!(world.get::<Health>(e).unwrap().current, 100.0);
        let bounds = world.get::<Collider>(e).unwrap().bounds;
        assert_eq!(bounds.size(), Vec3::new(1.0, 2.0, 1.0));
    }
}
