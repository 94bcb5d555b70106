use std::collections::BTreeSet;
use std::time::Duration;

use proptest::prelude::*;

use arena_server::ecs::registry::registry;
use arena_server::ecs::{
    Collider, ComponentKind, ComponentMask, ComponentValue, EntityId, Health, Input, InputFlags,
    PlayerId, PlayerLink, Position, Transform, Velocity, World,
};
use arena_server::game::FixedStepClock;
use arena_server::math::{Aabb, Vec3};
use arena_server::net::codec::{decode_component, encode_component, encoded_len};
use arena_server::spatial::{Bvh, NodeKind};
use arena_server::spatial::bvh::MAX_DEPTH;

const KINDS: [ComponentKind; 3] = [ComponentKind::Position, ComponentKind::Velocity, ComponentKind::Health];

#[derive(Debug, Clone)]
enum Op {
    Create,
    Destroy(usize),
    Add(usize, usize),
    Remove(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Create),
        any::<usize>().prop_map(Op::Destroy),
        (any::<usize>(), 0..KINDS.len()).prop_map(|(e, k)| Op::Add(e, k)),
        (any::<usize>(), 0..KINDS.len()).prop_map(|(e, k)| Op::Remove(e, k)),
    ]
}

fn apply(world: &mut World, op: &Op) {
    let pick = |world: &World, n: usize| {
        let count = world.entity_count();
        (count > 0).then(|| EntityId((n % count) as u32))
    };
    match *op {
        Op::Create => {
            world.create_entity();
        }
        Op::Destroy(n) => {
            if let Some(id) = pick(world, n) {
                world.destroy_entity(id);
            }
        }
        Op::Add(n, k) => {
            if let Some(id) = pick(world, n) {
                match KINDS[k] {
                    ComponentKind::Position => {
                        world.add(id, Position { value: Vec3::splat(1.0) });
                    }
                    ComponentKind::Velocity => {
                        world.add(id, Velocity::default());
                    }
                    _ => {
                        world.add(id, Health::full(100.0));
                    }
                }
            }
        }
        Op::Remove(n, k) => {
            if let Some(id) = pick(world, n) {
                world.remove_kind(id, KINDS[k]);
            }
        }
    }
}

fn world_from(ops: &[Op]) -> World {
    let mut world = World::new();
    for op in ops {
        apply(&mut world, op);
    }
    world
}

fn boxes() -> impl Strategy<Value = Vec<Aabb>> {
    prop::collection::vec(
        ((-100.0f32..100.0, -100.0f32..100.0, -20.0f32..20.0), (0.1f32..10.0, 0.1f32..10.0, 0.1f32..5.0)),
        0..64,
    )
    .prop_map(|items| {
        items
            .into_iter()
            .map(|((x, y, z), (hx, hy, hz))| {
                Aabb::from_center_half_extents(Vec3::new(x, y, z), Vec3::new(hx, hy, hz))
            })
            .collect()
    })
}

fn area() -> impl Strategy<Value = Aabb> {
    ((-120.0f32..120.0, -120.0f32..120.0, -30.0f32..30.0), 0.0f32..40.0).prop_map(|((x, y, z), h)| {
        Aabb::from_center_half_extents(Vec3::new(x, y, z), Vec3::splat(h))
    })
}

fn vec3() -> impl Strategy<Value = Vec3> {
    (-1.0e6f32..1.0e6, -1.0e6f32..1.0e6, -1.0e6f32..1.0e6).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn component_value() -> impl Strategy<Value = ComponentValue> {
    prop_oneof![
        vec3().prop_map(|value| ComponentValue::Position(Position { value })),
        vec3().prop_map(|value| ComponentValue::Velocity(Velocity { value })),
        (vec3(), vec3())
            .prop_map(|(position, rotation)| ComponentValue::Transform(Transform { position, rotation })),
        (-1.0e4f32..1.0e4, 0.0f32..1.0e4, any::<bool>()).prop_map(|(current, maximum, alive)| {
            ComponentValue::Health(Health {
                current,
                maximum,
                alive,
            })
        }),
        (any::<u32>(), -1.0e4f32..1.0e4).prop_map(|(id, rating)| {
            ComponentValue::PlayerLink(PlayerLink {
                player_id: PlayerId(id),
                rating,
            })
        }),
        (any::<u16>(), -10.0f32..10.0, -10.0f32..10.0, any::<u32>(), any::<u64>()).prop_map(
            |(bits, yaw, pitch, sequence, input_tick)| {
                ComponentValue::Input(Input {
                    flags: InputFlags::from_bits_truncate(bits),
                    yaw,
                    pitch,
                    sequence,
                    input_tick,
                })
            }
        ),
        (vec3(), vec3(), any::<bool>(), any::<bool>()).prop_map(|(a, b, is_static, is_trigger)| {
            let bounds = Aabb::new(
                Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
                Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
            );
            ComponentValue::Collider(Collider {
                bounds,
                half_extents: bounds.half_extents(),
                is_static,
                is_trigger,
            })
        }),
    ]
}

proptest! {
    #[test]
    fn component_payloads_decode_to_the_encoded_values(value in component_value()) {
        let mut payload = Vec::new();
        encode_component(&value, &mut payload);
        prop_assert_eq!(payload.len(), encoded_len(value.kind()));

        let decoded = decode_component(value.kind(), &payload).unwrap();
        prop_assert_eq!(decoded, value);
    }

    #[test]
    fn mask_bits_match_stored_components(ops in prop::collection::vec(op(), 0..80)) {
        let world = world_from(&ops);
        let registry = registry();

        for raw in 0..world.entity_count() as u32 {
            let id = EntityId(raw);
            for kind in ComponentKind::ALL {
                let stored = world.value_of(id, kind).is_some();
                match world.mask_of(id) {
                    Some(mask) => prop_assert_eq!(mask.contains(registry.id(kind)), stored),
                    None => prop_assert!(!stored),
                }
            }
        }
    }

    #[test]
    fn query_returns_exactly_the_covering_entities(
        ops in prop::collection::vec(op(), 0..80),
        wanted in prop::sample::subsequence(KINDS.to_vec(), 0..=KINDS.len()),
    ) {
        let world = world_from(&ops);
        let required = ComponentMask::of(&wanted);
        let found = world.query(required);

        prop_assert!(found.windows(2).all(|w| w[0] < w[1]));

        let expected: Vec<EntityId> = (0..world.entity_count() as u32)
            .map(EntityId)
            .filter(|&id| world.mask_of(id).is_some_and(|mask| mask.is_superset_of(required)))
            .collect();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn bvh_query_has_no_false_negatives(items in boxes(), query in area()) {
        let mut bvh = Bvh::new();
        bvh.build(items.iter().copied());

        let mut hits = Vec::new();
        bvh.query(&query, &mut hits);
        let hits: BTreeSet<u32> = hits.into_iter().collect();

        let expected: BTreeSet<u32> = items
            .iter()
            .enumerate()
            .filter(|(_, b)| b.intersects(&query))
            .map(|(i, _)| i as u32)
            .collect();
        prop_assert_eq!(hits, expected);
    }

    #[test]
    fn bvh_leaves_partition_the_items(items in boxes()) {
        let mut bvh = Bvh::new();
        bvh.build(items.iter().copied());
        prop_assert!(bvh.depth() <= MAX_DEPTH);

        let in_leaves: u32 = bvh
            .nodes()
            .iter()
            .map(|node| match node.kind {
                NodeKind::Leaf { count, .. } => count,
                NodeKind::Internal { .. } => 0,
            })
            .sum();
        prop_assert_eq!(in_leaves as usize, items.len());
    }

    #[test]
    fn steps_are_floor_of_total_time(
        tick_rate in 1u32..240,
        slices in prop::collection::vec(0u64..100_000_000, 0..50),
    ) {
        let mut clock = FixedStepClock::new(tick_rate);
        let steps: u64 = slices
            .iter()
            .map(|&ns| u64::from(clock.accumulate(Duration::from_nanos(ns))))
            .sum();

        let total: u64 = slices.iter().sum();
        let step = clock.timestep().as_nanos() as u64;
        prop_assert_eq!(steps, total / step);
        prop_assert!(clock.leftover() < clock.timestep());
    }
}
