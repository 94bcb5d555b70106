//! Collision resolution and world-boundary constraints

use crate::ecs::{
    Collider, ComponentKind, ComponentMask, EntityId, Position, SystemDescriptor, Velocity, World,
};
use crate::math::{Aabb, Vec3};
use crate::spatial::Bvh;

/// Runs after movement in the same tick
pub const PHYSICS_PRIORITY: i32 = 20;

/// Physics constants
#[derive(Debug, Clone, Copy)]
pub struct PhysicsTuning {
    /// Hard limit for every non-static collider
    pub world_bounds: Aabb,
    /// Extra separation added to each push-out
    pub epsilon: f32,
    /// Velocity factor applied after a collision
    pub friction: f32,
    /// Push used when two centers coincide exactly
    pub degenerate_push: Vec3,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            world_bounds: Aabb::new(Vec3::new(-75.0, -75.0, -50.0), Vec3::new(75.0, 75.0, 50.0)),
            epsilon: 0.01,
            friction: 0.5,
            degenerate_push: Vec3::new(0.1, 0.0, 0.0),
        }
    }
}

/// Center clamped so a box of `half_extents` stays inside `bounds`
pub fn clamp_to_bounds(center: Vec3, half_extents: Vec3, bounds: &Aabb) -> Vec3 {
    let lo = bounds.min + half_extents;
    let hi = bounds.max - half_extents;
    Vec3::new(
        center.x.max(lo.x).min(hi.x),
        center.y.max(lo.y).min(hi.y),
        center.z.max(lo.z).min(hi.z),
    )
}

/// Per-item flags captured at index build time
#[derive(Debug, Clone, Copy)]
struct Indexed {
    id: EntityId,
    is_static: bool,
    is_trigger: bool,
}

/// AABB push-out collision system. Owns the spatial index and its scratch
/// buffers so a tick allocates nothing in steady state.
pub struct PhysicsSystem {
    tuning: PhysicsTuning,
    bvh: Bvh,
    indexed: Vec<Indexed>,
    candidates: Vec<u32>,
}

impl PhysicsSystem {
    pub fn new(tuning: PhysicsTuning) -> Self {
        Self {
            tuning,
            bvh: Bvh::new(),
            indexed: Vec::new(),
            candidates: Vec::new(),
        }
    }

    pub fn tuning(&self) -> &PhysicsTuning {
        &self.tuning
    }

    /// Wrap into a descriptor over (Position, Collider)
    pub fn into_system(mut self) -> SystemDescriptor {
        SystemDescriptor::new(
            "physics",
            ComponentMask::of(&[ComponentKind::Position, ComponentKind::Collider]),
            PHYSICS_PRIORITY,
            move |world, ids, dt| self.step(world, ids, dt),
        )
    }

    /// Resolve one tick for `colliders`, the entities carrying Position and Collider
    pub fn step(&mut self, world: &mut World, colliders: &[EntityId], dt: f32) {
        self.sync_bounds(world, colliders);
        self.rebuild_index(world, colliders);

        for item in 0..self.indexed.len() {
            let entry = self.indexed[item];
            if entry.is_static || entry.is_trigger {
                continue;
            }
            self.resolve(world, item as u32, entry.id, dt);
        }
    }

    /// Recenter every collider and clamp non-static ones to the world bounds
    fn sync_bounds(&self, world: &mut World, colliders: &[EntityId]) {
        for &id in colliders {
            let Some(mut center) = world.get::<Position>(id).map(|p| p.value) else {
                continue;
            };
            let Some(collider) = world.get::<Collider>(id).copied() else {
                continue;
            };

            if !collider.is_static {
                let clamped =
                    clamp_to_bounds(center, collider.half_extents, &self.tuning.world_bounds);
                if clamped != center {
                    center = clamped;
                    if let Some(p) = world.get_mut::<Position>(id) {
                        p.value = center;
                    }
                }
            }

            if let Some(c) = world.get_mut::<Collider>(id) {
                c.recenter(center);
            }
        }
    }

    fn rebuild_index(&mut self, world: &World, colliders: &[EntityId]) {
        self.indexed.clear();
        let mut boxes = Vec::with_capacity(colliders.len());
        for &id in colliders {
            if let Some(c) = world.get::<Collider>(id) {
                self.indexed.push(Indexed {
                    id,
                    is_static: c.is_static,
                    is_trigger: c.is_trigger,
                });
                boxes.push(c.bounds);
            }
        }
        self.bvh.build(boxes);
    }

    fn resolve(&mut self, world: &mut World, item: u32, id: EntityId, dt: f32) {
        let (Some(position), Some(velocity), Some(collider)) = (
            world.get::<Position>(id).map(|p| p.value),
            world.get::<Velocity>(id).map(|v| v.value),
            world.get::<Collider>(id).copied(),
        ) else {
            return;
        };

        let predicted = position + velocity * dt;
        let predicted_bounds = Aabb::from_center_half_extents(predicted, collider.half_extents);
        let own_extent = collider.bounds.size().length();

        self.bvh.query(&predicted_bounds, &mut self.candidates);

        let mut hit = false;
        let mut correction = Vec3::ZERO;
        for &other in &self.candidates {
            if other == item || self.indexed[other as usize].is_trigger {
                continue;
            }
            let Some(other_bounds) = self.bvh.bounds(other) else {
                continue;
            };
            if !predicted_bounds.intersects(other_bounds) {
                continue;
            }
            hit = true;

            let away = predicted - other_bounds.center();
            let distance = away.length();
            if distance > 0.0 {
                let overlap = (own_extent + other_bounds.size().length()) * 0.5 - distance;
                if overlap > 0.0 {
                    correction += away * (1.0 / distance) * (overlap + self.tuning.epsilon);
                }
            } else {
                correction += self.tuning.degenerate_push;
            }
        }

        if !hit {
            return;
        }

        let resolved = predicted + correction;
        if let Some(p) = world.get_mut::<Position>(id) {
            p.value = resolved;
        }
        if let Some(v) = world.get_mut::<Velocity>(id) {
            v.value = v.value * self.tuning.friction;
        }
        if let Some(c) = world.get_mut::<Collider>(id) {
            c.recenter(resolved);
        }
    }
}

impl Default for PhysicsSystem {
    fn default() -> Self {
        Self::new(PhysicsTuning::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;
    const PLAYER_HALF: Vec3 = Vec3::new(0.5, 1.0, 0.5);

    fn spawn(world: &mut World, at: Vec3, velocity: Vec3, is_static: bool) -> EntityId {
        let e = world.create_entity();
        world.add(e, Position { value: at });
        world.add(e, Velocity { value: velocity });
        world.add(e, Collider::new(at, PLAYER_HALF, is_static));
        e
    }

    fn run(world: &mut World, dt: f32) {
        let mut physics = PhysicsSystem::default();
        let ids = world.query(ComponentMask::of(&[ComponentKind::Position, ComponentKind::Collider]));
        physics.step(world, &ids, dt);
    }

    #[test]
    fn out_of_bounds_position_is_clamped() {
        let mut world = World::new();
        let e = spawn(&mut world, Vec3::new(174.0, 0.0, 0.0), Vec3::new(100.0, 0.0, 0.0), false);
        run(&mut world, 1.0);

        let pos = world.get::<Position>(e).unwrap().value;
        assert_eq!(pos.x, 74.5);
        let bounds = world.get::<Collider>(e).unwrap().bounds;
        assert_eq!(bounds.max.x, 75.0);
    }

    #[test]
    fn static_colliders_are_not_clamped_or_moved() {
        let mut world = World::new();
        let wall = spawn(&mut world, Vec3::new(90.0, 0.0, 0.0), Vec3::ZERO, true);
        run(&mut world, DT);
        assert_eq!(world.get::<Position>(wall).unwrap().value.x, 90.0);
    }

    #[test]
    fn overlapping_movers_separate_and_slow_down() {
        let mut world = World::new();
        let a = spawn(&mut world, Vec3::ZERO, Vec3::new(-1.0, 0.0, 0.0), false);
        let b = spawn(&mut world, Vec3::new(0.5, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), false);
        run(&mut world, DT);

        let ca = world.get::<Collider>(a).unwrap().bounds;
        let cb = world.get::<Collider>(b).unwrap().bounds;
        assert!(!ca.intersects(&cb));

        let pa = world.get::<Position>(a).unwrap().value;
        let pb = world.get::<Position>(b).unwrap().value;
        assert!((pa.x + 1.96).abs() < 0.01, "a at {pa:?}");
        assert!((pb.x - 2.46).abs() < 0.01, "b at {pb:?}");

        assert_eq!(world.get::<Velocity>(a).unwrap().value.x, -0.5);
        assert_eq!(world.get::<Velocity>(b).unwrap().value.x, 0.5);
    }

    #[test]
    fn triggers_do_not_block() {
        let mut world = World::new();
        let mover = spawn(&mut world, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), false);
        let zone = spawn(&mut world, Vec3::new(0.5, 0.0, 0.0), Vec3::ZERO, true);
        if let Some(c) = world.get_mut::<Collider>(zone) {
            c.is_trigger = true;
        }
        run(&mut world, DT);

        assert_eq!(world.get::<Position>(mover).unwrap().value, Vec3::ZERO);
        assert_eq!(world.get::<Velocity>(mover).unwrap().value.x, 1.0);
    }

    #[test]
    fn coincident_centers_use_nominal_push() {
        let mut world = World::new();
        spawn(&mut world, Vec3::new(10.0, 10.0, 0.0), Vec3::ZERO, true);
        let mover = spawn(&mut world, Vec3::new(10.0, 10.0, 0.0), Vec3::ZERO, false);
        run(&mut world, DT);

        let pos = world.get::<Position>(mover).unwrap().value;
        assert!((pos.x - 10.1).abs() < 1e-5);
        assert_eq!(pos.y, 10.0);
    }
}
