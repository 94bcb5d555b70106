//! Movement: held input → velocity → integrated position

use crate::ecs::{
    ComponentKind, ComponentMask, EntityId, Input, InputFlags, Position, SystemDescriptor,
    Transform, Velocity, World,
};
use crate::math::Vec3;

/// Movement runs before collision resolution
pub const MOVEMENT_PRIORITY: i32 = 10;

/// Movement constants
#[derive(Debug, Clone, Copy)]
pub struct MovementTuning {
    /// Ground speed in units per second
    pub base_speed: f32,
    /// Speed multiplier while sprint is held
    pub sprint_multiplier: f32,
    /// Hard cap on velocity magnitude
    pub max_speed: f32,
    /// Per-tick velocity factor when no direction is held
    pub damping: f32,
    /// Squared speed under which a damped velocity snaps to zero
    pub stop_threshold_sq: f32,
}

impl MovementTuning {
    pub const DEFAULT: Self = Self {
        base_speed: 5.0,
        sprint_multiplier: 1.5,
        max_speed: 10.0,
        damping: 0.3,
        stop_threshold_sq: 0.1,
    };
}

impl Default for MovementTuning {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Planar direction for the held flags: forward +Y, right +X
pub fn wish_direction(flags: InputFlags) -> Vec3 {
    let mut dir = Vec3::ZERO;
    if flags.contains(InputFlags::FORWARD) {
        dir.y += 1.0;
    }
    if flags.contains(InputFlags::BACKWARD) {
        dir.y -= 1.0;
    }
    if flags.contains(InputFlags::RIGHT) {
        dir.x += 1.0;
    }
    if flags.contains(InputFlags::LEFT) {
        dir.x -= 1.0;
    }
    dir.normalized()
}

/// One fixed step of motion. Returns the new (position, velocity).
pub fn step_motion(
    tuning: &MovementTuning,
    flags: InputFlags,
    position: Vec3,
    velocity: Vec3,
    dt: f32,
) -> (Vec3, Vec3) {
    // Opposing keys cancel out and take the damping path
    let direction = wish_direction(flags);
    let mut velocity = if direction != Vec3::ZERO {
        let mut speed = tuning.base_speed;
        if flags.contains(InputFlags::SPRINT) {
            speed *= tuning.sprint_multiplier;
        }
        let mut v = direction * speed;
        v.z = 0.0;
        v
    } else {
        let damped = velocity * tuning.damping;
        if damped.length_squared() < tuning.stop_threshold_sq {
            Vec3::ZERO
        } else {
            damped
        }
    };

    let speed = velocity.length();
    if speed > tuning.max_speed {
        velocity = velocity * (tuning.max_speed / speed);
    }

    (position + velocity * dt, velocity)
}

fn step_entity(world: &mut World, id: EntityId, dt: f32) {
    let (Some(input), Some(velocity), Some(position)) = (
        world.get::<Input>(id).copied(),
        world.get::<Velocity>(id).copied(),
        world.get::<Position>(id).copied(),
    ) else {
        return;
    };

    let (new_position, new_velocity) = step_motion(
        &MovementTuning::DEFAULT,
        input.flags,
        position.value,
        velocity.value,
        dt,
    );

    if let Some(v) = world.get_mut::<Velocity>(id) {
        v.value = new_velocity;
    }
    if let Some(p) = world.get_mut::<Position>(id) {
        p.value = new_position;
    }
    if let Some(t) = world.get_mut::<Transform>(id) {
        t.position = new_position;
        t.rotation.y = input.yaw;
    }
}

/// Movement system descriptor (Input, Velocity, Position, Transform)
pub fn movement_system() -> SystemDescriptor {
    SystemDescriptor::per_entity(
        "movement",
        ComponentMask::of(&[
            ComponentKind::Input,
            ComponentKind::Velocity,
            ComponentKind::Position,
            ComponentKind::Transform,
        ]),
        MOVEMENT_PRIORITY,
        step_entity,
    )
}
