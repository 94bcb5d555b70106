//! Room: one isolated simulation session

use std::fmt;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::ecs::{ComponentKind, ComponentMask, EntityId, Input, PlayerId, PlayerLink, Position, World};
use crate::net::InputPayload;

use super::arena::{build_arena, pick_spawn_point, spawn_player};
use super::movement::movement_system;
use super::physics::PhysicsSystem;
use super::scheduler::{FixedStepClock, Tick};
use super::snapshot::SnapshotThrottle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RoomId(pub u32);

impl RoomId {
    /// Lobby room every connecting player starts in
    pub const LOBBY: Self = Self(0);
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Active,
    Closed,
}

/// Per-room settings
#[derive(Debug, Clone, Copy)]
pub struct RoomSettings {
    pub tick_rate: u32,
    pub snapshot_interval_ticks: Tick,
    /// Held input is cleared once it is older than this many ticks
    pub input_timeout_ticks: Tick,
    pub seed: u64,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            snapshot_interval_ticks: 10,
            input_timeout_ticks: 60,
            seed: 0,
        }
    }
}

/// A session owning one World, its tick counter and its fixed-step accumulator
pub struct Room {
    id: RoomId,
    state: RoomState,
    world: World,
    tick: Tick,
    clock: FixedStepClock,
    players: Vec<PlayerId>,
    walls: Vec<EntityId>,
    rng: ChaCha8Rng,
    throttle: SnapshotThrottle,
    settings: RoomSettings,
}

impl Room {
    /// Create an active room with movement and physics systems and the arena geometry
    pub fn new(id: RoomId, settings: RoomSettings) -> Self {
        let mut world = World::new();
        world.add_system(movement_system());
        world.add_system(PhysicsSystem::default().into_system());
        let walls = build_arena(&mut world);

        info!(
            room_id = %id,
            tick_rate = settings.tick_rate,
            walls = walls.len(),
            "Room created"
        );

        Self {
            id,
            state: RoomState::Active,
            world,
            tick: 0,
            clock: FixedStepClock::new(settings.tick_rate),
            players: Vec::new(),
            walls,
            rng: ChaCha8Rng::seed_from_u64(settings.seed),
            throttle: SnapshotThrottle::new(settings.snapshot_interval_ticks),
            settings,
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == RoomState::Active
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn walls(&self) -> &[EntityId] {
        &self.walls
    }

    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.players.contains(&player_id)
    }

    /// Fixed timestep in seconds
    pub fn dt(&self) -> f32 {
        self.clock.dt()
    }

    fn add_member(&mut self, player_id: PlayerId) {
        if !self.players.contains(&player_id) {
            self.players.push(player_id);
        }
    }

    /// Add `player_id` and give it a player entity, reusing a living one if present
    pub fn add_player(&mut self, player_id: PlayerId) -> EntityId {
        self.add_member(player_id);
        if let Some(existing) = self.player_entity(player_id) {
            return existing;
        }

        let occupied: Vec<_> = self
            .world
            .query(ComponentMask::of(&[ComponentKind::PlayerLink, ComponentKind::Position]))
            .into_iter()
            .filter_map(|id| self.world.get::<Position>(id).map(|p| p.value))
            .collect();
        let (at, fallback) = pick_spawn_point(&mut self.rng, &occupied);
        if fallback {
            warn!(room_id = %self.id, player_id = %player_id, "No clear spawn point, using fallback");
        }

        let entity = spawn_player(&mut self.world, player_id, at);
        info!(
            room_id = %self.id,
            player_id = %player_id,
            entity_id = %entity,
            x = at.x,
            y = at.y,
            "Player spawned"
        );
        entity
    }

    /// Remove the player and destroy its entity
    pub fn remove_player(&mut self, player_id: PlayerId) -> bool {
        let was_member = self.players.contains(&player_id);
        self.players.retain(|p| *p != player_id);
        if let Some(entity) = self.player_entity(player_id) {
            self.world.destroy_entity(entity);
        }
        if was_member {
            info!(room_id = %self.id, player_id = %player_id, "Player left room");
        }
        was_member
    }

    /// Living entity linked to `player_id`
    pub fn player_entity(&self, player_id: PlayerId) -> Option<EntityId> {
        self.world
            .query(ComponentMask::of(&[ComponentKind::PlayerLink]))
            .into_iter()
            .find(|&id| {
                self.world
                    .get::<PlayerLink>(id)
                    .is_some_and(|link| link.player_id == player_id)
            })
    }

    /// Store the latest input for the player's entity. Input that is not newer
    /// than the held one (by wrapping sequence order) is ignored.
    pub fn apply_input(&mut self, player_id: PlayerId, input: &InputPayload, sequence: u32) -> bool {
        let Some(entity) = self.player_entity(player_id) else {
            return false;
        };
        let tick = self.tick;
        let updated = Input {
            flags: input.flags,
            yaw: input.yaw,
            pitch: input.pitch,
            sequence,
            input_tick: tick,
        };
        match self.world.get_mut::<Input>(entity) {
            Some(current) if !sequence_is_newer(sequence, current.sequence) => {
                trace!(
                    room_id = %self.id,
                    player_id = %player_id,
                    sequence,
                    held = current.sequence,
                    "Out-of-order input ignored"
                );
                return false;
            }
            Some(current) => *current = updated,
            None => {
                self.world.add(entity, updated);
            }
        }
        true
    }

    /// Clear held flags for inputs older than the timeout. Returns how many were cleared.
    pub fn clear_stale_inputs(&mut self) -> usize {
        let timeout = self.settings.input_timeout_ticks;
        let tick = self.tick;
        let mut cleared = 0;
        for id in self.world.query(ComponentMask::of(&[ComponentKind::Input])) {
            if let Some(input) = self.world.get_mut::<Input>(id) {
                if !input.flags.is_empty() && tick.saturating_sub(input.input_tick) > timeout {
                    input.flags = Default::default();
                    cleared += 1;
                }
            }
        }
        cleared
    }

    /// Run one fixed step: all systems, tick increment, stale-input sweep.
    /// Closed rooms do not advance.
    pub fn step(&mut self) {
        if !self.is_active() {
            return;
        }
        let dt = self.clock.dt();
        self.world.update(dt);
        self.tick += 1;
        let cleared = self.clear_stale_inputs();
        if cleared > 0 {
            debug!(room_id = %self.id, tick = self.tick, cleared, "Cleared stale input");
        }
    }

    /// Whether a snapshot should go out for the current tick
    pub fn snapshot_due(&mut self) -> bool {
        self.is_active() && self.throttle.should_send(self.tick)
    }

    pub fn close(&mut self) {
        if self.state == RoomState::Active {
            self.state = RoomState::Closed;
            info!(room_id = %self.id, tick = self.tick, "Room closed");
        }
    }
}

/// `a` comes after `b` in a sequence space that wraps at `u32::MAX`
fn sequence_is_newer(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Collider, InputFlags, Velocity};
    use crate::math::Vec3;

    fn room() -> Room {
        Room::new(RoomId(1), RoomSettings { seed: 5, ..RoomSettings::default() })
    }

    #[test]
    fn new_room_has_arena_and_systems() {
        let room = room();
        assert!(room.is_active());
        assert_eq!(room.walls().len(), 13);
        assert_eq!(room.world().system_names(), vec!["movement", "physics"]);
    }

    #[test]
    fn one_entity_per_player() {
        let mut room = room();
        let a = room.add_player(PlayerId(1));
        let again = room.add_player(PlayerId(1));
        assert_eq!(a, again);
        assert_eq!(room.players(), &[PlayerId(1)]);

        assert!(room.remove_player(PlayerId(1)));
        assert!(room.player_entity(PlayerId(1)).is_none());
        assert!(!room.world().is_alive(a));
        assert!(!room.remove_player(PlayerId(1)));
    }

    #[test]
    fn input_moves_player_after_a_step() {
        let mut room = room();
        let e = room.add_player(PlayerId(2));
        let start = room.world().get::<Position>(e).unwrap().value;

        let input = InputPayload {
            flags: InputFlags::FORWARD,
            yaw: 0.0,
            pitch: 0.0,
        };
        assert!(room.apply_input(PlayerId(2), &input, 1));
        room.step();

        let v = room.world().get::<Velocity>(e).unwrap().value;
        assert!(v.y > 0.0);
        let moved = room.world().get::<Position>(e).unwrap().value;
        assert_ne!(moved, start);
        assert_eq!(room.tick(), 1);
    }

    #[test]
    fn late_input_does_not_replace_newer_input() {
        let mut room = room();
        let e = room.add_player(PlayerId(2));
        let forward = InputPayload {
            flags: InputFlags::FORWARD,
            yaw: 0.5,
            pitch: 0.0,
        };
        let back = InputPayload {
            flags: InputFlags::BACKWARD,
            yaw: -0.5,
            pitch: 0.0,
        };

        assert!(room.apply_input(PlayerId(2), &forward, 5));
        assert!(!room.apply_input(PlayerId(2), &back, 3));
        assert!(!room.apply_input(PlayerId(2), &back, 5));
        let held = *room.world().get::<Input>(e).unwrap();
        assert_eq!(held.flags, InputFlags::FORWARD);
        assert_eq!(held.sequence, 5);

        // Sequence numbers wrap
        room.world_mut().get_mut::<Input>(e).unwrap().sequence = u32::MAX;
        assert!(room.apply_input(PlayerId(2), &back, 0));
        assert_eq!(room.world().get::<Input>(e).unwrap().flags, InputFlags::BACKWARD);
    }

    #[test]
    fn stale_input_is_cleared() {
        let mut room = Room::new(
            RoomId(1),
            RoomSettings {
                input_timeout_ticks: 3,
                ..RoomSettings::default()
            },
        );
        let e = room.add_player(PlayerId(2));
        let input = InputPayload {
            flags: InputFlags::LEFT,
            yaw: 0.0,
            pitch: 0.0,
        };
        room.apply_input(PlayerId(2), &input, 1);
        for _ in 0..3 {
            room.step();
        }
        assert_eq!(room.world().get::<Input>(e).unwrap().flags, InputFlags::LEFT);
        room.step();
        assert!(room.world().get::<Input>(e).unwrap().flags.is_empty());
    }

    #[test]
    fn full_step_respects_world_boundary() {
        let mut room = Room::new(RoomId(1), RoomSettings { tick_rate: 1, ..RoomSettings::default() });
        let e = room.add_player(PlayerId(0));
        let world = room.world_mut();
        world.get_mut::<Position>(e).unwrap().value = Vec3::new(74.0, 0.0, 0.0);
        world.get_mut::<Velocity>(e).unwrap().value = Vec3::new(100.0, 0.0, 0.0);
        world.get_mut::<Collider>(e).unwrap().recenter(Vec3::new(74.0, 0.0, 0.0));

        room.step();

        let pos = room.world().get::<Position>(e).unwrap().value;
        assert_eq!(pos.x, 74.5);
    }

    #[test]
    fn membership_changes_do_not_bring_snapshots_forward() {
        let mut room = room();
        room.add_player(PlayerId(1));

        let mut sent_at = Vec::new();
        for tick in 0..10 {
            match tick {
                3 => {
                    room.add_player(PlayerId(2));
                }
                5 => {
                    room.remove_player(PlayerId(2));
                }
                _ => {}
            }
            if room.snapshot_due() {
                sent_at.push(room.tick());
            }
            room.step();
        }
        assert_eq!(sent_at, vec![0]);

        assert!(room.snapshot_due());
        assert_eq!(room.tick(), 10);
    }

    #[test]
    fn closed_room_stops_advancing() {
        let mut room = room();
        for _ in 0..3 {
            room.step();
        }
        room.close();
        room.step();
        assert!(!room.snapshot_due());
        assert_eq!(room.tick(), 3);
    }
}
