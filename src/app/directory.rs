//! Read-only view of the simulation published for the admin surface
//!
//! The server loop writes; HTTP handlers only read. Nothing here feeds back
//! into the simulation.

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;

use crate::ecs::PlayerId;
use crate::game::{RoomId, RoomState, Tick};

/// Snapshot of one room at publish time
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub state: RoomState,
    pub tick: Tick,
    pub players: Vec<PlayerId>,
    pub active_entities: usize,
    pub walls: usize,
    pub updated_at_ms: u64,
}

/// Server-wide counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerSummary {
    pub server_tick: Tick,
    pub connected_players: usize,
    pub queue_size: usize,
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub snapshots_sent: u64,
    pub snapshot_bytes: u64,
    pub skipped_entities: u64,
    pub players_kicked: u64,
    pub last_iteration_micros: u64,
}

#[derive(Default)]
pub struct RoomDirectory {
    rooms: DashMap<RoomId, RoomSummary>,
    server: RwLock<ServerSummary>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_room(&self, summary: RoomSummary) {
        self.rooms.insert(summary.id, summary);
    }

    pub fn remove_room(&self, id: RoomId) {
        self.rooms.remove(&id);
    }

    pub fn publish_server(&self, summary: ServerSummary) {
        *self.server.write() = summary;
    }

    pub fn room(&self, id: RoomId) -> Option<RoomSummary> {
        self.rooms.get(&id).map(|entry| entry.value().clone())
    }

    /// All rooms ordered by id
    pub fn rooms(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<_> = self.rooms.iter().map(|entry| entry.value().clone()).collect();
        rooms.sort_by_key(|room| room.id);
        rooms
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn server(&self) -> ServerSummary {
        self.server.read().clone()
    }
}
