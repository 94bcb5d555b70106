//! Game simulation modules

pub mod arena;
pub mod movement;
pub mod physics;
pub mod room;
pub mod scheduler;
pub mod server;
pub mod snapshot;

pub use room::{Room, RoomId, RoomSettings, RoomState};
pub use scheduler::{FixedStepClock, Tick, TickScheduler};
pub use server::{GameServer, ServerCounters};
pub use snapshot::{decode_snapshot, DecodedSnapshot, SnapshotEncoder, SnapshotThrottle};
