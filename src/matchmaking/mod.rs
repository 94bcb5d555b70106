//! Matchmaking

pub mod queue;

pub use queue::{MatchmakingQueue, QueueError, QueuedPlayer};
