//! Shared application state for the admin surface

pub mod directory;
pub mod state;

pub use directory::{RoomDirectory, RoomSummary, ServerSummary};
pub use state::AppState;
