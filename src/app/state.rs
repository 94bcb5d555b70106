//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;

use super::directory::RoomDirectory;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub directory: Arc<RoomDirectory>,
}

impl AppState {
    pub fn new(config: Arc<Config>, directory: Arc<RoomDirectory>) -> Self {
        Self { config, directory }
    }
}
