//! Authoritative simulation core for a multiplayer arena server
//!
//! - `ecs`: entity-component world, component registry, systems
//! - `spatial`: bounding volume hierarchy for broad-phase collision
//! - `game`: movement, physics, rooms, scheduler, snapshots, server loop
//! - `net`: packet layout, component codec, datagram transports
//! - `matchmaking` and `anticheat`: the server loop's collaborators
//! - `app` and `http`: read-only admin surface

pub mod anticheat;
pub mod app;
pub mod config;
pub mod ecs;
pub mod game;
pub mod http;
pub mod matchmaking;
pub mod math;
pub mod net;
pub mod spatial;
pub mod util;
