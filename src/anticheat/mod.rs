//! Threshold-based cheat detection
//!
//! Two signals per player: inbound packet rate (keyed governor quota) and
//! implied movement speed between samples. Each violation adds one to the
//! player's suspicion counter; at the kick threshold the server drops them.

use std::collections::HashMap;
use std::num::NonZeroU32;

use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter,
};

use crate::ecs::PlayerId;
use crate::math::Vec3;

type PacketLimiter = RateLimiter<PlayerId, DefaultKeyedStateStore<PlayerId>, DefaultClock>;

#[derive(Debug, Clone, Copy)]
pub struct AntiCheatSettings {
    pub enabled: bool,
    pub max_packets_per_second: u32,
    /// Units per second
    pub max_movement_speed: f32,
    pub kick_threshold: u32,
}

impl Default for AntiCheatSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_packets_per_second: 60,
            max_movement_speed: 1000.0,
            kick_threshold: 10,
        }
    }
}

/// Outcome of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub accepted: bool,
    /// Suspicion after this check
    pub suspicion: u32,
}

#[derive(Debug, Default)]
struct PlayerRecord {
    last_position: Option<Vec3>,
    suspicion: u32,
}

pub struct AntiCheat {
    settings: AntiCheatSettings,
    packets: PacketLimiter,
    players: HashMap<PlayerId, PlayerRecord>,
}

impl AntiCheat {
    pub fn new(settings: AntiCheatSettings) -> Self {
        let per_second = NonZeroU32::new(settings.max_packets_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            settings,
            packets: RateLimiter::keyed(Quota::per_second(per_second)),
            players: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &AntiCheatSettings {
        &self.settings
    }

    /// Count one inbound packet against the player's quota
    pub fn record_packet(&mut self, player_id: PlayerId) -> Verdict {
        if !self.settings.enabled {
            return self.verdict(player_id, true);
        }
        let accepted = self.packets.check_key(&player_id).is_ok();
        if !accepted {
            self.flag(player_id);
        }
        self.verdict(player_id, accepted)
    }

    /// Check the speed implied by moving to `position` over `elapsed` seconds.
    /// The first sample for a player only sets the baseline.
    pub fn check_movement(&mut self, player_id: PlayerId, position: Vec3, elapsed: f32) -> Verdict {
        if !self.settings.enabled {
            return self.verdict(player_id, true);
        }
        let max_speed = self.settings.max_movement_speed;
        let record = self.players.entry(player_id).or_default();
        let previous = record.last_position.replace(position);

        let accepted = match previous {
            Some(last) if elapsed > 0.0 => (position - last).length() / elapsed <= max_speed,
            _ => true,
        };
        if !accepted {
            record.suspicion += 1;
        }
        Verdict {
            accepted,
            suspicion: record.suspicion,
        }
    }

    pub fn suspicion(&self, player_id: PlayerId) -> u32 {
        self.players.get(&player_id).map_or(0, |r| r.suspicion)
    }

    pub fn should_kick(&self, player_id: PlayerId) -> bool {
        self.settings.enabled && self.suspicion(player_id) >= self.settings.kick_threshold
    }

    /// Forget everything about a player (disconnect or room change)
    pub fn reset(&mut self, player_id: PlayerId) {
        self.players.remove(&player_id);
    }

    /// Drop rate-limit state for players that have been quiet long enough
    pub fn sweep(&mut self) {
        self.packets.retain_recent();
    }

    fn flag(&mut self, player_id: PlayerId) {
        self.players.entry(player_id).or_default().suspicion += 1;
    }

    fn verdict(&self, player_id: PlayerId, accepted: bool) -> Verdict {
        Verdict {
            accepted,
            suspicion: self.suspicion(player_id),
        }
    }
}

impl Default for AntiCheat {
    fn default() -> Self {
        Self::new(AntiCheatSettings::default())
    }
}
