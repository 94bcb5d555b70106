//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// UDP game socket address
    pub server_addr: SocketAddr,
    /// Admin HTTP address, `None` when disabled with `ADMIN_ADDR=off`
    pub admin_addr: Option<SocketAddr>,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Fixed simulation steps per second
    pub tick_rate: u32,
    pub snapshot_interval_ticks: u64,
    /// Receive attempts per loop iteration
    pub max_recv_per_iteration: usize,
    pub input_timeout_ticks: u64,
    /// Players silent for longer than this are dropped
    pub player_timeout_ticks: u64,

    pub players_per_match: u8,
    pub matchmaking_queue_capacity: usize,

    pub anti_cheat_enabled: bool,
    pub max_packets_per_second: u32,
    pub max_movement_speed: f32,
    pub suspicion_kick_threshold: u32,

    /// Base seed for spawn placement; random when unset
    pub spawn_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 7777)),
            admin_addr: Some(SocketAddr::from(([0, 0, 0, 0], 8080))),
            log_level: "info".to_string(),
            tick_rate: 60,
            snapshot_interval_ticks: 10,
            max_recv_per_iteration: 64,
            input_timeout_ticks: 60,
            player_timeout_ticks: 600,
            players_per_match: 2,
            matchmaking_queue_capacity: 256,
            anti_cheat_enabled: true,
            max_packets_per_second: 60,
            max_movement_speed: 1000.0,
            suspicion_kick_threshold: 10,
            spawn_seed: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // PORT wins over SERVER_ADDR (hosting platforms set it)
        let server_addr = match lookup("PORT") {
            Some(port) => parse_value("PORT", &format!("0.0.0.0:{}", port.trim()))?,
            None => parse_or(&lookup, "SERVER_ADDR", defaults.server_addr)?,
        };

        let admin_addr = match lookup("ADMIN_ADDR") {
            Some(value) if value.trim().eq_ignore_ascii_case("off") => None,
            Some(value) => Some(parse_value("ADMIN_ADDR", &value)?),
            None => defaults.admin_addr,
        };

        let tick_rate: u32 = parse_or(&lookup, "TICK_RATE", defaults.tick_rate)?;
        if tick_rate == 0 {
            return Err(ConfigError::Invalid {
                key: "TICK_RATE",
                value: "0".to_string(),
            });
        }

        let players_per_match: u8 = parse_or(&lookup, "PLAYERS_PER_MATCH", defaults.players_per_match)?;
        if players_per_match == 0 {
            return Err(ConfigError::Invalid {
                key: "PLAYERS_PER_MATCH",
                value: "0".to_string(),
            });
        }

        let spawn_seed = match lookup("SPAWN_SEED") {
            Some(value) => Some(parse_value("SPAWN_SEED", &value)?),
            None => None,
        };

        Ok(Self {
            server_addr,
            admin_addr,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            tick_rate,
            snapshot_interval_ticks: parse_or(
                &lookup,
                "SNAPSHOT_INTERVAL_TICKS",
                defaults.snapshot_interval_ticks,
            )?,
            max_recv_per_iteration: parse_or(
                &lookup,
                "MAX_RECV_PER_ITERATION",
                defaults.max_recv_per_iteration,
            )?,
            input_timeout_ticks: parse_or(&lookup, "INPUT_TIMEOUT_TICKS", defaults.input_timeout_ticks)?,
            player_timeout_ticks: parse_or(&lookup, "PLAYER_TIMEOUT_TICKS", defaults.player_timeout_ticks)?,
            players_per_match,
            matchmaking_queue_capacity: parse_or(
                &lookup,
                "MATCHMAKING_QUEUE_CAPACITY",
                defaults.matchmaking_queue_capacity,
            )?,
            anti_cheat_enabled: parse_or(&lookup, "ANTI_CHEAT_ENABLED", defaults.anti_cheat_enabled)?,
            max_packets_per_second: parse_or(
                &lookup,
                "MAX_PACKETS_PER_SECOND",
                defaults.max_packets_per_second,
            )?,
            max_movement_speed: parse_or(&lookup, "MAX_MOVEMENT_SPEED", defaults.max_movement_speed)?,
            suspicion_kick_threshold: parse_or(
                &lookup,
                "SUSPICION_KICK_THRESHOLD",
                defaults.suspicion_kick_threshold,
            )?,
            spawn_seed,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => parse_value(key, &value),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server_addr.port(), 7777);
        assert_eq!(config.admin_addr.map(|a| a.port()), Some(8080));
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.snapshot_interval_ticks, 10);
        assert_eq!(config.players_per_match, 2);
        assert!(config.anti_cheat_enabled);
        assert!(config.spawn_seed.is_none());
    }

    #[test]
    fn port_overrides_server_addr() {
        let config = load(&[("PORT", "9000"), ("SERVER_ADDR", "127.0.0.1:1234")]).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:9000".parse().unwrap());

        let config = load(&[("SERVER_ADDR", "127.0.0.1:1234")]).unwrap();
        assert_eq!(config.server_addr, "127.0.0.1:1234".parse().unwrap());
    }

    #[test]
    fn admin_surface_can_be_disabled() {
        let config = load(&[("ADMIN_ADDR", "OFF")]).unwrap();
        assert!(config.admin_addr.is_none());
    }

    #[test]
    fn invalid_values_name_their_key() {
        match load(&[("TICK_RATE", "fast")]) {
            Err(ConfigError::Invalid { key, value }) => {
                assert_eq!(key, "TICK_RATE");
                assert_eq!(value, "fast");
            }
            other => panic!("expected invalid TICK_RATE, got {other:?}"),
        }
        assert!(load(&[("TICK_RATE", "0")]).is_err());
        assert!(load(&[("ANTI_CHEAT_ENABLED", "yes")]).is_err());
    }

    #[test]
    fn tuning_values_are_parsed() {
        let config = load(&[
            ("ANTI_CHEAT_ENABLED", "false"),
            ("MAX_MOVEMENT_SPEED", "25.5"),
            ("SPAWN_SEED", "42"),
            ("PLAYERS_PER_MATCH", "4"),
        ])
        .unwrap();
        assert!(!config.anti_cheat_enabled);
        assert_eq!(config.max_movement_speed, 25.5);
        assert_eq!(config.spawn_seed, Some(42));
        assert_eq!(config.players_per_match, 4);
    }
}
