//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::border::WorldBorder;
use crate::game::physics::MovementModel;
use crate::util::time::{DEFAULT_MAX_TICK_DT_MS, DEFAULT_TICK_RATE};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
    /// Allowed client origins for CORS (comma-separated); permissive when unset
    pub client_origin: Option<String>,
    /// Simulation settings
    pub world: WorldSettings,
}

/// Tunables for the world simulation
#[derive(Clone, Debug)]
pub struct WorldSettings {
    /// Ticks per second
    pub tick_rate: u32,
    /// World extent
    pub border: WorldBorder,
    /// How input acceleration turns into movement
    pub movement: MovementModel,
    /// Largest integration step a single tick may take
    pub max_tick_dt: Duration,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            border: WorldBorder::default(),
            movement: MovementModel::default(),
            max_tick_dt: Duration::from_millis(DEFAULT_MAX_TICK_DT_MS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let defaults = WorldBorder::default();
        let width = parse_or("WORLD_WIDTH", defaults.width)?;
        let height = parse_or("WORLD_HEIGHT", defaults.height)?;
        if !(width > 0.0 && height > 0.0) {
            return Err(ConfigError::Invalid("WORLD_WIDTH"));
        }

        let tick_rate = parse_or("TICK_RATE", DEFAULT_TICK_RATE)?;
        if tick_rate == 0 {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            log_json: env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")),

            client_origin: env::var("CLIENT_ORIGIN").ok(),

            world: WorldSettings {
                tick_rate,
                border: WorldBorder::new(width, height),
                movement: parse_or("MOVEMENT_MODEL", MovementModel::default())?,
                max_tick_dt: Duration::from_millis(parse_or(
                    "MAX_TICK_DT_MS",
                    DEFAULT_MAX_TICK_DT_MS,
                )?),
            },
        })
    }
}

/// Read an optional variable, falling back to `default` when unset
fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
