//! Configuration loading and management.
//!
//! Unlike the reference daemon, the AgentRoom service takes all of its
//! configuration from the process environment (§6 "Process environment") —
//! there is no on-disk config file to load or rehash.

use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid HOST value '{0}': {1}")]
    InvalidHost(String, std::net::AddrParseError),
    #[error("invalid PORT value '{0}': {1}")]
    InvalidPort(String, std::num::ParseIntError),
    #[error("invalid AGENTROOM_ZOMBIE_SWEEP_SECS value '{0}': {1}")]
    InvalidSweepInterval(String, std::num::ParseIntError),
}

/// Log output format, selected via `AGENTROOM_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen host (`HOST`, default `0.0.0.0`).
    pub host: IpAddr,
    /// Listen port (`PORT`, default `9000`).
    pub port: u16,
    /// Log output format (`AGENTROOM_LOG_FORMAT`).
    pub log_format: LogFormat,
    /// Cadence of the zombie-session sweep, in seconds (§4.5).
    pub zombie_sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 9000,
            log_format: LogFormat::Pretty,
            zombie_sweep_interval_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("HOST") {
            config.host = host
                .parse()
                .map_err(|e| ConfigError::InvalidHost(host.clone(), e))?;
        }

        if let Ok(port) = std::env::var("PORT") {
            config.port = port
                .parse()
                .map_err(|e| ConfigError::InvalidPort(port.clone(), e))?;
        }

        if let Ok(format) = std::env::var("AGENTROOM_LOG_FORMAT") {
            config.log_format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            };
        }

        if let Ok(secs) = std::env::var("AGENTROOM_ZOMBIE_SWEEP_SECS") {
            config.zombie_sweep_interval_secs = secs
                .parse()
                .map_err(|e| ConfigError::InvalidSweepInterval(secs.clone(), e))?;
        }

        Ok(config)
    }

    /// The address the HTTP+WebSocket gateway should bind to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
