// ABOUTME: Configuration loading and validation for the tagwatch binary.
// ABOUTME: Reads TAGWATCH_* environment variables with defaults suitable for a local deployment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TAGWATCH_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("TAGWATCH_POLL_MS must be a positive integer of milliseconds: {0}")]
    InvalidPoll(String),
}

/// Runtime configuration shared by the ingestion pipeline, the query
/// server, and the simulator.
#[derive(Debug, Clone)]
pub struct TagwatchConfig {
    pub home: PathBuf,
    pub source: PathBuf,
    pub bind: SocketAddr,
    pub poll: Duration,
}

impl TagwatchConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// Environment variables:
    /// - TAGWATCH_HOME: data directory (default: ./data)
    /// - TAGWATCH_SOURCE: feed file to tail (default: <home>/tags.log)
    /// - TAGWATCH_BIND: socket address for the query API (default: 127.0.0.1:8630)
    /// - TAGWATCH_POLL_MS: feed poll interval in milliseconds (default: 100)
    pub fn from_env() -> Result<Self, ConfigError> {
        let home = std::env::var("TAGWATCH_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let source = std::env::var("TAGWATCH_SOURCE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join("tags.log"));

        let bind_str =
            std::env::var("TAGWATCH_BIND").unwrap_or_else(|_| "127.0.0.1:8630".to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        let poll_str = std::env::var("TAGWATCH_POLL_MS").unwrap_or_else(|_| "100".to_string());
        let poll_ms: u64 = match poll_str.parse() {
            Ok(ms) if ms > 0 => ms,
            _ => return Err(ConfigError::InvalidPoll(poll_str)),
        };

        Ok(Self {
            home,
            source,
            bind,
            poll: Duration::from_millis(poll_ms),
        })
    }

    /// Where the ingestion pipeline publishes the per-tag snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.home.join("state.json")
    }

    /// Where the tail reader persists its cursor.
    pub fn cursor_path(&self) -> PathBuf {
        self.home.join("tags.log.cursor")
    }

    /// Where the registration side-store lives.
    pub fn registry_path(&self) -> PathBuf {
        self.home.join("registry.db")
    }
}
