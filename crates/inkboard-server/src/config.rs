//! Server configuration, read from the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const BIND_VAR: &str = "INKBOARD_BIND";
pub const HANDSHAKE_TIMEOUT_VAR: &str = "INKBOARD_HANDSHAKE_TIMEOUT_SECS";
pub const MAX_MESSAGE_BYTES_VAR: &str = "INKBOARD_MAX_MESSAGE_BYTES";
pub const OUTBOUND_CAPACITY_VAR: &str = "INKBOARD_OUTBOUND_CAPACITY";

const DEFAULT_PORT: u16 = 6000;
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;
const DEFAULT_OUTBOUND_CAPACITY: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind: SocketAddr,
    /// How long a new connection may take to send its SYNC_REQUEST.
    pub handshake_timeout: Duration,
    /// Largest accepted WebSocket frame/message.
    pub max_message_bytes: usize,
    /// Messages a session may have queued before it counts as stalled.
    pub outbound_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(bind) = parse(&lookup, BIND_VAR)? {
            config.bind = bind;
        }
        if let Some(secs) = parse_positive(&lookup, HANDSHAKE_TIMEOUT_VAR)? {
            config.handshake_timeout = Duration::from_secs(secs);
        }
        if let Some(bytes) = parse_positive(&lookup, MAX_MESSAGE_BYTES_VAR)? {
            config.max_message_bytes = bytes as usize;
        }
        if let Some(capacity) = parse_positive(&lookup, OUTBOUND_CAPACITY_VAR)? {
            config.outbound_capacity = capacity as usize;
        }
        Ok(config)
    }
}

fn parse<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::Invalid { key, value: raw })
}

/// Like [`parse`], but zero is rejected.
fn parse_positive<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse::<u64, _>(lookup, key)? {
        Some(0) => Err(ConfigError::Invalid {
            key,
            value: "0".into(),
        }),
        other => Ok(other),
    }
}
