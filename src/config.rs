//! Server configuration loaded from environment variables

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Read a boolean flag; anything other than "0" or "false" counts as set
pub fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v != "0" && v.to_lowercase() != "false")
        .unwrap_or(default)
}

/// Read and parse a value, falling back to `default` when unset or malformed
pub fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

/// Read a non-empty, trimmed string
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Snapshot file loaded at startup and rewritten periodically (None = memory only)
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            snapshot_path: None,
            snapshot_interval: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let bind_addr = env_parse("BIND_ADDR", defaults.bind_addr);
        let snapshot_path = env_string("SNAPSHOT_PATH").map(PathBuf::from);
        let snapshot_interval = Duration::from_secs(env_parse(
            "SNAPSHOT_INTERVAL_SECS",
            defaults.snapshot_interval.as_secs(),
        ));

        match snapshot_path {
            Some(ref path) => tracing::info!(
                path = %path.display(),
                interval_secs = snapshot_interval.as_secs(),
                "Snapshot persistence enabled"
            ),
            None => tracing::warn!("SNAPSHOT_PATH not set - polls are kept in memory only"),
        }

        Self {
            bind_addr,
            snapshot_path,
            snapshot_interval,
        }
    }
}
