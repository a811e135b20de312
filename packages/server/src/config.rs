//! Server configuration.

use std::{path::PathBuf, time::Duration};

/// Where sessions are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    InMemory,
    Sqlite(PathBuf),
}

/// Per-connection transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Capacity of each connection's outbound queue.
    pub outbound_capacity: usize,
    /// Interval between WebSocket pings.
    pub heartbeat_interval: Duration,
    /// A connection that sends nothing for this long is dropped.
    pub idle_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            heartbeat_interval: Duration::from_secs(25),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreConfig,
    pub connection: ConnectionSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            store: StoreConfig::Sqlite(PathBuf::from("pairpad.db")),
            connection: ConnectionSettings::default(),
        }
    }
}
