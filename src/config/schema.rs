//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::routing::options::{
    DEFAULT_RESERVED_UPGRADE_PREFIXES, DEFAULT_ROUTE, DEFAULT_UPGRADE_TOKEN,
};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SpliceConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// What the hub claims.
    pub route: RouteConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9000").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9000".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Route claimed for the hub.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Path prefix stripped and forwarded to the hub.
    pub prefix: String,

    /// `Upgrade` header value of the hub's native protocol.
    pub upgrade_token: String,

    /// Upgrade paths claimed for another embedded protocol.
    pub reserved_upgrade_prefixes: Vec<String>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_ROUTE.to_string(),
            upgrade_token: DEFAULT_UPGRADE_TOKEN.to_string(),
            reserved_upgrade_prefixes: DEFAULT_RESERVED_UPGRADE_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long the runtime waits for any listener to answer, in seconds.
    pub response_secs: u64,

    /// How long shutdown waits for open connections, in seconds.
    pub drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            response_secs: 30,
            drain_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
