//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the line relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Primary listener (TCP or Unix socket).
    pub listener: ListenerConfig,

    /// Relay queue between line readers and the stdout writer.
    pub queue: QueueConfig,

    /// Auxiliary endpoint (health checks, metrics).
    pub admin: AdminConfig,

    /// Shutdown behavior.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Primary listener configuration.
///
/// Only one of `tcp_address` and `unix_address` is bound. A non-empty
/// `unix_address` takes precedence.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// TCP address (e.g., "127.0.0.1:4444").
    pub tcp_address: String,

    /// Unix socket path. Empty means unused.
    pub unix_address: String,

    /// Permission bits applied to the Unix socket file after binding.
    pub socket_mode: u32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            tcp_address: "127.0.0.1:4444".to_string(),
            unix_address: String::new(),
            socket_mode: 0o777,
        }
    }
}

/// Relay queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of records that may wait for the writer. This is the only
    /// backpressure boundary between clients and stdout.
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 1 }
    }
}

/// Auxiliary HTTP endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bind address. The host may be omitted (":9090").
    pub bind_address: String,

    /// Upper bound for the graceful shutdown of the endpoint, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind_address: ":9090".to_string(),
            shutdown_timeout_secs: 5,
        }
    }
}

impl AdminConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long to wait for open connections to finish once the listener
    /// is closed. Zero exits as soon as the acceptor and the auxiliary
    /// endpoint have stopped.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 30,
        }
    }
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Log format: "text" or "json".
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}
