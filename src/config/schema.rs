//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the forward proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, port, agent name).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Worker pool sizing.
    pub pool: PoolConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// IP literal, or a hostname resolved to its first IPv4 address.
    pub address: String,

    /// TCP port to bind.
    pub port: u16,

    /// Value of the `Proxy-Agent` header sent when a tunnel is established.
    pub proxy_agent: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 3000,
            proxy_agent: "forward-proxy".to_string(),
        }
    }
}

/// Timeout configuration for the phases of a proxied connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Overall deadline of a CONNECT tunnel in seconds.
    pub connect_tunnel_secs: u64,

    /// Overall deadline of a forwarded HTTP exchange in seconds.
    pub http_relay_secs: u64,

    /// Socket read timeout for the request header block in seconds.
    pub header_read_secs: u64,

    /// Upstream TCP connect timeout in seconds.
    pub upstream_connect_secs: u64,

    /// Time a cancelled relay direction gets to unwind, in milliseconds.
    pub relay_grace_ms: u64,

    /// How long shutdown waits for in-flight workers, in seconds.
    pub shutdown_drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_tunnel_secs: 10 * 60,
            http_relay_secs: 5 * 60,
            header_read_secs: 30,
            upstream_connect_secs: 30,
            relay_grace_ms: 250,
            shutdown_drain_secs: 5,
        }
    }
}

impl TimeoutConfig {
    pub fn connect_tunnel(&self) -> Duration {
        Duration::from_secs(self.connect_tunnel_secs)
    }

    pub fn http_relay(&self) -> Duration {
        Duration::from_secs(self.http_relay_secs)
    }

    pub fn header_read(&self) -> Duration {
        Duration::from_secs(self.header_read_secs)
    }

    pub fn upstream_connect(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_secs)
    }

    pub fn relay_grace(&self) -> Duration {
        Duration::from_millis(self.relay_grace_ms)
    }

    pub fn shutdown_drain(&self) -> Duration {
        Duration::from_secs(self.shutdown_drain_secs)
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum concurrently active workers. Derived from the CPU count when unset.
    pub max_workers: Option<usize>,
}

impl PoolConfig {
    /// Resolve the effective pool bound: the configured value, or
    /// `max(16, cores * 8)`. Never less than 1.
    pub fn effective_max_workers(&self) -> usize {
        let derived = || {
            let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
            (cores * 8).max(16)
        };
        self.max_workers.unwrap_or_else(derived).max(1)
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum size of the request header block, terminator included.
    pub max_header_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_header_bytes: 64 * 1024 }
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
