//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the allocator.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Bytes in one gigabyte, as the quota is expressed.
pub const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Root configuration for the allocator service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Where the backend pool lives.
    pub pool: PoolConfig,

    /// Placement limits and invite format.
    pub allocation: AllocationConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Backend management client settings.
    pub backend: BackendConfig,

    /// HTTP API listener.
    pub listener: ListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Backend pool source.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// File holding the `servers` list. Watched for changes.
    pub servers_file: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            servers_file: "servers.json".to_string(),
        }
    }
}

/// Placement limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Maximum credentials per backend.
    pub max_users: usize,

    /// Per-user traffic quota in gigabytes.
    pub traffic_limit_gb: u64,

    /// Prefix prepended to the encoded access descriptor.
    pub invite_prefix: String,
}

impl AllocationConfig {
    /// Quota in bytes.
    pub fn traffic_limit_bytes(&self) -> u64 {
        self.traffic_limit_gb.saturating_mul(BYTES_PER_GB)
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_users: 100,
            traffic_limit_gb: 8,
            invite_prefix: "https://s3.amazonaws.com/outline-vpn/invite.html#".to_string(),
        }
    }
}

/// Timeout configuration for backend calls and API requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Bound on a single backend call, in seconds.
    pub probe_secs: u64,

    /// Overall deadline of one allocation, in seconds.
    pub allocation_secs: u64,

    /// HTTP API request timeout, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe_secs: 5,
            allocation_secs: 20,
            request_secs: 30,
        }
    }
}

/// Backend management client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Accept self-signed management certificates.
    pub accept_invalid_certs: bool,

    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            accept_invalid_certs: true,
            connect_timeout_secs: 5,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
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
