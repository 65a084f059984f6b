//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files, and
//! every section falls back to its defaults when omitted.

use serde::{Deserialize, Serialize};

use crate::middleware::{DEBUG_HTTP_TRAFFIC, DEFAULT_PPROF_PREFIX, DEFAULT_VARS_ENDPOINT};
use crate::middleware::traffic::DEFAULT_MAX_BODY_BYTES;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration for the bundled server.
    pub listener: ListenerConfig,

    /// Traffic dump settings.
    pub debug: DebugConfig,

    /// Introspection endpoints.
    pub introspection: IntrospectionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Traffic dump configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Environment variable that switches dumping on when set to `true`.
    /// Read on every request.
    pub traffic_env_var: String,

    /// Largest request/response body buffered for a dump.
    pub max_dump_body_bytes: usize,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            traffic_env_var: DEBUG_HTTP_TRAFFIC.to_string(),
            max_dump_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Introspection endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct IntrospectionConfig {
    /// Serve the vars and profiling endpoints.
    pub enabled: bool,

    /// Path of the exported variables endpoint.
    pub vars_endpoint: String,

    /// Path prefix of the profiling endpoints.
    pub pprof_prefix: String,
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vars_endpoint: DEFAULT_VARS_ENDPOINT.to_string(),
            pprof_prefix: DEFAULT_PPROF_PREFIX.to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
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
