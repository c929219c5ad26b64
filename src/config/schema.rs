//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files and
//! fall back to defaults field by field.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the backend.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Per-request deadline.
    pub timeouts: TimeoutConfig,

    /// Scratch pools used when capturing stacks and rendering errors.
    pub pools: PoolConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time a handler gets before the client receives 504, in seconds.
    pub request_secs: u64,
}

impl TimeoutConfig {
    pub fn request_budget(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Limits of the buffer and call-stack scratch pools.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Buffers that grew beyond this capacity are not kept for reuse.
    pub buffer_max_bytes: usize,

    /// Idle buffers kept at most.
    pub buffer_max_idle: usize,

    /// Frames recorded per captured stack.
    pub callers_max_depth: usize,

    /// Idle scratch slices kept at most.
    pub callers_max_idle: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            buffer_max_bytes: crate::pool::buffer::DEFAULT_MAX_BYTES,
            buffer_max_idle: 256,
            callers_max_depth: crate::pool::callers::DEFAULT_MAX_DEPTH,
            callers_max_idle: 64,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (panic, fatal, error, warning, info, debug).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:3001");
        assert_eq!(config.timeouts.request_budget(), Duration::from_secs(30));
        assert_eq!(config.pools.buffer_max_bytes, 65536);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [timeouts]
            request_secs = 5

            [observability]
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.timeouts.request_secs, 5);
        assert_eq!(config.observability.log_level, "debug");
        assert!(!config.observability.json_logs);
        assert_eq!(config.listener.bind_address, "0.0.0.0:3001");
        assert_eq!(config.pools.callers_max_depth, 256);
    }
}
