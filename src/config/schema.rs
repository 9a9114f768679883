//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend host and per-service port table.
    pub services: ServicesConfig,

    /// Circuit breaker thresholds and timers.
    pub breaker: BreakerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin endpoint settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:7071").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7071".to_string(),
        }
    }
}

/// Backend services. All services share one host and differ by port.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Host (IP or DNS name) running every backend service.
    pub host: String,

    /// Port of each known service.
    pub ports: ServicePorts,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            ports: ServicePorts::default(),
        }
    }
}

/// Port table for the known services.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServicePorts {
    pub auth: u16,
    pub todos: u16,
    pub users: u16,
    pub frontend: u16,
}

impl Default for ServicePorts {
    fn default() -> Self {
        Self {
            auth: 8000,
            todos: 8082,
            users: 8083,
            frontend: 8080,
        }
    }
}

impl ServicePorts {
    /// Service names paired with their ports, in declaration order.
    pub fn entries(&self) -> [(&'static str, u16); 4] {
        [
            ("auth", self.auth),
            ("todos", self.todos),
            ("users", self.users),
            ("frontend", self.frontend),
        ]
    }
}

/// Circuit breaker configuration, shared by every breaker in the registry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BreakerConfig {
    /// Failures within the rolling window that trip the breaker.
    pub failure_threshold: u32,

    /// Failure percentage within the rolling window that trips the breaker.
    pub error_threshold_percentage: u8,

    /// Minimum calls in the window before the percentage rule applies.
    pub volume_threshold: u32,

    /// Per-call timeout in milliseconds.
    pub call_timeout_ms: u64,

    /// Time spent OPEN before a half-open probe is admitted, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Length of the rolling statistics window in milliseconds.
    pub rolling_window_ms: u64,

    /// Number of buckets the rolling window is split into.
    pub rolling_buckets: u32,

    /// Count delivered 5xx responses as breaker failures.
    pub count_server_errors: bool,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            error_threshold_percentage: 50,
            volume_threshold: 10,
            call_timeout_ms: 10_000,
            reset_timeout_ms: 10_000,
            rolling_window_ms: 10_000,
            rolling_buckets: 10,
            count_server_errors: false,
        }
    }
}

impl BreakerConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    /// Span covered by a single rolling-window bucket.
    pub fn bucket_span(&self) -> Duration {
        let buckets = u64::from(self.rolling_buckets.max(1));
        Duration::from_millis((self.rolling_window_ms / buckets).max(1))
    }
}

/// Timeout configuration for the inbound side.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound request body and buffered upstream response body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin endpoints.
    pub enabled: bool,

    /// Admin listener bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:7072".to_string(),
        }
    }
}
