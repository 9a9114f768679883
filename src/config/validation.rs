//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid, percentages bounded)
//! - Check that addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }

    if config.services.host.trim().is_empty() {
        errors.push(ValidationError::new("services.host", "must not be empty"));
    }
    for (name, port) in config.services.ports.entries() {
        if port == 0 {
            errors.push(ValidationError::new(
                "services.ports",
                format!("port for '{}' must be non-zero", name),
            ));
        }
    }

    let breaker = &config.breaker;
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("breaker.failure_threshold", "must be greater than 0"));
    }
    if !(1..=100).contains(&breaker.error_threshold_percentage) {
        errors.push(ValidationError::new(
            "breaker.error_threshold_percentage",
            "must be between 1 and 100",
        ));
    }
    if breaker.call_timeout_ms == 0 {
        errors.push(ValidationError::new("breaker.call_timeout_ms", "must be greater than 0"));
    }
    if breaker.reset_timeout_ms == 0 {
        errors.push(ValidationError::new("breaker.reset_timeout_ms", "must be greater than 0"));
    }
    if breaker.rolling_buckets == 0 {
        errors.push(ValidationError::new("breaker.rolling_buckets", "must be greater than 0"));
    } else if breaker.rolling_window_ms < u64::from(breaker.rolling_buckets) {
        errors.push(ValidationError::new(
            "breaker.rolling_window_ms",
            "must be at least one millisecond per bucket",
        ));
    }

    if config.timeouts.request_secs.saturating_mul(1000) <= breaker.call_timeout_ms {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            "must exceed breaker.call_timeout_ms so breaker timeouts surface as fallbacks",
        ));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("'{}' is not a socket address", value)));
    }
}
