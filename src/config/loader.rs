//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for environment variable {var}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then process environment overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    finish(config, |var| std::env::var(var).ok())
}

/// Apply environment overrides from `lookup` and validate.
pub fn finish<F>(mut config: GatewayConfig, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env_overrides(&mut config, &lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay recognized environment variables onto `config`.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let breaker = &mut config.breaker;
    override_parsed(lookup, "CIRCUIT_BREAKER_THRESHOLD", &mut breaker.failure_threshold)?;
    override_parsed(lookup, "CIRCUIT_BREAKER_TIMEOUT_MS", &mut breaker.call_timeout_ms)?;
    override_parsed(lookup, "CIRCUIT_BREAKER_RESET_TIMEOUT_MS", &mut breaker.reset_timeout_ms)?;
    override_parsed(
        lookup,
        "CIRCUIT_BREAKER_ERROR_PERCENTAGE",
        &mut breaker.error_threshold_percentage,
    )?;
    override_parsed(
        lookup,
        "CIRCUIT_BREAKER_COUNT_SERVER_ERRORS",
        &mut breaker.count_server_errors,
    )?;

    if let Some(host) = lookup("MICROSERVICES_VM_IP") {
        config.services.host = host;
    }

    let ports = &mut config.services.ports;
    override_parsed(lookup, "AUTH_API_PORT", &mut ports.auth)?;
    override_parsed(lookup, "TODOS_API_PORT", &mut ports.todos)?;
    override_parsed(lookup, "USERS_API_PORT", &mut ports.users)?;
    override_parsed(lookup, "FRONTEND_PORT", &mut ports.frontend)?;

    if let Some(addr) = lookup("GATEWAY_BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }

    Ok(())
}

fn override_parsed<F, T>(lookup: &F, var: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(var) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { var, value })?;
    }
    Ok(())
}
