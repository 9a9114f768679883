//! Service name → backend address lookup.
//!
//! # Design Decisions
//! - Built once from configuration, immutable afterwards (no locks)
//! - Known services keep their configured order so error messages are stable
//! - Lookup is exact and case-sensitive

use std::fmt;

use crate::config::ServicesConfig;

/// Network address of one backend service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAddress {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Table of known services.
#[derive(Debug, Clone)]
pub struct ServiceDirectory {
    services: Vec<(String, ServiceAddress)>,
}

impl ServiceDirectory {
    /// Build the directory from the configured host and port table.
    pub fn from_config(config: &ServicesConfig) -> Self {
        let services = config
            .ports
            .entries()
            .into_iter()
            .map(|(name, port)| {
                (
                    name.to_string(),
                    ServiceAddress {
                        host: config.host.clone(),
                        port,
                    },
                )
            })
            .collect();

        Self { services }
    }

    /// Resolve a service name to its address.
    pub fn resolve(&self, service: &str) -> Option<&ServiceAddress> {
        self.services
            .iter()
            .find(|(name, _)| name == service)
            .map(|(_, addr)| addr)
    }

    /// Names of every known service, in configuration order.
    pub fn known_services(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|(name, _)| name.as_str())
    }
}
