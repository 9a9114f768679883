//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Decoded request (service name, sub-path)
//!     → resolver.rs (service name lookup)
//!     → Return: backend host:port or explicit unknown-service
//! ```
//!
//! # Design Decisions
//! - Directory built at startup, immutable at runtime
//! - Explicit miss rather than silent default

pub mod resolver;

pub use resolver::{ServiceAddress, ServiceDirectory};
