//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to backend:
//!     → registry.rs (one breaker per service + method, created lazily)
//!     → circuit_breaker.rs (admit or reject, enforce call timeout, record outcome)
//!     → events.rs (OPENED / CLOSED / HALF_OPEN / FALLBACK_INVOKED notifications)
//!     → On rejection or failure: fallback.rs (canned 503 per service)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every outbound call has a deadline
//! - No retries inside the breaker; retry policy belongs to callers
//! - Breaker protects against unreachability, not application errors (5xx toggle aside)

pub mod circuit_breaker;
pub mod events;
pub mod fallback;
pub mod registry;

pub use circuit_breaker::{BreakerError, BreakerKey, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use events::{BreakerEvent, BreakerListener, NoopListener, TracingListener};
pub use fallback::FallbackResponse;
pub use registry::BreakerRegistry;
