//! Breaker event notifications.
//!
//! Listeners observe transitions for logging and metrics only. They are
//! invoked after the breaker lock has been released and never influence state.

use std::fmt;

use crate::observability::metrics;
use crate::resilience::circuit_breaker::BreakerKey;

/// Something observable happened to a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerEvent {
    Opened,
    Closed,
    HalfOpened,
    FallbackInvoked,
}

impl BreakerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerEvent::Opened => "OPENED",
            BreakerEvent::Closed => "CLOSED",
            BreakerEvent::HalfOpened => "HALF_OPEN",
            BreakerEvent::FallbackInvoked => "FALLBACK_INVOKED",
        }
    }
}

impl fmt::Display for BreakerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives breaker events.
pub trait BreakerListener: Send + Sync + fmt::Debug {
    fn on_event(&self, key: &BreakerKey, event: BreakerEvent);
}

/// Logs every event through `tracing` and records it in metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl BreakerListener for TracingListener {
    fn on_event(&self, key: &BreakerKey, event: BreakerEvent) {
        let service = key.service();
        let method = key.method();
        match event {
            BreakerEvent::Opened => {
                tracing::warn!(service, method, "Circuit breaker is now OPEN");
            }
            BreakerEvent::Closed => {
                tracing::info!(service, method, "Circuit breaker is now CLOSED");
            }
            BreakerEvent::HalfOpened => {
                tracing::info!(service, method, "Circuit breaker is now HALF_OPEN");
            }
            BreakerEvent::FallbackInvoked => {
                tracing::warn!(service, method, "Fallback executed");
            }
        }
        metrics::record_breaker_event(key, event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl BreakerListener for NoopListener {
    fn on_event(&self, _key: &BreakerKey, _event: BreakerEvent) {}
}
