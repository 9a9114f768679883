//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: backend assumed down, calls are rejected without touching the network
//! - Half-Open: a single probe call tests whether the backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures >= failure_threshold, or failure % >= error_threshold_percentage
//!                (once volume_threshold calls are in the rolling window)
//! Open → Half-Open: first call after reset_timeout becomes the probe
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails, times out, or is abandoned
//! ```
//!
//! # Concurrency
//! All state lives behind one mutex that is held only to admit a call or to
//! record its outcome, never across the outbound call. Each transition bumps a
//! generation number; outcomes carrying an older generation are discarded.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::resilience::events::{BreakerEvent, BreakerListener};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one breaker: service name and lower-cased HTTP method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakerKey {
    service: String,
    method: String,
}

impl BreakerKey {
    pub fn new(service: impl Into<String>, method: &str) -> Self {
        Self {
            service: service.into(),
            method: method.to_ascii_lowercase(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for BreakerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.service, self.method)
    }
}

/// Why a call through the breaker did not produce a value.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Breaker is open or a probe is already in flight; no call was made.
    #[error("circuit breaker rejected the call")]
    Rejected,

    /// The call did not complete within the call timeout.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The call itself failed.
    #[error("upstream call failed: {0}")]
    Upstream(E),
}

/// Point-in-time view of a breaker, for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub service: String,
    pub method: String,
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u32,
    /// Milliseconds since the breaker last opened, while it is open or probing.
    pub opened_ms_ago: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    started: Instant,
    failures: u32,
    successes: u32,
}

/// Outcome counts over the last `span * capacity`, bucketed by `span`.
#[derive(Debug)]
struct RollingWindow {
    buckets: VecDeque<Bucket>,
    span: Duration,
    capacity: usize,
}

impl RollingWindow {
    fn new(span: Duration, capacity: usize) -> Self {
        Self {
            buckets: VecDeque::with_capacity(capacity),
            span,
            capacity: capacity.max(1),
        }
    }

    fn length(&self) -> Duration {
        self.span * self.capacity as u32
    }

    fn record(&mut self, now: Instant, success: bool) {
        let length = self.length();
        while let Some(front) = self.buckets.front() {
            if now.duration_since(front.started) >= length {
                self.buckets.pop_front();
            } else {
                break;
            }
        }

        let needs_bucket = match self.buckets.back() {
            Some(back) => now.duration_since(back.started) >= self.span,
            None => true,
        };
        if needs_bucket {
            if self.buckets.len() == self.capacity {
                self.buckets.pop_front();
            }
            self.buckets.push_back(Bucket {
                started: now,
                failures: 0,
                successes: 0,
            });
        }

        if let Some(bucket) = self.buckets.back_mut() {
            if success {
                bucket.successes += 1;
            } else {
                bucket.failures += 1;
            }
        }
    }

    /// (failures, successes) still inside the window at `now`.
    fn totals(&self, now: Instant) -> (u32, u32) {
        let length = self.length();
        self.buckets
            .iter()
            .filter(|b| now.duration_since(b.started) < length)
            .fold((0, 0), |(f, s), b| (f + b.failures, s + b.successes))
    }

    fn reset(&mut self) {
        self.buckets.clear();
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    window: RollingWindow,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    generation: u64,
}

impl BreakerInner {
    fn transition(&mut self, to: CircuitState, now: Instant) {
        self.state = to;
        self.generation += 1;
        self.window.reset();
        self.probe_in_flight = false;
        match to {
            CircuitState::Open => self.opened_at = Some(now),
            CircuitState::HalfOpen => {}
            CircuitState::Closed => self.opened_at = None,
        }
    }
}

/// Permission to make one call, tied to the generation that admitted it.
#[derive(Debug, Clone, Copy)]
struct Ticket {
    generation: u64,
    probe: bool,
}

/// One failure-detecting state machine guarding calls to a single target.
#[derive(Debug)]
pub struct CircuitBreaker {
    key: BreakerKey,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
    listener: Arc<dyn BreakerListener>,
}

impl CircuitBreaker {
    pub fn new(key: BreakerKey, config: BreakerConfig, listener: Arc<dyn BreakerListener>) -> Self {
        let window = RollingWindow::new(config.bucket_span(), config.rolling_buckets as usize);
        Self {
            key,
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window,
                opened_at: None,
                probe_in_flight: false,
                generation: 0,
            }),
            listener,
        }
    }

    pub fn key(&self) -> &BreakerKey {
        &self.key
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = Instant::now();
        let inner = self.inner.lock();
        let (failures, successes) = inner.window.totals(now);
        BreakerSnapshot {
            service: self.key.service().to_string(),
            method: self.key.method().to_string(),
            state: inner.state,
            failures,
            successes,
            opened_ms_ago: inner
                .opened_at
                .map(|at| now.duration_since(at).as_millis() as u64),
        }
    }

    /// Run `call` through the breaker.
    ///
    /// Rejected calls never invoke `call`. A call that outlives the call
    /// timeout is dropped and counted as a failure.
    pub async fn execute<F, Fut, T, E>(&self, call: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let ticket = self.admit().ok_or(BreakerError::Rejected)?;
        let mut guard = OutcomeGuard {
            breaker: self,
            ticket: Some(ticket),
        };

        let timeout = self.config.call_timeout();
        match tokio::time::timeout(timeout, call()).await {
            Ok(Ok(value)) => {
                guard.complete(true);
                Ok(value)
            }
            Ok(Err(e)) => {
                guard.complete(false);
                Err(BreakerError::Upstream(e))
            }
            Err(_) => {
                guard.complete(false);
                Err(BreakerError::Timeout(timeout))
            }
        }
    }

    /// Announce that the caller substituted a fallback response.
    pub fn notify_fallback(&self) {
        self.listener.on_event(&self.key, BreakerEvent::FallbackInvoked);
    }

    fn admit(&self) -> Option<Ticket> {
        let now = Instant::now();
        let mut event = None;

        let ticket = {
            let mut inner = self.inner.lock();
            match inner.state {
                CircuitState::Closed => Some(Ticket {
                    generation: inner.generation,
                    probe: false,
                }),
                CircuitState::Open => {
                    let eligible = inner
                        .opened_at
                        .map_or(true, |at| now.duration_since(at) >= self.config.reset_timeout());
                    if eligible {
                        inner.transition(CircuitState::HalfOpen, now);
                        inner.probe_in_flight = true;
                        event = Some(BreakerEvent::HalfOpened);
                        Some(Ticket {
                            generation: inner.generation,
                            probe: true,
                        })
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen if !inner.probe_in_flight => {
                    inner.probe_in_flight = true;
                    Some(Ticket {
                        generation: inner.generation,
                        probe: true,
                    })
                }
                CircuitState::HalfOpen => None,
            }
        };

        if let Some(event) = event {
            self.listener.on_event(&self.key, event);
        }
        ticket
    }

    fn record(&self, ticket: Ticket, success: bool) {
        let now = Instant::now();
        let mut event = None;

        {
            let mut inner = self.inner.lock();
            if ticket.generation != inner.generation {
                return;
            }

            match inner.state {
                CircuitState::Closed => {
                    inner.window.record(now, success);
                    if !success && self.should_trip(inner.window.totals(now)) {
                        inner.transition(CircuitState::Open, now);
                        event = Some(BreakerEvent::Opened);
                    }
                }
                CircuitState::HalfOpen if ticket.probe => {
                    if success {
                        inner.transition(CircuitState::Closed, now);
                        event = Some(BreakerEvent::Closed);
                    } else {
                        inner.transition(CircuitState::Open, now);
                        event = Some(BreakerEvent::Opened);
                    }
                }
                // Only probe tickets are issued in a half-open generation, and
                // open generations issue no tickets at all.
                CircuitState::HalfOpen | CircuitState::Open => {}
            }
        }

        if let Some(event) = event {
            self.listener.on_event(&self.key, event);
        }
    }

    fn should_trip(&self, (failures, successes): (u32, u32)) -> bool {
        if failures >= self.config.failure_threshold {
            return true;
        }
        let total = failures + successes;
        total > 0
            && total >= self.config.volume_threshold
            && u64::from(failures) * 100
                >= u64::from(self.config.error_threshold_percentage) * u64::from(total)
    }
}

/// Reports the call outcome exactly once. A probe dropped before completing
/// counts as a failed probe so the breaker cannot stay half-open forever.
struct OutcomeGuard<'a> {
    breaker: &'a CircuitBreaker,
    ticket: Option<Ticket>,
}

impl OutcomeGuard<'_> {
    fn complete(&mut self, success: bool) {
        if let Some(ticket) = self.ticket.take() {
            self.breaker.record(ticket, success);
        }
    }
}

impl Drop for OutcomeGuard<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            if ticket.probe {
                self.breaker.record(ticket, false);
            }
        }
    }
}
