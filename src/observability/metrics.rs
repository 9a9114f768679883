//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, service
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_breaker_transitions_total` (counter): transitions by service, method, target state
//! - `gateway_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `gateway_fallbacks_total` (counter): fallbacks served by service
//! - `gateway_breaker_rejections_total` (counter): calls rejected without a network attempt
//!
//! Recording is a no-op until a recorder is installed, so tests need no setup.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::circuit_breaker::BreakerKey;
use crate::resilience::events::BreakerEvent;

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, service: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "service" => service.to_string()
    )
    .increment(1);

    histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "service" => service.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_breaker_event(key: &BreakerKey, event: BreakerEvent) {
    let service = key.service().to_string();
    let method = key.method().to_string();

    let state = match event {
        BreakerEvent::Closed => 0.0,
        BreakerEvent::Opened => 1.0,
        BreakerEvent::HalfOpened => 2.0,
        BreakerEvent::FallbackInvoked => {
            counter!("gateway_fallbacks_total", "service" => service).increment(1);
            return;
        }
    };

    gauge!(
        "gateway_breaker_state",
        "service" => service.clone(),
        "method" => method.clone()
    )
    .set(state);

    counter!(
        "gateway_breaker_transitions_total",
        "service" => service,
        "method" => method,
        "to" => event.as_str()
    )
    .increment(1);
}

pub fn record_rejection(key: &BreakerKey) {
    counter!(
        "gateway_breaker_rejections_total",
        "service" => key.service().to_string(),
        "method" => key.method().to_string()
    )
    .increment(1);
}
