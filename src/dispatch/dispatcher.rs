//! End-to-end handling of one inbound request.
//!
//! # Flow
//! ```text
//! InboundRequest
//!     → resolve service (unknown → 400, no breaker touched)
//!     → build OutboundCall
//!     → registry.get_or_create(service, method)
//!     → breaker.execute(transport.send)
//!         Ok       → upstream status + body, x-circuit-breaker-status
//!         Rejected → fallback (503)
//!         Timeout  → fallback (503)
//!         Upstream → fallback (503)
//!     → any fault in the above → 500
//! ```

use std::sync::Arc;
use std::time::Instant;

use crate::dispatch::transport::{Transport, TransportError};
use crate::dispatch::types::{DispatchResponse, InboundRequest, OutboundCall, UpstreamResponse};
use crate::dispatch::DispatchError;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{BreakerError, BreakerKey};
use crate::resilience::registry::BreakerRegistry;
use crate::routing::ServiceDirectory;

/// Routes requests to backends through per-(service, method) circuit breakers.
pub struct Dispatcher<T> {
    directory: ServiceDirectory,
    registry: Arc<BreakerRegistry>,
    transport: T,
    count_server_errors: bool,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(
        directory: ServiceDirectory,
        registry: Arc<BreakerRegistry>,
        transport: T,
        count_server_errors: bool,
    ) -> Self {
        Self {
            directory,
            registry,
            transport,
            count_server_errors,
        }
    }

    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        &self.registry
    }

    /// Handle one request. Every outcome, including internal faults, becomes a response.
    pub async fn dispatch(&self, request: InboundRequest) -> DispatchResponse {
        let start = Instant::now();
        let method = request.method.clone();
        let service = request.service.clone();

        let response = match self.try_dispatch(request).await {
            Ok(response) => response,
            Err(DispatchError::UnknownService(service)) => {
                tracing::warn!(service = %service, "Unknown service requested");
                DispatchResponse::unknown_service(&service, self.directory.known_services())
            }
            Err(DispatchError::Internal(message)) => {
                tracing::error!(
                    service = %service,
                    error = %message,
                    "Unhandled error while dispatching"
                );
                DispatchResponse::internal_error(&message)
            }
        };

        let status = response.status.as_u16();
        metrics::record_request(method.as_str(), status, &service, start);
        response
    }

    async fn try_dispatch(
        &self,
        request: InboundRequest,
    ) -> Result<DispatchResponse, DispatchError> {
        let address = self
            .directory
            .resolve(&request.service)
            .ok_or_else(|| DispatchError::UnknownService(request.service.clone()))?;

        tracing::debug!(
            service = %request.service,
            path = %request.sub_path,
            method = %request.method,
            backend = %address,
            "Dispatching request"
        );

        let call = OutboundCall::build(&request, address)?;
        let breaker = self
            .registry
            .get_or_create(BreakerKey::new(request.service.clone(), request.method.as_str()));

        tracing::debug!(key = %breaker.key(), state = %breaker.state(), "Circuit breaker state");

        let outcome = breaker.execute(|| self.send(call)).await;

        match outcome {
            Ok(upstream) => Ok(DispatchResponse::from_upstream(upstream, breaker.state())),
            Err(err) => {
                match &err {
                    BreakerError::Rejected => {
                        metrics::record_rejection(breaker.key());
                        tracing::debug!(key = %breaker.key(), "Call rejected by open circuit");
                    }
                    BreakerError::Timeout(after) => {
                        tracing::warn!(
                            key = %breaker.key(),
                            timeout = ?after,
                            "Upstream call timed out"
                        );
                    }
                    BreakerError::Upstream(e) => {
                        tracing::error!(key = %breaker.key(), error = %e, "Error calling upstream");
                    }
                }
                breaker.notify_fallback();
                Ok(DispatchResponse::fallback(&request.service))
            }
        }
    }

    async fn send(&self, call: OutboundCall) -> Result<UpstreamResponse, TransportError> {
        let response = self.transport.send(call).await?;
        if self.count_server_errors && response.status.is_server_error() {
            return Err(TransportError::ServerError(response.status));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BreakerConfig, ServicesConfig};
    use crate::dispatch::types::X_CIRCUIT_BREAKER_STATUS;
    use crate::resilience::circuit_breaker::CircuitState;
    use crate::resilience::events::NoopListener;
    use axum::body::Bytes;
    use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Clone, Copy)]
    enum Behavior {
        Respond(StatusCode, &'static str),
        Refuse,
        Hang,
    }

    #[derive(Clone)]
    struct ScriptedTransport {
        behavior: Arc<Mutex<Behavior>>,
        calls: Arc<Mutex<Vec<OutboundCall>>>,
    }

    impl ScriptedTransport {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                calls: Arc::default(),
            }
        }

        fn set(&self, behavior: Behavior) {
            *self.behavior.lock() = behavior;
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(&self, call: OutboundCall) -> Result<UpstreamResponse, TransportError> {
            self.calls.lock().push(call);
            let behavior = *self.behavior.lock();
            match behavior {
                Behavior::Respond(status, body) => {
                    let mut headers = HeaderMap::new();
                    headers.insert(
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("application/json"),
                    );
                    Ok(UpstreamResponse {
                        status,
                        headers,
                        body: Bytes::from_static(body.as_bytes()),
                    })
                }
                Behavior::Refuse => Err(TransportError::Connect(Box::new(std::io::Error::from(
                    std::io::ErrorKind::ConnectionRefused,
                )))),
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    fn dispatcher(
        behavior: Behavior,
        config: BreakerConfig,
    ) -> (Dispatcher<ScriptedTransport>, ScriptedTransport) {
        let transport = ScriptedTransport::new(behavior);
        let count_server_errors = config.count_server_errors;
        let registry = Arc::new(BreakerRegistry::new(config, Arc::new(NoopListener)));
        let dispatcher = Dispatcher::new(
            ServiceDirectory::from_config(&ServicesConfig::default()),
            registry,
            transport.clone(),
            count_server_errors,
        );
        (dispatcher, transport)
    }

    fn request(service: &str, method: Method) -> InboundRequest {
        InboundRequest {
            method,
            service: service.into(),
            sub_path: String::new(),
            query: None,
            headers: HeaderMap::new(),
            body: None,
            client_ip: "127.0.0.1".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_unknown_service_is_rejected_before_any_breaker() {
        let (dispatcher, transport) =
            dispatcher(Behavior::Respond(StatusCode::OK, "[]"), BreakerConfig::default());

        for name in ["unknown-svc", "", "Auth", "todos/extra"] {
            let response = dispatcher.dispatch(request(name, Method::GET)).await;
            assert_eq!(response.status, StatusCode::BAD_REQUEST);
            let body = response.json_body().unwrap();
            assert!(body["error"]
                .as_str()
                .unwrap()
                .ends_with("Available services: auth, todos, users, frontend"));
        }

        assert!(dispatcher.registry().is_empty());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_success_passes_through_with_breaker_state() {
        let (dispatcher, transport) = dispatcher(
            Behavior::Respond(StatusCode::OK, r#"[{"id":1,"title":"milk"}]"#),
            BreakerConfig::default(),
        );

        let mut req = request("todos", Method::GET);
        req.sub_path = "api/todos".into();
        let response = dispatcher.dispatch(req).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json_body().unwrap(), json!([{ "id": 1, "title": "milk" }]));
        assert_eq!(response.headers[X_CIRCUIT_BREAKER_STATUS], "CLOSED");
        assert_eq!(response.headers[header::CONTENT_TYPE], "application/json");

        let calls = transport.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "http://127.0.0.1:8082/api/todos");
    }

    #[tokio::test]
    async fn test_consecutive_failures_open_breaker_and_serve_fallback() {
        let (dispatcher, transport) = dispatcher(Behavior::Refuse, BreakerConfig::default());

        for _ in 0..3 {
            let response = dispatcher.dispatch(request("auth", Method::GET)).await;
            assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        }
        let breaker = dispatcher
            .registry()
            .get_or_create(BreakerKey::new("auth", "get"));
        assert_eq!(breaker.state(), CircuitState::Open);

        transport.set(Behavior::Respond(StatusCode::OK, "{}"));
        let response = dispatcher.dispatch(request("auth", Method::GET)).await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.json_body().unwrap(),
            json!({ "error": "Auth service is temporarily unavailable", "circuitBreaker": "open" })
        );
        assert_eq!(transport.call_count(), 3, "open breaker must not touch the network");
    }

    #[tokio::test]
    async fn test_breakers_are_per_method() {
        let (dispatcher, transport) = dispatcher(Behavior::Refuse, BreakerConfig::default());
        for _ in 0..3 {
            dispatcher.dispatch(request("users", Method::POST)).await;
        }

        transport.set(Behavior::Respond(StatusCode::OK, "[]"));
        let response = dispatcher.dispatch(request("users", Method::GET)).await;
        assert_eq!(response.status, StatusCode::OK);

        let response = dispatcher.dispatch(request("users", Method::POST)).await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(dispatcher.registry().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_serves_fallback() {
        let (dispatcher, _transport) = dispatcher(
            Behavior::Hang,
            BreakerConfig {
                call_timeout_ms: 250,
                ..BreakerConfig::default()
            },
        );

        let response = dispatcher.dispatch(request("todos", Method::GET)).await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.json_body().unwrap(),
            json!({
                "error": "Todos service is temporarily unavailable",
                "circuitBreaker": "open",
                "data": [],
            })
        );

        let breaker = dispatcher
            .registry()
            .get_or_create(BreakerKey::new("todos", "get"));
        assert_eq!(breaker.snapshot().failures, 1);
    }

    #[tokio::test]
    async fn test_application_errors_pass_through_by_default() {
        let (dispatcher, _transport) = dispatcher(
            Behavior::Respond(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"db down"}"#),
            BreakerConfig::default(),
        );

        for _ in 0..5 {
            let response = dispatcher.dispatch(request("frontend", Method::GET)).await;
            assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(response.json_body().unwrap(), json!({ "error": "db down" }));
            assert_eq!(response.headers[X_CIRCUIT_BREAKER_STATUS], "CLOSED");
        }
    }

    #[tokio::test]
    async fn test_server_errors_count_when_enabled() {
        let (dispatcher, transport) = dispatcher(
            Behavior::Respond(StatusCode::BAD_GATEWAY, "oops"),
            BreakerConfig {
                count_server_errors: true,
                ..BreakerConfig::default()
            },
        );

        for _ in 0..3 {
            let response = dispatcher.dispatch(request("frontend", Method::GET)).await;
            assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(
                response.json_body().unwrap()["error"],
                "Frontend service is temporarily unavailable"
            );
        }

        dispatcher.dispatch(request("frontend", Method::GET)).await;
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_malformed_request_is_internal_error() {
        let (dispatcher, transport) =
            dispatcher(Behavior::Respond(StatusCode::OK, "{}"), BreakerConfig::default());

        let mut req = request("todos", Method::GET);
        req.sub_path = "has space".into();
        let response = dispatcher.dispatch(req).await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.json_body().unwrap();
        assert_eq!(body["error"], "Internal server error in gateway");
        assert!(body["message"].as_str().unwrap().contains("invalid target url"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_reset_timeout() {
        let (dispatcher, transport) = dispatcher(Behavior::Refuse, BreakerConfig::default());
        for _ in 0..3 {
            dispatcher.dispatch(request("todos", Method::GET)).await;
        }

        transport.set(Behavior::Respond(StatusCode::OK, "[]"));
        tokio::time::advance(Duration::from_millis(10_000)).await;

        let response = dispatcher.dispatch(request("todos", Method::GET)).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers[X_CIRCUIT_BREAKER_STATUS], "CLOSED");
    }
}
