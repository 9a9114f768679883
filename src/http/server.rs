//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gateway and health handlers
//! - Wire up middleware (request ID, tracing, panic capture, timeout, body limit)
//! - Bind server to listener and stop on the shutdown broadcast
//! - Hand every `/api/{service}/...` request to the dispatcher

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::{HeaderMap, Method, Request, Uri},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::dispatch::{Dispatcher, HyperTransport};
use crate::http::request::{self, RawRequest, UuidRequestId};
use crate::http::response::panic_response;
use crate::resilience::{BreakerListener, BreakerRegistry, TracingListener};
use crate::routing::ServiceDirectory;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher<HyperTransport>>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    registry: Arc<BreakerRegistry>,
}

impl HttpServer {
    /// Create a new HTTP server whose breaker events go to tracing and metrics.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_listener(config, Arc::new(TracingListener))
    }

    /// Create a new HTTP server with a custom breaker event listener.
    pub fn with_listener(config: GatewayConfig, listener: Arc<dyn BreakerListener>) -> Self {
        let directory = ServiceDirectory::from_config(&config.services);
        let registry = Arc::new(BreakerRegistry::new(config.breaker.clone(), listener));
        let transport = HyperTransport::new(config.limits.max_body_bytes);

        let dispatcher = Dispatcher::new(
            directory,
            registry.clone(),
            transport,
            config.breaker.count_server_errors,
        );

        let state = AppState {
            dispatcher: Arc::new(dispatcher),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            registry,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                request_id = %request::request_id(req.headers()),
            )
        });

        Router::new()
            .route("/health", get(health_handler))
            .route("/api/{service}", any(gateway_handler))
            .route("/api/{service}/{*path}", any(gateway_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.limits.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(trace)
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Registry shared with the admin listener.
    pub fn registry(&self) -> Arc<BreakerRegistry> {
        self.registry.clone()
    }

    /// Run the server until the shutdown broadcast fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            services = ?self.config.services.ports.entries(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Gateway handler for `/api/{service}` and `/api/{service}/{*path}`.
async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let inbound = RawRequest {
        method,
        uri,
        headers,
        body,
        client_ip: addr.ip(),
    }
    .into_inbound();

    tracing::debug!(
        service = %inbound.service,
        method = %inbound.method,
        path = %inbound.sub_path,
        "Dispatching request"
    );

    state.dispatcher.dispatch(inbound).await
}
