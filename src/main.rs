//! Circuit-breaking API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ /api/{service}/{*path}
//!                   │
//!                   ▼
//!        ┌────────────────────┐    unknown service    ┌──────────┐
//!        │  http::server      │──────────────────────▶│   400    │
//!        │  (request id,      │                       └──────────┘
//!        │   trace, limits)   │
//!        └─────────┬──────────┘
//!                  ▼
//!        ┌────────────────────┐   get_or_create(service, method)
//!        │ dispatch           │──────────────▶ resilience::registry
//!        └─────────┬──────────┘
//!                  ▼
//!        ┌────────────────────┐  rejected / timeout / failure  ┌──────────┐
//!        │ circuit_breaker    │───────────────────────────────▶│ fallback │
//!        └─────────┬──────────┘                                │   503    │
//!                  ▼                                           └──────────┘
//!            backend service
//!  (auth, todos, users, frontend)
//! ```

use std::path::PathBuf;

use breaker_gateway::admin::setup_admin_router;
use breaker_gateway::config::load_config;
use breaker_gateway::lifecycle::{shutdown_signal, Shutdown};
use breaker_gateway::observability::{logging, metrics};
use breaker_gateway::HttpServer;
use clap::Parser;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "breaker-gateway", version, about = "API gateway with per-route circuit breakers")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    logging::init_tracing(&config.observability)?;

    tracing::info!("breaker-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        service_host = %config.services.host,
        failure_threshold = config.breaker.failure_threshold,
        call_timeout_ms = config.breaker.call_timeout_ms,
        reset_timeout_ms = config.breaker.reset_timeout_ms,
        error_threshold_percentage = config.breaker.error_threshold_percentage,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config.clone());

    let admin_task = if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");

        let app = setup_admin_router(server.registry());
        let mut rx = shutdown.subscribe();
        Some(tokio::spawn(async move {
            axum::serve(admin_listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.recv().await;
                })
                .await
        }))
    } else {
        None
    };

    let server_rx = shutdown.subscribe();
    tokio::spawn(shutdown.trigger_on(shutdown_signal()));

    server.run(listener, server_rx).await?;

    if let Some(task) = admin_task {
        if let Err(e) = task.await? {
            tracing::error!(error = %e, "Admin API stopped with error");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
