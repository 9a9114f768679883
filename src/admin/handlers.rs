use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::resilience::{BreakerRegistry, BreakerSnapshot, CircuitState};

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub breakers: usize,
    pub open_breakers: usize,
}

pub async fn get_status(State(registry): State<Arc<BreakerRegistry>>) -> Json<SystemStatus> {
    let snapshot = registry.snapshot();
    let open_breakers = snapshot
        .iter()
        .filter(|b| b.state != CircuitState::Closed)
        .count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if open_breakers == 0 { "operational" } else { "degraded" },
        breakers: snapshot.len(),
        open_breakers,
    })
}

pub async fn get_breakers(
    State(registry): State<Arc<BreakerRegistry>>,
) -> Json<Vec<BreakerSnapshot>> {
    Json(registry.snapshot())
}
