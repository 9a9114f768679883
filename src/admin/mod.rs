//! Admin API, served on its own listener.
//!
//! Read-only views of the breaker registry. Disabled unless `admin.enabled`.

pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};

use self::handlers::*;
use crate::resilience::BreakerRegistry;

pub fn setup_admin_router(registry: Arc<BreakerRegistry>) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breakers", get(get_breakers))
        .with_state(registry)
}
