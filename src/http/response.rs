//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn dispatcher responses into axum responses
//! - Turn handler panics into the same 500 body the dispatcher uses
//!
//! # Design Decisions
//! - Upstream bodies are buffered by the transport; no streaming
//! - Fallbacks fully replace the upstream response

use std::any::Any;

use axum::body::Body;
use axum::http::Response as HttpResponse;
use axum::response::{IntoResponse, Response};

use crate::dispatch::DispatchResponse;

impl IntoResponse for DispatchResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

/// Response for a panic caught at the HTTP boundary.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> HttpResponse<Body> {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(error = %message, "Handler panicked");
    DispatchResponse::internal_error(&message).into_response()
}
