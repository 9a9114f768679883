//! Degraded responses substituted when a backend is rejected or unreachable.

use axum::http::StatusCode;
use serde_json::{json, Value};

/// Canned response for one service.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Fallback for `service`. Always 503.
pub fn resolve(service: &str) -> FallbackResponse {
    let body = match service {
        "auth" => json!({
            "error": "Auth service is temporarily unavailable",
            "circuitBreaker": "open",
        }),
        "todos" => json!({
            "error": "Todos service is temporarily unavailable",
            "circuitBreaker": "open",
            "data": [],
        }),
        "users" => json!({
            "error": "Users service is temporarily unavailable",
            "circuitBreaker": "open",
            "data": [],
        }),
        "frontend" => json!({
            "error": "Frontend service is temporarily unavailable",
            "circuitBreaker": "open",
        }),
        _ => json!({
            "error": "Service is temporarily unavailable",
            "circuitBreaker": "open",
        }),
    };

    FallbackResponse {
        status: StatusCode::SERVICE_UNAVAILABLE,
        body,
    }
}
