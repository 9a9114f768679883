//! Request, call and response types flowing through the dispatcher.

use std::net::IpAddr;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use serde_json::{json, Value};

use crate::dispatch::DispatchError;
use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::fallback;
use crate::routing::ServiceAddress;

/// Header reporting the breaker state on pass-through responses.
pub const X_CIRCUIT_BREAKER_STATUS: &str = "x-circuit-breaker-status";

/// Header carrying the original client address.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Hop-by-hop headers that must not be forwarded, plus `content-length`,
/// which the outbound client recomputes from the attached body.
const STRIPPED_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// A decoded inbound request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub service: String,
    /// Path below the service name, without a leading slash. May be empty.
    pub sub_path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub client_ip: IpAddr,
}

/// The single outbound request built for an inbound request.
#[derive(Debug, Clone)]
pub struct OutboundCall {
    pub method: Method,
    pub url: Uri,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl OutboundCall {
    /// Build the call to `address` for `request`.
    pub fn build(
        request: &InboundRequest,
        address: &ServiceAddress,
    ) -> Result<Self, DispatchError> {
        let mut target = format!(
            "http://{}/{}",
            address,
            request.sub_path.trim_start_matches('/')
        );
        if let Some(query) = request.query.as_deref().filter(|q| !q.is_empty()) {
            target.push('?');
            target.push_str(query);
        }
        let url: Uri = target.parse().map_err(|e| {
            DispatchError::Internal(format!("invalid target url '{}': {}", target, e))
        })?;

        let mut headers = request.headers.clone();
        for name in STRIPPED_HEADERS {
            headers.remove(name);
        }

        let host = HeaderValue::from_str(&address.to_string())
            .map_err(|e| DispatchError::Internal(format!("invalid host header: {}", e)))?;
        headers.insert(header::HOST, host);

        let forwarded_for = HeaderName::from_static(X_FORWARDED_FOR);
        if !headers.contains_key(&forwarded_for) {
            let client = HeaderValue::from_str(&request.client_ip.to_string())
                .map_err(|e| DispatchError::Internal(format!("invalid client address: {}", e)))?;
            headers.insert(forwarded_for, client);
        }

        let body = match request.method {
            Method::POST | Method::PUT => request.body.clone().filter(|b| !b.is_empty()),
            _ => None,
        };

        Ok(Self {
            method: request.method.clone(),
            url,
            headers,
            body,
        })
    }
}

/// A response delivered by a backend.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// What the dispatcher hands back to the inbound side.
#[derive(Debug, Clone)]
pub struct DispatchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl DispatchResponse {
    /// A JSON response.
    pub fn json(status: StatusCode, body: &Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Self {
            status,
            headers,
            body: Bytes::from(body.to_string()),
        }
    }

    /// Pass an upstream response through, tagged with the breaker state.
    pub fn from_upstream(upstream: UpstreamResponse, state: CircuitState) -> Self {
        let content_type = upstream
            .headers
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("application/json"));

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, content_type);
        headers.insert(
            HeaderName::from_static(X_CIRCUIT_BREAKER_STATUS),
            HeaderValue::from_static(state.as_str()),
        );

        Self {
            status: upstream.status,
            headers,
            body: upstream.body,
        }
    }

    /// The service's fallback, replacing any upstream response.
    pub fn fallback(service: &str) -> Self {
        let fallback = fallback::resolve(service);
        Self::json(fallback.status, &fallback.body)
    }

    /// 400 listing the services that can be addressed.
    pub fn unknown_service<'a>(service: &str, known: impl Iterator<Item = &'a str>) -> Self {
        let known: Vec<_> = known.collect();
        Self::json(
            StatusCode::BAD_REQUEST,
            &json!({
                "error": format!(
                    "Service '{}' not supported. Available services: {}",
                    service,
                    known.join(", ")
                ),
            }),
        )
    }

    /// 500 for faults in the dispatch path itself.
    pub fn internal_error(message: &str) -> Self {
        Self::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            &json!({
                "error": "Internal server error in gateway",
                "message": message,
            }),
        )
    }

    /// Parse the body as JSON.
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}
