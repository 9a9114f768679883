//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every inbound request
//! - Decode an axum request into the dispatcher's `InboundRequest`
//!
//! The service and sub-path come from the raw request path, so percent
//! escapes reach the backend exactly as the client sent them.
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The ID header is forwarded to the backend along with the other inbound headers

use std::net::IpAddr;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::dispatch::InboundRequest;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request ID of a request, or "unknown".
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Split `/api/{service}[/{rest}]` into its raw service segment and rest.
pub fn split_api_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix("/api/")?;
    Some(rest.split_once('/').unwrap_or((rest, "")))
}

/// Decoded pieces of an inbound request, before they become an `InboundRequest`.
#[derive(Debug)]
pub struct RawRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: IpAddr,
}

impl RawRequest {
    pub fn into_inbound(self) -> InboundRequest {
        let (service, sub_path) = split_api_path(self.uri.path()).unwrap_or(("", ""));
        let service = service.to_string();
        let sub_path = sub_path.to_string();

        InboundRequest {
            method: self.method,
            service,
            sub_path,
            query: self.uri.query().map(str::to_string),
            headers: self.headers,
            body: (!self.body.is_empty()).then_some(self.body),
            client_ip: self.client_ip,
        }
    }
}
