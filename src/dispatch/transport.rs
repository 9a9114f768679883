//! Outbound HTTP transport.
//!
//! The dispatcher only sees the [`Transport`] trait; the hyper client lives
//! behind it so dispatch logic can be exercised without sockets.

use std::future::Future;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::dispatch::types::{OutboundCall, UpstreamResponse};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to obtain a response from a backend.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, reset, DNS failure and similar.
    #[error("failed to reach upstream: {0}")]
    Connect(#[source] BoxError),

    /// The outbound request could not be assembled.
    #[error("failed to build upstream request: {0}")]
    Request(#[from] axum::http::Error),

    /// The response body could not be read.
    #[error("failed to read upstream body: {0}")]
    Body(#[source] BoxError),

    /// A delivered 5xx, when server errors are configured to count as failures.
    #[error("upstream returned {0}")]
    ServerError(StatusCode),
}

/// Sends one outbound call and returns the buffered response.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        call: OutboundCall,
    ) -> impl Future<Output = Result<UpstreamResponse, TransportError>> + Send;
}

/// Transport over a pooled hyper client.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
    max_body_bytes: usize,
}

impl HyperTransport {
    pub fn new(max_body_bytes: usize) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            max_body_bytes,
        }
    }
}

impl Transport for HyperTransport {
    async fn send(&self, call: OutboundCall) -> Result<UpstreamResponse, TransportError> {
        let mut request = Request::builder()
            .method(call.method)
            .uri(call.url)
            .body(call.body.map(Body::from).unwrap_or_else(Body::empty))?;
        *request.headers_mut() = call.headers;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| TransportError::Connect(Box::new(e)))?;

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), self.max_body_bytes)
            .await
            .map_err(|e| TransportError::Body(Box::new(e)))?;

        Ok(UpstreamResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}
