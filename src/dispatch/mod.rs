//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest (from http/server.rs)
//!     → dispatcher.rs (validate, build call, guard with breaker)
//!     → transport.rs (hyper client, outside every lock)
//!     → DispatchResponse (pass-through, fallback, 400 or 500)
//! ```

pub mod dispatcher;
pub mod transport;
pub mod types;

use thiserror::Error;

pub use dispatcher::Dispatcher;
pub use transport::{HyperTransport, Transport, TransportError};
pub use types::{DispatchResponse, InboundRequest, OutboundCall, UpstreamResponse};

/// Failures resolved inside the dispatcher; never escape it.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("service '{0}' is not supported")]
    UnknownService(String),

    #[error("{0}")]
    Internal(String),
}
