//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, /api/{service}/{*path})
//!     → request.rs (request ID, decode into InboundRequest)
//!     → [dispatch decides backend, breaker guards the call]
//!     → response.rs (DispatchResponse → axum Response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
