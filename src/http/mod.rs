//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, query parsing)
//!     → [admission gate]
//!     → handler.rs (image pipeline)
//!     → error.rs (failure → status code)
//!     → response.rs (image / 304 responses, cache headers)
//!     → Send to client
//! ```

pub mod error;
pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use error::ProxyError;
pub use request::{ImageParams, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError, HEALTH_PATH};
