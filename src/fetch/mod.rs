//! Origin fetch subsystem.
//!
//! # Data Flow
//! ```text
//! validated origin URL
//!     → origin.rs (pooled client, timeouts, status check)
//!     → buffer_pool.rs (scratch buffer checkout)
//!     → body streamed into the buffer up to the cap
//!     → PooledBuffer handed to fingerprinting and the transform
//! ```

pub mod buffer_pool;
pub mod origin;

pub use buffer_pool::{BufferPool, PooledBuffer};
pub use origin::{FetchError, OriginFetcher};
