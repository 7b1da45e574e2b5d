//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → middleware.rs (skip liveness probe)
//!     → gate.rs (free slot? → proceed
//!                full?      → wait up to queue timeout → proceed | 503)
//!     → request pipeline
//!     → slot released on drop
//! ```
//!
//! # Design Decisions
//! - The gate is the only backpressure for fetch and transform work alike
//! - Admitted requests are never aborted by the gate
//! - Slots are RAII permits, so every exit path releases capacity

pub mod gate;
pub mod middleware;

pub use gate::{Admission, AdmissionError, AdmissionGate, AdmissionSlot};
pub use middleware::admission_middleware;
