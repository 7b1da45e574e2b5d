//! Image transform subsystem.
//!
//! # Data Flow
//! ```text
//! query params + Accept header
//!     → options.rs (TransformOptions, OutputFormat)
//!     → fingerprint.rs (ETag over bytes + URL + options)
//!     → invoker.rs (blocking pool + panic boundary)
//!     → engine.rs (decode → resize → encode)
//! ```
//!
//! # Design Decisions
//! - The exact `TransformOptions` value that is fingerprinted is the one the engine runs
//! - The engine sits behind a trait so it can be swapped or faked
//! - Engine faults never escape a single request

pub mod engine;
pub mod fingerprint;
pub mod invoker;
pub mod options;

pub use engine::{EngineError, ImageEngine, TransformEngine};
pub use fingerprint::Fingerprint;
pub use invoker::{TransformError, TransformInvoker};
pub use options::{OutputFormat, TransformOptions};
