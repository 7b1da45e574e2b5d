//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming image request:
//!     → allow_list.rs (is the origin domain permitted?)
//!     → [origin fetch, with a hard body cap]
//! Outgoing response:
//!     → headers.rs (nosniff on every response)
//! ```
//!
//! # Design Decisions
//! - The allow-list is checked before any outbound connection is made
//! - An empty allow-list is an explicit, logged allow-all policy
//! - No trust in client input

pub mod allow_list;
pub mod headers;

pub use allow_list::AllowList;
