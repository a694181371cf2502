//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Provider accepts a new proxy list
//!     → check.rs: set_proxies(list)   (wholesale swap)
//!     → check.rs: spawn check()       (probe every proxy concurrently)
//!     → state.rs: per-proxy success/failure recorded
//!
//! Auto mode (interval > 0):
//!     ticker → check()
//! ```
//!
//! # Design Decisions
//! - A probe failure is data on the proxy, never an error to the caller
//! - Each check probes the snapshot taken when it starts
//! - State transitions require consecutive successes/failures
//! - The loop dies with its HealthCheck: explicit close() or drop

pub mod check;
pub mod state;

pub use check::HealthCheck;
