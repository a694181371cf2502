//! Resilience helpers for refresh loops.
//!
//! # Data Flow
//! ```text
//! Fetcher tick fails
//!     → backoff.rs (next attempt after jittered exponential delay)
//!     → delay capped at the provider's refresh interval
//! Tick succeeds
//!     → attempt counter resets, regular interval resumes
//! ```
//!
//! # Design Decisions
//! - A failed refresh never stops the loop
//! - Jitter keeps many providers pointed at one host from retrying in lockstep

pub mod backoff;
