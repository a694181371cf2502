//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Connection Metadata (host, dst ip/port, src ip/port)
//!     → router.rs (walk ordered rules)
//!     → rule.matches(), RULE-SET entries consult their provider snapshot
//!     → Return: first RouteMatch or None
//!
//! Rule Compilation (at startup and on reload):
//!     config rule lines
//!     → rules::RuleParser
//!     → Router::set_rules (whole-list swap)
//! ```
//!
//! # Design Decisions
//! - Rule list swapped atomically, lookups never take a lock
//! - Deterministic: same input always matches same rule
//! - First match wins (config order)
//! - Destination resolved lazily, only when a rule actually needs the IP

pub mod router;

pub use router::{RouteMatch, Router};
