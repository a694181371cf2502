//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build providers and router → initial() each
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → destroy core → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger shutdown
//!     SIGHUP → Trigger config reload
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then providers, then the router
//! - Reload builds and loads the new core before the old one is destroyed

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::SignalEvent;
pub use startup::Core;
