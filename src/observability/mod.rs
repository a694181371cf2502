//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Fetchers, providers, health checks produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Structured fields (provider, proxy, error) rather than formatted strings
//! - Metric updates go through the `metrics` facade; without an installed
//!   recorder they are no-ops, so library users pay nothing

pub mod logging;
pub mod metrics;
