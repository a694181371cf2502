//! rulegate: refreshable proxy and rule providers with a first-match rule router.

pub mod config;
pub mod control;
pub mod error;
pub mod fetcher;
pub mod health;
pub mod lifecycle;
pub mod metadata;
pub mod observability;
pub mod provider;
pub mod proxy;
pub mod resilience;
pub mod routing;
pub mod rules;
pub mod vehicle;

pub use config::RulegateConfig;
pub use error::{Error, Result};
pub use lifecycle::{Core, Shutdown};
pub use metadata::Metadata;
