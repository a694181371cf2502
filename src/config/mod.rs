//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, rules compiled once)
//!     → RulegateConfig (validated, immutable)
//!     → lifecycle::startup builds providers and the router from it
//!
//! On reload signal:
//!     watcher.rs detects change (or SIGHUP)
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new core built and initialised, then swapped in
//!     → old core destroyed
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    GeoIpEntry, HealthCheckConfig, LogFormat, ObservabilityConfig, ProxyGroupConfig,
    ProxyProviderConfig, RuleProviderConfig, RulegateConfig, SourceKind,
};
