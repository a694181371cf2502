//! Providers: named, refreshable sets of proxies or rules.
//!
//! # Data Flow
//! ```text
//! ProxySetProvider:  Fetcher<Vec<Arc<dyn Proxy>>>
//!     on update → swap proxies → health_check.set_proxies → spawn check()
//!
//! RuleSetProvider:   Fetcher<Vec<Arc<dyn Rule>>>
//!     on update → swap rules (RULE-SET entries see it on the next match)
//!
//! CompatibleProvider: fixed proxy list, no fetcher
//! ```
//!
//! # Design Decisions
//! - Snapshots live in `ArcSwap`: readers never see a half-built list
//! - The fetcher owns the refresh loop; providers only own parse and side effects
//! - `destroy()` is explicit, `Drop` repeats it as a backstop

mod compatible;
mod proxy_set;
mod rule_set;

pub use compatible::CompatibleProvider;
pub use proxy_set::{parse_proxy_document, ProxySetProvider};
pub use rule_set::RuleSetProvider;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::health::HealthCheck;
use crate::proxy::Proxy;
use crate::rules::Rule;
use crate::vehicle::VehicleType;

/// Refresh interval for rule providers that do not set one.
pub const DEFAULT_RULE_PROVIDER_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on one remote provider download.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(3);

/// Name held back for the provider built from inline proxies.
pub const RESERVED_NAME: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProviderType {
    Proxy,
    Rule,
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::Proxy => write!(f, "Proxy"),
            ProviderType::Rule => write!(f, "Rule"),
        }
    }
}

/// Lifecycle shared by every provider variant.
#[async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn vehicle_type(&self) -> VehicleType;

    fn provider_type(&self) -> ProviderType;

    /// First load. Must succeed before the provider is usable.
    async fn initial(&self) -> Result<()>;

    /// Force a refresh now.
    async fn update(&self) -> Result<()>;

    /// Stop background work. Idempotent.
    fn destroy(&self);

    fn updated_at(&self) -> Option<DateTime<Utc>>;
}

#[async_trait]
pub trait ProxyProvider: Provider {
    /// Current proxy snapshot.
    fn proxies(&self) -> Arc<Vec<Arc<dyn Proxy>>>;

    fn health_checker(&self) -> &Arc<HealthCheck>;

    /// Probe every proxy now.
    async fn health_check(&self) {
        self.health_checker().check().await;
    }
}

pub trait RuleProvider: Provider {
    /// Current rule snapshot.
    fn rules(&self) -> Arc<Vec<Arc<dyn Rule>>>;

    /// Policy every rule of this provider routes to.
    fn adapter(&self) -> &str;
}
