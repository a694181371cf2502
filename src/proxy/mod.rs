//! Upstream proxy abstraction consumed by providers and health checks.
//!
//! # Responsibilities
//! - Represent one upstream endpoint (`Proxy`)
//! - Track its health state and last probe latency (`ProxyHealth`)
//! - Turn one configuration mapping into a `Proxy` (`ProxyParser`)
//!
//! Wire protocols live outside this crate; the built-in `Endpoint` only knows
//! how to reach its server.

mod endpoint;

pub use endpoint::{Endpoint, EndpointParser};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
pub use crate::health::state::{HealthState, ProxyHealth};

/// One configuration mapping from a provider document.
pub type ProxyMapping = serde_json::Map<String, serde_json::Value>;

/// A usable upstream endpoint.
#[async_trait]
pub trait Proxy: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Protocol label, e.g. `ss` or `trojan`.
    fn proxy_type(&self) -> &str;

    fn health(&self) -> &ProxyHealth;

    /// Reach `url` through this proxy and return the round trip.
    async fn url_test(&self, url: &str) -> std::io::Result<Duration>;
}

/// Builds proxies from configuration mappings.
pub trait ProxyParser: Send + Sync {
    /// `index` is the position of the mapping in its document, for error reporting.
    fn parse_proxy(&self, index: usize, mapping: &ProxyMapping) -> Result<Arc<dyn Proxy>>;
}

/// Serializable view of a proxy for the control plane.
#[derive(Debug, Clone, Serialize)]
pub struct ProxySnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub proxy_type: String,
    pub alive: bool,
    pub state: HealthState,
    /// Milliseconds; absent when unreachable or unprobed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
}

impl ProxySnapshot {
    pub fn of(proxy: &dyn Proxy) -> Self {
        let health = proxy.health();
        Self {
            name: proxy.name().to_string(),
            proxy_type: proxy.proxy_type().to_string(),
            alive: health.is_alive(),
            state: health.state(),
            delay: health.delay().map(|d| d.as_millis() as u64),
        }
    }
}
