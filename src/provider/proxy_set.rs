//! Proxy provider backed by a fetched YAML document.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{Provider, ProviderType, ProxyProvider};
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, OnUpdate, Parser};
use crate::health::HealthCheck;
use crate::observability::metrics;
use crate::proxy::{Proxy, ProxyMapping, ProxyParser};
use crate::vehicle::{Vehicle, VehicleType};

#[derive(Deserialize)]
struct ProxyDocument {
    proxies: Option<Vec<ProxyMapping>>,
}

/// Parse a `proxies:` document. Any bad entry rejects the whole document.
pub fn parse_proxy_document(buf: &[u8], parser: &dyn ProxyParser) -> Result<Vec<Arc<dyn Proxy>>> {
    let doc: ProxyDocument =
        serde_yaml::from_slice(buf).map_err(|e| Error::parse("proxy document", e))?;

    let mappings = doc
        .proxies
        .ok_or_else(|| Error::EmptyResource("document has no `proxies` field".into()))?;
    if mappings.is_empty() {
        return Err(Error::EmptyResource("document lists no proxies".into()));
    }

    mappings
        .iter()
        .enumerate()
        .map(|(idx, mapping)| parser.parse_proxy(idx, mapping))
        .collect()
}

/// A named set of proxies kept fresh by a fetcher and probed by a health check.
pub struct ProxySetProvider {
    name: String,
    proxies: Arc<ArcSwap<Vec<Arc<dyn Proxy>>>>,
    health_check: Arc<HealthCheck>,
    fetcher: Fetcher<Vec<Arc<dyn Proxy>>>,
}

impl ProxySetProvider {
    /// Build the provider and start its health check loop when in auto mode.
    /// Must be called inside a tokio runtime.
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        vehicle: Arc<dyn Vehicle>,
        proxy_parser: Arc<dyn ProxyParser>,
        health_check: Arc<HealthCheck>,
    ) -> Self {
        let name = name.into();
        let proxies = Arc::new(ArcSwap::from_pointee(Vec::new()));

        let parser: Parser<Vec<Arc<dyn Proxy>>> =
            Arc::new(move |buf: &[u8]| parse_proxy_document(buf, proxy_parser.as_ref()));

        let on_update: OnUpdate<Vec<Arc<dyn Proxy>>> = {
            let name = name.clone();
            let proxies = proxies.clone();
            let hc = health_check.clone();
            Arc::new(move |list: Vec<Arc<dyn Proxy>>| {
                metrics::record_provider_items(&name, "proxy", list.len());
                tracing::info!(provider = %name, proxies = list.len(), "Proxy set updated");

                proxies.store(Arc::new(list.clone()));
                hc.set_proxies(list);

                let hc = hc.clone();
                tokio::spawn(async move { hc.check().await });
            })
        };

        health_check.start();

        Self {
            fetcher: Fetcher::new(name.clone(), interval, vehicle, parser, on_update),
            name,
            proxies,
            health_check,
        }
    }
}

impl fmt::Debug for ProxySetProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySetProvider")
            .field("name", &self.name)
            .field("vehicle", self.fetcher.vehicle())
            .field("proxies", &self.proxies.load().len())
            .finish()
    }
}

#[async_trait]
impl Provider for ProxySetProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn vehicle_type(&self) -> VehicleType {
        self.fetcher.vehicle_type()
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Proxy
    }

    async fn initial(&self) -> Result<()> {
        self.fetcher.initial().await.map(|_| ())
    }

    async fn update(&self) -> Result<()> {
        self.fetcher.update().await.map(|_| ())
    }

    fn destroy(&self) {
        self.health_check.close();
        self.fetcher.destroy();
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.fetcher.updated_at()
    }
}

#[async_trait]
impl ProxyProvider for ProxySetProvider {
    fn proxies(&self) -> Arc<Vec<Arc<dyn Proxy>>> {
        self.proxies.load_full()
    }

    fn health_checker(&self) -> &Arc<HealthCheck> {
        &self.health_check
    }
}

impl Drop for ProxySetProvider {
    fn drop(&mut self) {
        self.destroy();
    }
}
