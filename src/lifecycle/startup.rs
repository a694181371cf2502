//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every provider, the GEOIP table and the router from a validated config
//! - Run each provider's first load
//! - Tear the whole set down again on shutdown or reload
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Rule providers are built before the router so RULE-SET lines can bind to them
//! - Providers initialize in order, not concurrently

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{RulegateConfig, SourceKind};
use crate::control::ProviderRegistry;
use crate::error::Result;
use crate::health::HealthCheck;
use crate::metadata::Metadata;
use crate::provider::{CompatibleProvider, ProxySetProvider, RuleSetProvider};
use crate::proxy::{EndpointParser, Proxy, ProxyParser};
use crate::routing::{RouteMatch, Router};
use crate::rules::{CidrGeoIp, RuleParser};
use crate::vehicle::{FileVehicle, HttpVehicle, Vehicle, DEFAULT_TIMEOUT};

/// Providers plus the router built over them.
#[derive(Debug)]
pub struct Core {
    registry: ProviderRegistry,
    router: Router,
    destroyed: AtomicBool,
}

impl Core {
    /// Construct providers and compile rules. Nothing is fetched yet.
    /// Must be called inside a tokio runtime.
    pub fn build(config: &RulegateConfig) -> Result<Self> {
        let mut registry = ProviderRegistry::new();
        let proxy_parser: Arc<dyn ProxyParser> = Arc::new(EndpointParser);

        let mut parser = RuleParser::new();
        if !config.geoip.is_empty() {
            let mut table = CidrGeoIp::new();
            for entry in &config.geoip {
                table.insert(&entry.cidr, &entry.country)?;
            }
            parser = parser.with_geoip(Arc::new(table));
        }

        for (name, cfg) in &config.proxy_providers {
            let vehicle = vehicle(
                cfg.kind,
                cfg.url.as_deref(),
                cfg.path.as_deref(),
                &config.cache_dir,
                name,
                "yaml",
            )?;
            let hc = HealthCheck::new(name.clone(), Vec::new(), &cfg.health_check);
            let provider = ProxySetProvider::new(
                name.clone(),
                Duration::from_secs(cfg.interval_secs),
                vehicle,
                proxy_parser.clone(),
                hc,
            );
            registry.insert_proxy_provider(Arc::new(provider));
        }

        for group in &config.proxy_groups {
            let proxies = group
                .proxies
                .iter()
                .enumerate()
                .map(|(idx, mapping)| proxy_parser.parse_proxy(idx, mapping))
                .collect::<Result<Vec<Arc<dyn Proxy>>>>()?;
            let hc = HealthCheck::new(group.name.clone(), proxies, &group.health_check);
            let provider = CompatibleProvider::new(group.name.clone(), hc)?;
            registry.insert_proxy_provider(Arc::new(provider));
        }

        for (name, cfg) in &config.rule_providers {
            let vehicle = vehicle(
                cfg.kind,
                cfg.url.as_deref(),
                cfg.path.as_deref(),
                &config.cache_dir,
                name,
                "list",
            )?;
            let provider = Arc::new(RuleSetProvider::new(
                name.clone(),
                Duration::from_secs(cfg.interval_secs),
                vehicle,
                cfg.adapter.clone(),
                parser.clone(),
            ));
            parser = parser.with_rule_provider(provider.clone());
            registry.insert_rule_provider(provider);
        }

        let router = Router::from_lines(&parser, &config.rules)?;

        tracing::info!(
            proxy_providers = registry.proxy_providers().len(),
            rule_providers = registry.rule_providers().len(),
            rules = router.rules().len(),
            "Core built"
        );

        Ok(Self {
            registry,
            router,
            destroyed: AtomicBool::new(false),
        })
    }

    /// First load of every provider. Stops at the first failure.
    pub async fn initial(&self) -> Result<()> {
        for provider in self.registry.proxy_providers().values() {
            provider.initial().await.map_err(|e| {
                tracing::error!(provider = %provider.name(), error = %e, "Proxy provider failed to load");
                e
            })?;
        }
        for provider in self.registry.rule_providers().values() {
            provider.initial().await.map_err(|e| {
                tracing::error!(provider = %provider.name(), error = %e, "Rule provider failed to load");
                e
            })?;
        }
        Ok(())
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn route(&self, metadata: &Metadata) -> Option<RouteMatch> {
        self.router.route(metadata)
    }

    /// Stop every provider. Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.registry.destroy();
        tracing::info!("Core destroyed");
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn vehicle(
    kind: SourceKind,
    url: Option<&str>,
    path: Option<&Path>,
    cache_dir: &Path,
    name: &str,
    extension: &str,
) -> Result<Arc<dyn Vehicle>> {
    match kind {
        SourceKind::File => {
            let path = path.map(Path::to_path_buf).unwrap_or_default();
            Ok(Arc::new(FileVehicle::new(path)))
        }
        SourceKind::Http => {
            let path = path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cache_path(cache_dir, name, extension));
            let url = url.unwrap_or_default();
            Ok(Arc::new(HttpVehicle::new(url, path, DEFAULT_TIMEOUT)?))
        }
    }
}

fn cache_path(cache_dir: &Path, name: &str, extension: &str) -> PathBuf {
    cache_dir.join(format!("{name}.{extension}"))
}
