//! Provider over a fixed proxy list declared inline in the configuration.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Provider, ProviderType, ProxyProvider};
use crate::error::{Error, Result};
use crate::health::HealthCheck;
use crate::proxy::Proxy;
use crate::vehicle::VehicleType;

#[derive(Debug)]
pub struct CompatibleProvider {
    name: String,
    proxies: Arc<Vec<Arc<dyn Proxy>>>,
    health_check: Arc<HealthCheck>,
}

impl CompatibleProvider {
    /// Fails on an empty list. Starts the health check loop in auto mode.
    pub fn new(name: impl Into<String>, health_check: Arc<HealthCheck>) -> Result<Self> {
        let name = name.into();
        let proxies = health_check.proxies();
        if proxies.is_empty() {
            return Err(Error::EmptyResource(format!("provider `{name}` has no proxies")));
        }

        health_check.start();
        Ok(Self {
            name,
            proxies,
            health_check,
        })
    }
}

#[async_trait]
impl Provider for CompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn vehicle_type(&self) -> VehicleType {
        VehicleType::Compatible
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Proxy
    }

    async fn initial(&self) -> Result<()> {
        Ok(())
    }

    async fn update(&self) -> Result<()> {
        Ok(())
    }

    fn destroy(&self) {
        self.health_check.close();
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

#[async_trait]
impl ProxyProvider for CompatibleProvider {
    fn proxies(&self) -> Arc<Vec<Arc<dyn Proxy>>> {
        self.proxies.clone()
    }

    fn health_checker(&self) -> &Arc<HealthCheck> {
        &self.health_check
    }
}

impl Drop for CompatibleProvider {
    fn drop(&mut self) {
        self.destroy();
    }
}
