//! Control plane: inspect and drive providers at runtime.
//!
//! # Responsibilities
//! - Look up providers by name
//! - Force a refresh or a health check of one provider
//! - Produce serializable snapshots for an HTTP or CLI front-end
//! - Refresh every rule provider under a deadline
//!
//! # Design Decisions
//! - No transport here; front-ends map `ControlError` to their own status codes
//! - Batch refresh runs providers concurrently and abandons stragglers at the deadline

mod snapshot;

pub use snapshot::{ProxyProviderSnapshot, RuleProviderSnapshot, RuleSnapshot};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::error::Error;
use crate::provider::{ProxyProvider, RuleProvider};
use crate::routing::Router;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("provider `{0}` not found")]
    NotFound(String),

    #[error("provider unavailable: {0}")]
    Unavailable(#[source] Error),
}

impl ControlError {
    /// HTTP status a front-end should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ControlError::NotFound(_) => 404,
            ControlError::Unavailable(_) => 503,
        }
    }
}

/// All live providers, keyed by name.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    proxy_providers: BTreeMap<String, Arc<dyn ProxyProvider>>,
    rule_providers: BTreeMap<String, Arc<dyn RuleProvider>>,
}

/// Everything the control plane can show at once.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSnapshot {
    pub proxy_providers: BTreeMap<String, ProxyProviderSnapshot>,
    pub rule_providers: BTreeMap<String, RuleProviderSnapshot>,
    pub rules: Vec<RuleSnapshot>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_proxy_provider(&mut self, provider: Arc<dyn ProxyProvider>) {
        self.proxy_providers
            .insert(provider.name().to_string(), provider);
    }

    pub fn insert_rule_provider(&mut self, provider: Arc<dyn RuleProvider>) {
        self.rule_providers
            .insert(provider.name().to_string(), provider);
    }

    pub fn proxy_providers(&self) -> &BTreeMap<String, Arc<dyn ProxyProvider>> {
        &self.proxy_providers
    }

    pub fn rule_providers(&self) -> &BTreeMap<String, Arc<dyn RuleProvider>> {
        &self.rule_providers
    }

    pub fn proxy_provider(&self, name: &str) -> Result<&Arc<dyn ProxyProvider>, ControlError> {
        self.proxy_providers
            .get(name)
            .ok_or_else(|| ControlError::NotFound(name.to_string()))
    }

    pub fn rule_provider(&self, name: &str) -> Result<&Arc<dyn RuleProvider>, ControlError> {
        self.rule_providers
            .get(name)
            .ok_or_else(|| ControlError::NotFound(name.to_string()))
    }

    pub async fn update_proxy_provider(&self, name: &str) -> Result<(), ControlError> {
        self.proxy_provider(name)?
            .update()
            .await
            .map_err(ControlError::Unavailable)
    }

    pub async fn update_rule_provider(&self, name: &str) -> Result<(), ControlError> {
        self.rule_provider(name)?
            .update()
            .await
            .map_err(ControlError::Unavailable)
    }

    /// Probe every proxy of one provider and wait for the pass to finish.
    pub async fn health_check(&self, name: &str) -> Result<(), ControlError> {
        self.proxy_provider(name)?.health_check().await;
        Ok(())
    }

    pub fn snapshot(&self, router: &Router) -> ControlSnapshot {
        ControlSnapshot {
            proxy_providers: self
                .proxy_providers
                .iter()
                .map(|(name, p)| (name.clone(), ProxyProviderSnapshot::of(p.as_ref())))
                .collect(),
            rule_providers: self
                .rule_providers
                .iter()
                .map(|(name, p)| (name.clone(), RuleProviderSnapshot::of(p.as_ref())))
                .collect(),
            rules: router
                .rules()
                .iter()
                .map(|r| RuleSnapshot::of(r.as_ref()))
                .collect(),
        }
    }

    /// Update every rule provider concurrently. Providers still running at
    /// `timeout` are aborted. Returns the names that refreshed successfully.
    pub async fn refresh_rule_providers(&self, timeout: Duration) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut set = JoinSet::new();

        for (name, provider) in &self.rule_providers {
            let name = name.clone();
            let provider = provider.clone();
            set.spawn(async move {
                let result = provider.update().await;
                (name, result)
            });
        }

        let mut refreshed = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok((name, Ok(()))))) => refreshed.push(name),
                Ok(Some(Ok((name, Err(e))))) => {
                    tracing::warn!(provider = %name, error = %e, "Rule provider refresh failed");
                }
                Ok(Some(Err(e))) => {
                    tracing::error!(error = %e, "Rule provider refresh task panicked");
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        pending = set.len(),
                        timeout_ms = timeout.as_millis() as u64,
                        "Rule provider refresh deadline reached"
                    );
                    set.abort_all();
                    break;
                }
            }
        }

        refreshed.sort();
        refreshed
    }

    /// Stop every provider. Idempotent.
    pub fn destroy(&self) {
        for provider in self.proxy_providers.values() {
            provider.destroy();
        }
        for provider in self.rule_providers.values() {
            provider.destroy();
        }
    }
}
