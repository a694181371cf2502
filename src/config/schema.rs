//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for rulegate.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::provider::DEFAULT_RULE_PROVIDER_INTERVAL;
use crate::proxy::ProxyMapping;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RulegateConfig {
    /// Directory holding cached copies of remote provider payloads.
    pub cache_dir: PathBuf,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Fetched proxy sets, keyed by provider name.
    pub proxy_providers: BTreeMap<String, ProxyProviderConfig>,

    /// Fetched rule sets, keyed by provider name.
    pub rule_providers: BTreeMap<String, RuleProviderConfig>,

    /// Inline proxy lists.
    pub proxy_groups: Vec<ProxyGroupConfig>,

    /// Country table for GEOIP rules.
    pub geoip: Vec<GeoIpEntry>,

    /// Ordered routing rules, first match wins.
    pub rules: Vec<String>,
}

impl Default for RulegateConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache"),
            observability: ObservabilityConfig::default(),
            proxy_providers: BTreeMap::new(),
            rule_providers: BTreeMap::new(),
            proxy_groups: Vec::new(),
            geoip: Vec::new(),
            rules: Vec::new(),
        }
    }
}

/// Where a provider's payload comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Http,
    File,
}

/// A fetched proxy set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyProviderConfig {
    #[serde(rename = "type")]
    pub kind: SourceKind,

    /// Source URL (http providers).
    pub url: Option<String>,

    /// Source file (file providers) or cache file (http providers).
    /// Defaults to `<cache_dir>/<name>.yaml` for http.
    pub path: Option<PathBuf>,

    /// Refresh interval in seconds, 0 disables refresh.
    pub interval_secs: u64,

    pub health_check: HealthCheckConfig,
}

impl Default for ProxyProviderConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Http,
            url: None,
            path: None,
            interval_secs: 3600,
            health_check: HealthCheckConfig::default(),
        }
    }
}

/// A fetched rule set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuleProviderConfig {
    #[serde(rename = "type")]
    pub kind: SourceKind,

    pub url: Option<String>,

    /// Defaults to `<cache_dir>/<name>.list` for http.
    pub path: Option<PathBuf>,

    /// Refresh interval in seconds, 0 disables refresh.
    pub interval_secs: u64,

    /// Policy every rule of this set routes to.
    pub adapter: String,
}

impl Default for RuleProviderConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Http,
            url: None,
            path: None,
            interval_secs: DEFAULT_RULE_PROVIDER_INTERVAL.as_secs(),
            adapter: String::new(),
        }
    }
}

/// Inline proxy list served by a compatible provider.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyGroupConfig {
    pub name: String,

    /// Proxy mappings, same shape as entries of a `proxies:` document.
    pub proxies: Vec<ProxyMapping>,

    pub health_check: HealthCheckConfig,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable periodic health checks.
    pub enable: bool,

    /// URL handed to each proxy's probe.
    pub url: String,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enable: true,
            url: "http://www.gstatic.com/generate_204".to_string(),
            interval_secs: 300,
            timeout_secs: 5,
            unhealthy_threshold: 1,
            healthy_threshold: 1,
        }
    }
}

/// One row of the GEOIP country table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeoIpEntry {
    pub cidr: String,
    pub country: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
