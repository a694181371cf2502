//! Serializable views of providers and rules.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::provider::{ProviderType, ProxyProvider, RuleProvider};
use crate::proxy::ProxySnapshot;
use crate::rules::{Rule, RuleType};
use crate::vehicle::VehicleType;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyProviderSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub vehicle_type: VehicleType,
    pub proxies: Vec<ProxySnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProxyProviderSnapshot {
    pub fn of(provider: &dyn ProxyProvider) -> Self {
        Self {
            name: provider.name().to_string(),
            provider_type: provider.provider_type(),
            vehicle_type: provider.vehicle_type(),
            proxies: provider
                .proxies()
                .iter()
                .map(|p| ProxySnapshot::of(p.as_ref()))
                .collect(),
            updated_at: provider.updated_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleProviderSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub vehicle_type: VehicleType,
    #[serde(rename = "proxy")]
    pub adapter: String,
    pub rules: Vec<RuleSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RuleProviderSnapshot {
    pub fn of(provider: &dyn RuleProvider) -> Self {
        Self {
            name: provider.name().to_string(),
            provider_type: provider.provider_type(),
            vehicle_type: provider.vehicle_type(),
            adapter: provider.adapter().to_string(),
            rules: provider
                .rules()
                .iter()
                .map(|r| RuleSnapshot::of(r.as_ref()))
                .collect(),
            updated_at: provider.updated_at(),
        }
    }
}

/// One rule as listed by the control plane.
#[derive(Debug, Clone, Serialize)]
pub struct RuleSnapshot {
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub payload: String,
    /// Target policy.
    pub proxy: String,
    /// Only present for RULE-SET entries.
    #[serde(rename = "last-update", skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

impl RuleSnapshot {
    pub fn of(rule: &dyn Rule) -> Self {
        Self {
            rule_type: rule.rule_type(),
            payload: rule.payload().to_string(),
            proxy: rule.adapter().to_string(),
            last_update: rule.as_rule_set().and_then(|set| set.last_update()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::DomainSuffix;

    #[test]
    fn test_rule_snapshot_shape() {
        let rule = DomainSuffix::new("example.com", "Proxy");
        let json = serde_json::to_value(RuleSnapshot::of(&rule)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "DomainSuffix", "payload": "example.com", "proxy": "Proxy"})
        );
    }
}
