//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (RULE-SET lines reference existing rule providers)
//! - Validate sources (http providers need a URL, file providers a path)
//! - Compile every rule and inline proxy once so bad input fails at load time
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RulegateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - A rule list without a trailing MATCH only warns

use std::collections::HashSet;
use std::net::SocketAddr;

use ipnet::IpNet;
use thiserror::Error;
use url::Url;

use crate::config::schema::{RulegateConfig, SourceKind};
use crate::provider::RESERVED_NAME;
use crate::proxy::{EndpointParser, ProxyParser};
use crate::rules::RuleParser;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{kind} provider with an empty name")]
    EmptyName { kind: &'static str },

    #[error("provider name `{name}` is reserved")]
    ReservedName { name: String },

    #[error("duplicate proxy provider `{name}`")]
    DuplicateName { name: String },

    #[error("provider `{provider}`: http source needs a url")]
    MissingUrl { provider: String },

    #[error("provider `{provider}`: invalid url `{url}`: {reason}")]
    InvalidUrl {
        provider: String,
        url: String,
        reason: String,
    },

    #[error("provider `{provider}`: file source needs a path")]
    MissingPath { provider: String },

    #[error("rule provider `{provider}` has no adapter")]
    MissingAdapter { provider: String },

    #[error("proxy group `{group}` has no proxies")]
    EmptyGroup { group: String },

    #[error("proxy group `{group}`: {reason}")]
    InvalidProxy { group: String, reason: String },

    #[error("rule {index}: {reason}")]
    InvalidRule { index: usize, reason: String },

    #[error("rule {index}: unknown rule provider `{name}`")]
    UnknownRuleProvider { index: usize, name: String },

    #[error("geoip entry `{cidr}`: {reason}")]
    InvalidGeoIp { cidr: String, reason: String },

    #[error("invalid metrics address `{0}`")]
    InvalidMetricsAddress(String),
}

/// Check a parsed config. Collects every error.
pub fn validate_config(config: &RulegateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_observability(config, &mut errors);
    validate_proxy_providers(config, &mut errors);
    validate_rule_providers(config, &mut errors);
    validate_proxy_groups(config, &mut errors);
    validate_geoip(config, &mut errors);
    validate_rules(config, &mut errors);

    if !config.rules.is_empty() && !has_fallback(config) {
        tracing::warn!("Last rule is not MATCH, unmatched connections get no route");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// True when the rule list ends in a catch-all.
pub fn has_fallback(config: &RulegateConfig) -> bool {
    config
        .rules
        .last()
        .and_then(|line| line.split(',').next())
        .map(str::trim)
        .is_some_and(|kind| kind == "MATCH" || kind == "FINAL")
}

fn validate_observability(config: &RulegateConfig, errors: &mut Vec<ValidationError>) {
    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(
            obs.metrics_address.clone(),
        ));
    }
}

fn check_name(kind: &'static str, name: &str, errors: &mut Vec<ValidationError>) {
    if name.trim().is_empty() {
        errors.push(ValidationError::EmptyName { kind });
    } else if name == RESERVED_NAME {
        errors.push(ValidationError::ReservedName {
            name: name.to_string(),
        });
    }
}

fn check_source(
    name: &str,
    kind: SourceKind,
    url: Option<&str>,
    has_path: bool,
    errors: &mut Vec<ValidationError>,
) {
    match kind {
        SourceKind::Http => match url {
            None => errors.push(ValidationError::MissingUrl {
                provider: name.to_string(),
            }),
            Some(raw) => match Url::parse(raw) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => errors.push(ValidationError::InvalidUrl {
                    provider: name.to_string(),
                    url: raw.to_string(),
                    reason: format!("unsupported scheme `{}`", parsed.scheme()),
                }),
                Err(e) => errors.push(ValidationError::InvalidUrl {
                    provider: name.to_string(),
                    url: raw.to_string(),
                    reason: e.to_string(),
                }),
            },
        },
        SourceKind::File => {
            if !has_path {
                errors.push(ValidationError::MissingPath {
                    provider: name.to_string(),
                });
            }
        }
    }
}

fn validate_proxy_providers(config: &RulegateConfig, errors: &mut Vec<ValidationError>) {
    for (name, provider) in &config.proxy_providers {
        check_name("proxy", name, errors);
        check_source(
            name,
            provider.kind,
            provider.url.as_deref(),
            provider.path.is_some(),
            errors,
        );
    }
}

fn validate_rule_providers(config: &RulegateConfig, errors: &mut Vec<ValidationError>) {
    for (name, provider) in &config.rule_providers {
        check_name("rule", name, errors);
        check_source(
            name,
            provider.kind,
            provider.url.as_deref(),
            provider.path.is_some(),
            errors,
        );
        if provider.adapter.trim().is_empty() {
            errors.push(ValidationError::MissingAdapter {
                provider: name.clone(),
            });
        }
    }
}

fn validate_proxy_groups(config: &RulegateConfig, errors: &mut Vec<ValidationError>) {
    let mut seen: HashSet<&str> = config.proxy_providers.keys().map(String::as_str).collect();

    for group in &config.proxy_groups {
        check_name("proxy", &group.name, errors);
        if !seen.insert(group.name.as_str()) {
            errors.push(ValidationError::DuplicateName {
                name: group.name.clone(),
            });
        }

        if group.proxies.is_empty() {
            errors.push(ValidationError::EmptyGroup {
                group: group.name.clone(),
            });
        }
        for (idx, mapping) in group.proxies.iter().enumerate() {
            if let Err(e) = EndpointParser.parse_proxy(idx, mapping) {
                errors.push(ValidationError::InvalidProxy {
                    group: group.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

fn validate_geoip(config: &RulegateConfig, errors: &mut Vec<ValidationError>) {
    for entry in &config.geoip {
        if let Err(e) = entry.cidr.parse::<IpNet>() {
            errors.push(ValidationError::InvalidGeoIp {
                cidr: entry.cidr.clone(),
                reason: e.to_string(),
            });
        }
    }
}

fn validate_rules(config: &RulegateConfig, errors: &mut Vec<ValidationError>) {
    let parser = RuleParser::new();

    for (index, line) in config.rules.iter().enumerate() {
        let mut fields = line.split(',').map(str::trim);
        if fields.next() == Some("RULE-SET") {
            let name = fields.next().unwrap_or_default();
            if !config.rule_providers.contains_key(name) {
                errors.push(ValidationError::UnknownRuleProvider {
                    index,
                    name: name.to_string(),
                });
            }
            continue;
        }

        if let Err(e) = parser.parse_config_line(line) {
            errors.push(ValidationError::InvalidRule {
                index,
                reason: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ProxyGroupConfig, ProxyProviderConfig, RuleProviderConfig};

    fn base() -> RulegateConfig {
        RulegateConfig {
            rules: vec!["MATCH,Direct".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_with_match_is_valid() {
        assert!(validate_config(&base()).is_ok());
        assert!(has_fallback(&base()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = base();
        config
            .proxy_providers
            .insert("default".into(), ProxyProviderConfig::default());
        config.rule_providers.insert(
            "ads".into(),
            RuleProviderConfig {
                kind: SourceKind::File,
                ..Default::default()
            },
        );
        config.rules.insert(0, "RULE-SET,missing,Reject".into());
        config.rules.insert(0, "DST-PORT,abc,Proxy".into());

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ReservedName { name: "default".into() }));
        assert!(errors.contains(&ValidationError::MissingUrl { provider: "default".into() }));
        assert!(errors.contains(&ValidationError::MissingPath { provider: "ads".into() }));
        assert!(errors.contains(&ValidationError::MissingAdapter { provider: "ads".into() }));
        assert!(errors.contains(&ValidationError::UnknownRuleProvider {
            index: 1,
            name: "missing".into()
        }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidRule { index: 0, .. })));
        assert_eq!(errors.len(), 6);
    }

    #[test]
    fn test_url_scheme() {
        let mut config = base();
        config.proxy_providers.insert(
            "sub".into(),
            ProxyProviderConfig {
                url: Some("ftp://example.com/sub.yaml".into()),
                ..Default::default()
            },
        );
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidUrl { .. }));
    }

    #[test]
    fn test_group_checks() {
        let mut config = base();
        config.proxy_providers.insert(
            "sub".into(),
            ProxyProviderConfig {
                url: Some("https://example.com/sub.yaml".into()),
                ..Default::default()
            },
        );
        config.proxy_groups.push(ProxyGroupConfig {
            name: "sub".into(),
            ..Default::default()
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateName { name: "sub".into() }));
        assert!(errors.contains(&ValidationError::EmptyGroup { group: "sub".into() }));
    }

    #[test]
    fn test_missing_fallback_only_warns() {
        let mut config = base();
        config.rules = vec!["DOMAIN,a.com,Proxy".into()];
        assert!(validate_config(&config).is_ok());
        assert!(!has_fallback(&config));
    }
}
