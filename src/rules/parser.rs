//! Text → `Rule` conversion.
//!
//! # Grammar
//! ```text
//! provider line:  TYPE[,PAYLOAD[,PARAM...]]          adapter comes from the provider
//! config line:    TYPE,PAYLOAD,TARGET[,PARAM...]
//!                 MATCH,TARGET | FINAL,TARGET
//!                 RULE-SET,PROVIDER,TARGET           target must name the provider's adapter or be omitted
//! ```
//!
//! # Design Decisions
//! - Every field is trimmed; keywords stay case-sensitive
//! - A rule-set document is parsed line by line and bad lines are dropped,
//!   a config rule list is all-or-nothing (the validator reports every error)

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::geoip::GeoIpLookup;
use super::{Domain, DomainKeyword, DomainSuffix, GeoIp, IpCidr, Match, Port, Rule, RuleSet};
use crate::error::{Error, Result};
use crate::provider::RuleProvider;

const NO_RESOLVE: &str = "no-resolve";

/// Builds rules, resolving GEOIP lookups and RULE-SET references.
#[derive(Clone, Default)]
pub struct RuleParser {
    geoip: Option<Arc<dyn GeoIpLookup>>,
    providers: HashMap<String, Arc<dyn RuleProvider>>,
}

impl fmt::Debug for RuleParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleParser")
            .field("geoip", &self.geoip.is_some())
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RuleParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_geoip(mut self, lookup: Arc<dyn GeoIpLookup>) -> Self {
        self.geoip = Some(lookup);
        self
    }

    /// Make a rule provider addressable from `RULE-SET` config lines.
    pub fn with_rule_provider(mut self, provider: Arc<dyn RuleProvider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    /// Build one rule from already-split fields.
    pub fn build(
        &self,
        rule_type: &str,
        payload: &str,
        target: &str,
        params: &[&str],
    ) -> Result<Arc<dyn Rule>> {
        let no_resolve = has_no_resolve(params);
        if rule_type.starts_with("DOMAIN") && payload.is_empty() {
            return Err(Error::parse("", format!("{rule_type} needs a domain")));
        }

        let rule: Arc<dyn Rule> = match rule_type {
            "DOMAIN" => Arc::new(Domain::new(payload, target)),
            "DOMAIN-SUFFIX" => Arc::new(DomainSuffix::new(payload, target)),
            "DOMAIN-KEYWORD" => Arc::new(DomainKeyword::new(payload, target)),
            "GEOIP" => {
                if payload.is_empty() {
                    return Err(Error::parse("", "GEOIP needs a country code"));
                }
                Arc::new(GeoIp::new(payload, target, no_resolve, self.geoip.clone()))
            }
            "IP-CIDR" | "IP-CIDR6" => Arc::new(IpCidr::new(payload, target, no_resolve)?),
            "SRC-IP-CIDR" | "SOURCE-IP-CIDR" => Arc::new(IpCidr::source(payload, target)?),
            "SRC-PORT" => Arc::new(Port::new(payload, target, true)?),
            "DST-PORT" => Arc::new(Port::new(payload, target, false)?),
            "MATCH" | "FINAL" => Arc::new(Match::new(target)),
            other => return Err(Error::UnsupportedRuleType(other.to_string())),
        };
        Ok(rule)
    }

    /// Parse a line from a rule-set document. Fields after the payload are params.
    pub fn parse_provider_line(&self, line: &str, adapter: &str) -> Result<Arc<dyn Rule>> {
        let fields = split(line);
        let (rule_type, payload, params) = match fields.as_slice() {
            [] | [""] => return Err(Error::parse("", "empty rule")),
            [rule_type] => (*rule_type, "", &[][..]),
            [rule_type, payload] => (*rule_type, *payload, &[][..]),
            [rule_type, payload, params @ ..] => (*rule_type, *payload, params),
        };
        self.build(rule_type, payload, adapter, params)
    }

    /// Parse a top-level routing rule, which names its own target.
    pub fn parse_config_line(&self, line: &str) -> Result<Arc<dyn Rule>> {
        let fields = split(line);
        let result = match fields.as_slice() {
            [] | [""] => Err(Error::parse("", "empty rule")),
            ["MATCH" | "FINAL", target] => self.build(fields[0], "", target, &[]),
            ["RULE-SET", name, rest @ ..] => self.rule_set(name, rest.first().copied()),
            [rule_type, payload, target, params @ ..] => {
                self.build(rule_type, payload, target, params)
            }
            [rule_type, ..] => match *rule_type {
                "DOMAIN" | "DOMAIN-SUFFIX" | "DOMAIN-KEYWORD" | "GEOIP" | "IP-CIDR"
                | "IP-CIDR6" | "SRC-IP-CIDR" | "SOURCE-IP-CIDR" | "SRC-PORT" | "DST-PORT"
                | "MATCH" | "FINAL" => Err(Error::parse("", "missing target")),
                other => Err(Error::UnsupportedRuleType(other.to_string())),
            },
        };
        result.map_err(|e| e.at(format!("rule `{}`", line.trim())))
    }

    fn rule_set(&self, name: &str, target: Option<&str>) -> Result<Arc<dyn Rule>> {
        let provider = self
            .providers
            .get(name)
            .ok_or_else(|| Error::parse("", format!("unknown rule provider `{name}`")))?;

        if let Some(target) = target {
            if !target.is_empty() && target != provider.adapter() {
                return Err(Error::parse(
                    "",
                    format!(
                        "rule provider `{name}` routes to `{}`, not `{target}`",
                        provider.adapter()
                    ),
                ));
            }
        }
        Ok(Arc::new(RuleSet::new(provider.clone())))
    }

    /// Parse a rule-set document, skipping lines that do not parse.
    /// Returns the rules and the number of skipped lines.
    pub fn parse_rule_set(
        &self,
        provider: &str,
        buf: &[u8],
        adapter: &str,
    ) -> (Vec<Arc<dyn Rule>>, usize) {
        let mut rules = Vec::new();
        let mut skipped = 0;

        // Lines are decoded one at a time so a stray non-UTF-8 byte only costs its own line.
        for (idx, raw) in buf.split(|b| *b == b'\n').enumerate() {
            let parsed = std::str::from_utf8(raw)
                .map_err(|e| Error::parse("", e))
                .and_then(|text| {
                    let line = text.trim();
                    if line.is_empty() || line.starts_with('#') {
                        return Ok(None);
                    }
                    self.parse_provider_line(line, adapter).map(Some)
                });

            match parsed {
                Ok(Some(rule)) => rules.push(rule),
                Ok(None) => {}
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        provider = %provider,
                        line = idx + 1,
                        rule = %String::from_utf8_lossy(raw).trim(),
                        error = %e,
                        "Skipping malformed rule"
                    );
                }
            }
        }

        (rules, skipped)
    }
}

/// True when any param is the `no-resolve` flag.
pub fn has_no_resolve(params: &[&str]) -> bool {
    params.iter().any(|p| *p == NO_RESOLVE)
}

fn split(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}
