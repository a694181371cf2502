//! Rule lookup and dispatch.
//!
//! # Responsibilities
//! - Hold the ordered top-level rule list
//! - Find the first rule matching a connection
//! - Return the matched rule or an explicit no-match
//!
//! # Design Decisions
//! - List held in an `ArcSwap`: readers see the old or the new list, never a mix
//! - O(n) scan; rule-set entries add their own snapshot scan
//! - Resolution of the destination is delegated to the caller via a closure

use std::net::IpAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::Result;
use crate::metadata::Metadata;
use crate::rules::{Rule, RuleParser, RuleType};

/// The rule that decided a connection.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub adapter: String,
    pub rule: Arc<dyn Rule>,
}

impl RouteMatch {
    pub fn rule_type(&self) -> RuleType {
        self.rule.rule_type()
    }
}

/// Ordered first-match router.
#[derive(Debug)]
pub struct Router {
    rules: ArcSwap<Vec<Arc<dyn Rule>>>,
}

impl Router {
    pub fn new(rules: Vec<Arc<dyn Rule>>) -> Self {
        Self {
            rules: ArcSwap::from_pointee(rules),
        }
    }

    /// Compile config rule lines. Fails on the first bad line.
    pub fn from_lines<S: AsRef<str>>(parser: &RuleParser, lines: &[S]) -> Result<Self> {
        let rules = lines
            .iter()
            .map(|line| parser.parse_config_line(line.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(rules))
    }

    /// Current rule list.
    pub fn rules(&self) -> Arc<Vec<Arc<dyn Rule>>> {
        self.rules.load_full()
    }

    /// Replace the whole rule list.
    pub fn set_rules(&self, rules: Vec<Arc<dyn Rule>>) {
        tracing::info!(rules = rules.len(), "Routing rules replaced");
        self.rules.store(Arc::new(rules));
    }

    /// Route without resolving: IP rules only see an IP the client dialled.
    pub fn route(&self, metadata: &Metadata) -> Option<RouteMatch> {
        self.route_with(metadata, |_| None)
    }

    /// Route, calling `resolve` at most once, right before the first rule
    /// that needs the destination IP of a named host.
    pub fn route_with<F>(&self, metadata: &Metadata, mut resolve: F) -> Option<RouteMatch>
    where
        F: FnMut(&str) -> Option<IpAddr>,
    {
        let rules = self.rules.load_full();
        let mut resolved: Option<Metadata> = None;
        let mut attempted = metadata.dst_ip.is_some() || metadata.host.is_empty();

        for rule in rules.iter() {
            if !attempted && !rule.no_resolve_ip() {
                attempted = true;
                match resolve(&metadata.host) {
                    Some(ip) => {
                        let mut md = metadata.clone();
                        md.dst_ip = Some(ip);
                        resolved = Some(md);
                    }
                    None => {
                        tracing::debug!(host = %metadata.host, "Destination did not resolve");
                    }
                }
            }

            let md = resolved.as_ref().unwrap_or(metadata);
            if rule.matches(md) {
                tracing::trace!(
                    rule = %rule.rule_type(),
                    payload = %rule.payload(),
                    adapter = %rule.adapter(),
                    "Rule matched"
                );
                return Some(RouteMatch {
                    adapter: rule.adapter().to_string(),
                    rule: rule.clone(),
                });
            }
        }

        None
    }
}
