//! RULE-SET: a rule that delegates to a rule provider's live snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{Rule, RuleType};
use crate::metadata::Metadata;
use crate::provider::RuleProvider;

#[derive(Debug, Clone)]
pub struct RuleSet {
    provider: Arc<dyn RuleProvider>,
}

impl RuleSet {
    pub fn new(provider: Arc<dyn RuleProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn RuleProvider> {
        &self.provider
    }

    /// When the backing provider last accepted or confirmed a payload.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.provider.updated_at()
    }
}

impl Rule for RuleSet {
    fn rule_type(&self) -> RuleType {
        RuleType::RuleSet
    }

    fn matches(&self, metadata: &Metadata) -> bool {
        self.provider.rules().iter().any(|rule| rule.matches(metadata))
    }

    fn adapter(&self) -> &str {
        self.provider.adapter()
    }

    fn payload(&self) -> &str {
        self.provider.name()
    }

    /// Answered from the current snapshot: a set is resolve-free only when
    /// every rule in it is.
    fn no_resolve_ip(&self) -> bool {
        self.provider.rules().iter().all(|rule| rule.no_resolve_ip())
    }

    fn as_rule_set(&self) -> Option<&RuleSet> {
        Some(self)
    }
}
