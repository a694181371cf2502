//! MATCH (alias FINAL): the terminal catch-all rule.

use super::{Rule, RuleType};
use crate::metadata::Metadata;

#[derive(Debug, Clone)]
pub struct Match {
    adapter: String,
}

impl Match {
    pub fn new(adapter: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
        }
    }
}

impl Rule for Match {
    fn rule_type(&self) -> RuleType {
        RuleType::Match
    }

    fn matches(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn adapter(&self) -> &str {
        &self.adapter
    }

    fn payload(&self) -> &str {
        ""
    }

    fn no_resolve_ip(&self) -> bool {
        true
    }
}
