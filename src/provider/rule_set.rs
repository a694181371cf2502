//! Rule provider backed by a fetched rule list, one rule per line.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Provider, ProviderType, RuleProvider};
use crate::error::Result;
use crate::fetcher::{Fetcher, OnUpdate, Parser};
use crate::observability::metrics;
use crate::rules::{Rule, RuleParser};
use crate::vehicle::{Vehicle, VehicleType};

pub struct RuleSetProvider {
    name: String,
    adapter: String,
    rules: Arc<ArcSwap<Vec<Arc<dyn Rule>>>>,
    fetcher: Fetcher<Vec<Arc<dyn Rule>>>,
}

impl RuleSetProvider {
    /// `adapter` is the policy every rule in the set routes to.
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        vehicle: Arc<dyn Vehicle>,
        adapter: impl Into<String>,
        rule_parser: RuleParser,
    ) -> Self {
        let name = name.into();
        let adapter = adapter.into();
        let rules = Arc::new(ArcSwap::from_pointee(Vec::new()));

        let parser: Parser<Vec<Arc<dyn Rule>>> = {
            let name = name.clone();
            let adapter = adapter.clone();
            Arc::new(move |buf: &[u8]| -> Result<Vec<Arc<dyn Rule>>> {
                let (rules, skipped) = rule_parser.parse_rule_set(&name, buf, &adapter);
                metrics::record_rule_lines_skipped(&name, skipped);
                Ok(rules)
            })
        };

        let on_update: OnUpdate<Vec<Arc<dyn Rule>>> = {
            let name = name.clone();
            let rules = rules.clone();
            Arc::new(move |list: Vec<Arc<dyn Rule>>| {
                metrics::record_provider_items(&name, "rule", list.len());
                tracing::info!(provider = %name, rules = list.len(), "Rule set updated");
                rules.store(Arc::new(list));
            })
        };

        Self {
            fetcher: Fetcher::new(name.clone(), interval, vehicle, parser, on_update),
            name,
            adapter,
            rules,
        }
    }
}

impl fmt::Debug for RuleSetProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSetProvider")
            .field("name", &self.name)
            .field("adapter", &self.adapter)
            .field("vehicle", self.fetcher.vehicle())
            .field("rules", &self.rules.load().len())
            .finish()
    }
}

#[async_trait]
impl Provider for RuleSetProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn vehicle_type(&self) -> VehicleType {
        self.fetcher.vehicle_type()
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Rule
    }

    async fn initial(&self) -> Result<()> {
        self.fetcher.initial().await.map(|_| ())
    }

    async fn update(&self) -> Result<()> {
        self.fetcher.update().await.map(|_| ())
    }

    fn destroy(&self) {
        self.fetcher.destroy();
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.fetcher.updated_at()
    }
}

impl RuleProvider for RuleSetProvider {
    fn rules(&self) -> Arc<Vec<Arc<dyn Rule>>> {
        self.rules.load_full()
    }

    fn adapter(&self) -> &str {
        &self.adapter
    }
}
