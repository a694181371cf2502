//! Metrics collection and exposition.
//!
//! # Metrics
//! - `provider_updates_total` (counter): refresh outcomes by provider and outcome
//! - `provider_items` (gauge): proxies or rules in the current snapshot
//! - `rule_lines_skipped_total` (counter): malformed rule-set lines dropped
//! - `proxy_health` (gauge): 1=healthy, 0=unhealthy
//! - `proxy_delay_ms` (gauge): last measured probe latency

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Outcome of one fetch attempt.
#[derive(Debug, Clone, Copy)]
pub enum UpdateOutcome {
    Changed,
    Unchanged,
    Failed,
}

impl UpdateOutcome {
    fn as_str(self) -> &'static str {
        match self {
            UpdateOutcome::Changed => "changed",
            UpdateOutcome::Unchanged => "unchanged",
            UpdateOutcome::Failed => "failed",
        }
    }
}

pub fn record_provider_update(provider: &str, outcome: UpdateOutcome) {
    metrics::counter!(
        "provider_updates_total",
        "provider" => provider.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_provider_items(provider: &str, kind: &'static str, count: usize) {
    metrics::gauge!(
        "provider_items",
        "provider" => provider.to_string(),
        "kind" => kind
    )
    .set(count as f64);
}

pub fn record_rule_lines_skipped(provider: &str, skipped: usize) {
    if skipped == 0 {
        return;
    }
    metrics::counter!("rule_lines_skipped_total", "provider" => provider.to_string())
        .increment(skipped as u64);
}

pub fn record_proxy_health(provider: &str, proxy: &str, healthy: bool, delay_ms: Option<u64>) {
    metrics::gauge!(
        "proxy_health",
        "provider" => provider.to_string(),
        "proxy" => proxy.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });

    if let Some(delay) = delay_ms {
        metrics::gauge!(
            "proxy_delay_ms",
            "provider" => provider.to_string(),
            "proxy" => proxy.to_string()
        )
        .set(delay as f64);
    }
}
