//! Active health checking of a provider's proxies.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::HealthCheckConfig;
use crate::observability::metrics;
use crate::proxy::Proxy;

/// Probes a set of proxies on demand or on a fixed interval.
#[derive(Debug)]
pub struct HealthCheck {
    provider: String,
    proxies: ArcSwap<Vec<Arc<dyn Proxy>>>,
    url: String,
    interval: Duration,
    timeout: Duration,
    healthy_threshold: usize,
    unhealthy_threshold: usize,
    stop: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthCheck {
    pub fn new(
        provider: impl Into<String>,
        proxies: Vec<Arc<dyn Proxy>>,
        config: &HealthCheckConfig,
    ) -> Arc<Self> {
        let interval = if config.enable {
            Duration::from_secs(config.interval_secs)
        } else {
            Duration::ZERO
        };

        Arc::new(Self {
            provider: provider.into(),
            proxies: ArcSwap::from_pointee(proxies),
            url: config.url.clone(),
            interval,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            healthy_threshold: config.healthy_threshold as usize,
            unhealthy_threshold: config.unhealthy_threshold as usize,
            stop: CancellationToken::new(),
            task: Mutex::new(None),
        })
    }

    /// True when a background probe loop should run.
    pub fn auto(&self) -> bool {
        !self.interval.is_zero()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start the background loop in auto mode. Later calls are no-ops.
    pub fn start(self: &Arc<Self>) {
        if !self.auto() {
            return;
        }

        let mut slot = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() || self.stop.is_cancelled() {
            return;
        }

        tracing::info!(
            provider = %self.provider,
            interval_secs = self.interval.as_secs(),
            url = %self.url,
            "Health check starting"
        );
        *slot = Some(tokio::spawn(process(
            Arc::downgrade(self),
            self.stop.clone(),
            self.interval,
        )));
    }

    /// Replace the probed set. Does not probe.
    pub fn set_proxies(&self, proxies: Vec<Arc<dyn Proxy>>) {
        self.proxies.store(Arc::new(proxies));
    }

    /// The set the next check will probe.
    pub fn proxies(&self) -> Arc<Vec<Arc<dyn Proxy>>> {
        self.proxies.load_full()
    }

    /// Probe every proxy in the current set concurrently.
    pub async fn check(&self) {
        let proxies = self.proxies.load_full();
        if proxies.is_empty() {
            return;
        }

        join_all(proxies.iter().map(|proxy| self.probe(proxy.as_ref()))).await;

        let alive = proxies.iter().filter(|p| p.health().is_alive()).count();
        tracing::debug!(
            provider = %self.provider,
            total = proxies.len(),
            alive,
            "Health check pass finished"
        );
    }

    async fn probe(&self, proxy: &dyn Proxy) {
        let health = proxy.health();

        match time::timeout(self.timeout, proxy.url_test(&self.url)).await {
            Ok(Ok(delay)) => {
                if health.mark_success(delay, self.healthy_threshold) {
                    tracing::info!(provider = %self.provider, proxy = %proxy.name(), "Proxy is healthy");
                }
            }
            Ok(Err(e)) => {
                if health.mark_failure(self.unhealthy_threshold) {
                    tracing::warn!(provider = %self.provider, proxy = %proxy.name(), error = %e, "Proxy marked unhealthy");
                } else {
                    tracing::debug!(provider = %self.provider, proxy = %proxy.name(), error = %e, "Probe failed");
                }
            }
            Err(_) => {
                if health.mark_failure(self.unhealthy_threshold) {
                    tracing::warn!(provider = %self.provider, proxy = %proxy.name(), "Proxy marked unhealthy: timeout");
                } else {
                    tracing::debug!(provider = %self.provider, proxy = %proxy.name(), "Probe timed out");
                }
            }
        }

        metrics::record_proxy_health(
            &self.provider,
            proxy.name(),
            health.is_alive(),
            health.delay().map(|d| d.as_millis() as u64),
        );
    }

    /// Stop the background loop. Safe to call any number of times.
    pub fn close(&self) {
        if self.stop.is_cancelled() {
            return;
        }
        self.stop.cancel();
        if let Some(task) = self.task.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
        tracing::debug!(provider = %self.provider, "Health check stopped");
    }
}

impl Drop for HealthCheck {
    fn drop(&mut self) {
        self.close();
    }
}

async fn process(health_check: Weak<HealthCheck>, stop: CancellationToken, interval: Duration) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; fresh lists are probed by their provider.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.cancelled() => break,
        }

        let Some(hc) = health_check.upgrade() else {
            break;
        };
        tokio::select! {
            _ = hc.check() => {}
            _ = stop.cancelled() => break,
        }
    }
}
