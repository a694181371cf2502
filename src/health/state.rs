//! Proxy health state machine.
//!
//! # States
//! - Unknown: never probed, still eligible for traffic
//! - Healthy: last probes succeeded
//! - Unhealthy: probes failing
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unhealthy → Healthy: consecutive successes >= healthy_threshold
//! ```

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Health state of a proxy.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

/// Delay recorded for a failed probe.
pub const DELAY_UNREACHABLE: u64 = u64::MAX;

/// Probe results for one proxy. Updated lock-free by concurrent checks.
#[derive(Debug)]
pub struct ProxyHealth {
    state: AtomicU8,
    delay_ms: AtomicU64,
    consecutive_failures: AtomicUsize,
    consecutive_successes: AtomicUsize,
}

impl Default for ProxyHealth {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(HealthState::Unknown as u8),
            delay_ms: AtomicU64::new(DELAY_UNREACHABLE),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
        }
    }
}

impl ProxyHealth {
    pub fn state(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Relaxed))
    }

    /// Healthy or not yet probed.
    pub fn is_alive(&self) -> bool {
        self.state() != HealthState::Unhealthy
    }

    /// Last measured latency; `None` when the last probe failed or none ran.
    pub fn delay(&self) -> Option<Duration> {
        match self.delay_ms.load(Ordering::Relaxed) {
            DELAY_UNREACHABLE => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Record a successful probe. Returns true when the state flipped to Healthy.
    pub fn mark_success(&self, delay: Duration, healthy_threshold: usize) -> bool {
        let ms = delay.as_millis().min(u128::from(DELAY_UNREACHABLE - 1)) as u64;
        self.delay_ms.store(ms, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.state() == HealthState::Healthy {
            return false;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold.max(1) {
            self.state.store(HealthState::Healthy as u8, Ordering::Relaxed);
            self.consecutive_successes.store(0, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Record a failed probe. Returns true when the state flipped to Unhealthy.
    pub fn mark_failure(&self, unhealthy_threshold: usize) -> bool {
        self.delay_ms.store(DELAY_UNREACHABLE, Ordering::Relaxed);
        self.consecutive_successes.store(0, Ordering::Relaxed);

        if self.state() == HealthState::Unhealthy {
            return false;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold.max(1) {
            self.state.store(HealthState::Unhealthy as u8, Ordering::Relaxed);
            self.consecutive_failures.store(0, Ordering::Relaxed);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_starts_unknown_and_alive() {
        let health = ProxyHealth::default();
        assert_eq!(health.state(), HealthState::Unknown);
        assert!(health.is_alive());
        assert_eq!(health.delay(), None);
    }

    #[test]
    fn test_health_thresholds() {
        let health = ProxyHealth::default();

        assert!(!health.mark_failure(2));
        assert_eq!(health.state(), HealthState::Unknown);
        assert!(health.mark_failure(2));
        assert_eq!(health.state(), HealthState::Unhealthy);
        assert!(!health.is_alive());

        assert!(!health.mark_success(Duration::from_millis(40), 2));
        assert_eq!(health.delay(), Some(Duration::from_millis(40)));
        assert!(health.mark_success(Duration::from_millis(35), 2));
        assert_eq!(health.state(), HealthState::Healthy);
    }

    #[test]
    fn test_failure_resets_delay() {
        let health = ProxyHealth::default();
        health.mark_success(Duration::from_millis(12), 1);
        assert_eq!(health.delay(), Some(Duration::from_millis(12)));

        health.mark_failure(1);
        assert_eq!(health.delay(), None);
        assert_eq!(health.state(), HealthState::Unhealthy);
    }
}
