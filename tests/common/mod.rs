//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rulegate::proxy::{Proxy, ProxyHealth, ProxyMapping, ProxyParser};
use rulegate::vehicle::{Vehicle, VehicleType};
use rulegate::{Error, Result};

/// Programmable remote source: swappable payload, latency and failure.
#[derive(Debug)]
pub struct MockVehicle {
    path: PathBuf,
    payload: Mutex<Vec<u8>>,
    delay: Mutex<Duration>,
    fail: AtomicBool,
    reads: AtomicUsize,
}

impl MockVehicle {
    /// `path` is where the fetcher keeps its cache copy.
    pub fn new(path: impl AsRef<Path>, payload: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            path: path.as_ref().to_path_buf(),
            payload: Mutex::new(payload.to_vec()),
            delay: Mutex::new(Duration::ZERO),
            fail: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        })
    }

    pub fn set_payload(&self, payload: &[u8]) {
        *self.payload.lock().unwrap() = payload.to_vec();
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Completed reads, successful or not.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Vehicle for MockVehicle {
    fn kind(&self) -> VehicleType {
        VehicleType::Http
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<u8>> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.reads.fetch_add(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Fetch("mock vehicle offline".into()));
        }
        Ok(self.payload.lock().unwrap().clone())
    }
}

/// Proxy whose probe sleeps for `delay` and then succeeds or fails.
#[derive(Debug)]
pub struct MockProxy {
    name: String,
    delay: Duration,
    fail: bool,
    health: ProxyHealth,
    probes: AtomicUsize,
}

impl MockProxy {
    pub fn ok(name: &str, delay: Duration) -> Arc<Self> {
        Self::build(name, delay, false)
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Self::build(name, Duration::ZERO, true)
    }

    fn build(name: &str, delay: Duration, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            delay,
            fail,
            health: ProxyHealth::default(),
            probes: AtomicUsize::new(0),
        })
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Proxy for MockProxy {
    fn name(&self) -> &str {
        &self.name
    }

    fn proxy_type(&self) -> &str {
        "mock"
    }

    fn health(&self) -> &ProxyHealth {
        &self.health
    }

    async fn url_test(&self, _url: &str) -> io::Result<Duration> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "mock refused"));
        }
        Ok(self.delay)
    }
}

/// Builds a healthy [`MockProxy`] per mapping and remembers every one it built.
#[derive(Debug, Default)]
pub struct MockProxyParser {
    built: Mutex<Vec<Arc<MockProxy>>>,
}

impl MockProxyParser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// URL tests run across every proxy built so far.
    pub fn url_tests(&self) -> usize {
        self.built.lock().unwrap().iter().map(|p| p.probes()).sum()
    }
}

impl ProxyParser for MockProxyParser {
    fn parse_proxy(&self, index: usize, mapping: &ProxyMapping) -> Result<Arc<dyn Proxy>> {
        let name = mapping
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Parse {
                location: format!("proxy {index}"),
                reason: "missing name".into(),
            })?;
        let proxy = MockProxy::ok(name, Duration::ZERO);
        self.built.lock().unwrap().push(proxy.clone());
        Ok(proxy)
    }
}

/// Poll `cond` every 10ms until it holds or `timeout` passes.
pub async fn wait_for<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
