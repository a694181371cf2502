//! Generic refresh engine for provider payloads.
//!
//! # Data Flow
//! ```text
//! initial():
//!     local file at vehicle.path() (source file or cache)
//!         → parse OK   → accept
//!         → missing/bad → vehicle.read() → parse → write cache (remote only) → accept
//!     → start pull loop when interval > 0
//!
//! update() / pull loop tick:
//!     vehicle.read() → sha256
//!         → same digest  → (previous value, same = true), no callback
//!         → new digest   → parse → write cache → accept → (value, same = false)
//!
//! accept: last_hash + value stored, on_update(value) invoked
//! ```
//!
//! # Design Decisions
//! - One async update lock per fetcher, held from read to callback: a fetch
//!   that started earlier can never overwrite the result of a later one
//! - The callback runs under the state lock that `destroy()` also takes, so
//!   once `destroy()` returns no callback can start
//! - Loop failures are logged and retried with backoff; they never escape

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::observability::metrics::{self, UpdateOutcome};
use crate::resilience::backoff::calculate_backoff;
use crate::vehicle::{write_cache, Vehicle, VehicleType};

/// Turns raw payload bytes into a typed value.
pub type Parser<T> = Arc<dyn Fn(&[u8]) -> Result<T> + Send + Sync>;

/// Receives every newly accepted value. Must not call back into the fetcher.
pub type OnUpdate<T> = Arc<dyn Fn(T) + Send + Sync>;

/// First retry delay after a failed background refresh.
const RETRY_BASE: Duration = Duration::from_secs(30);

/// Refreshable resource: a vehicle, a parser, a change callback and an interval.
pub struct Fetcher<T> {
    inner: Arc<Inner<T>>,
    stop: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Inner<T> {
    name: String,
    interval: Duration,
    vehicle: Arc<dyn Vehicle>,
    parser: Parser<T>,
    on_update: OnUpdate<T>,
    update_lock: tokio::sync::Mutex<()>,
    state: Mutex<State<T>>,
}

struct State<T> {
    hash: Option<[u8; 32]>,
    value: Option<T>,
    updated_at: Option<DateTime<Utc>>,
    destroyed: bool,
}

impl<T> Fetcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a fetcher. Nothing is read and no task runs until `initial()`.
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        vehicle: Arc<dyn Vehicle>,
        parser: Parser<T>,
        on_update: OnUpdate<T>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                interval,
                vehicle,
                parser,
                on_update,
                update_lock: tokio::sync::Mutex::new(()),
                state: Mutex::new(State {
                    hash: None,
                    value: None,
                    updated_at: None,
                    destroyed: false,
                }),
            }),
            stop: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// First load: prefer the local copy, fall back to the vehicle.
    pub async fn initial(&self) -> Result<T> {
        let inner = &self.inner;
        let guard = inner.update_lock.lock().await;
        let path = inner.vehicle.path();

        let mut cached_at = None;
        let (buf, value) = match read_local(path).await {
            Some((buf, modified)) => match (inner.parser)(&buf) {
                Ok(value) => {
                    cached_at = Some(modified);
                    (buf, value)
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %inner.name,
                        path = %path.display(),
                        error = %e,
                        "Local copy unusable, fetching from source"
                    );
                    inner.fetch_and_parse().await?
                }
            },
            None => inner.fetch_and_parse().await?,
        };

        if cached_at.is_none() {
            inner.persist(&buf).await;
        }

        let accepted = inner.accept(digest(&buf), value.clone(), cached_at.unwrap_or_else(Utc::now));
        drop(guard);

        tracing::info!(
            provider = %inner.name,
            vehicle = %inner.vehicle.kind(),
            from_local = cached_at.is_some(),
            "Provider loaded"
        );

        if accepted && !inner.interval.is_zero() {
            let first_delay = match cached_at {
                Some(modified) => {
                    let age = (Utc::now() - modified).to_std().unwrap_or(Duration::ZERO);
                    inner.interval.saturating_sub(age)
                }
                None => inner.interval,
            };
            self.start_loop(first_delay);
        }

        Ok(value)
    }

    /// Force a fetch. Returns the current value and whether it was unchanged.
    pub async fn update(&self) -> Result<(T, bool)> {
        self.inner.update().await
    }

    fn start_loop(&self, first_delay: Duration) {
        let mut slot = lock(&self.task);
        if slot.is_some() || self.stop.is_cancelled() {
            return;
        }

        let inner = self.inner.clone();
        let stop = self.stop.clone();
        *slot = Some(tokio::spawn(pull_loop(inner, stop, first_delay)));
    }
}

impl<T> Fetcher<T> {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn vehicle(&self) -> &Arc<dyn Vehicle> {
        &self.inner.vehicle
    }

    pub fn vehicle_type(&self) -> VehicleType {
        self.inner.vehicle.kind()
    }

    /// When the payload was last fetched or confirmed unchanged.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        lock(&self.inner.state).updated_at
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.inner.state).destroyed
    }

    /// Stop the background loop. Safe to call any number of times.
    pub fn destroy(&self) {
        {
            let mut state = lock(&self.inner.state);
            if state.destroyed {
                return;
            }
            state.destroyed = true;
        }

        self.stop.cancel();
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        tracing::debug!(provider = %self.inner.name, "Fetcher stopped");
    }
}

impl<T> Drop for Fetcher<T> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<T> Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn update(&self) -> Result<(T, bool)> {
        let _guard = self.update_lock.lock().await;

        let buf = match self.vehicle.read().await {
            Ok(buf) => buf,
            Err(e) => {
                metrics::record_provider_update(&self.name, UpdateOutcome::Failed);
                return Err(e);
            }
        };
        let hash = digest(&buf);

        {
            let mut state = lock(&self.state);
            if state.hash == Some(hash) {
                if let Some(value) = state.value.clone() {
                    state.updated_at = Some(Utc::now());
                    metrics::record_provider_update(&self.name, UpdateOutcome::Unchanged);
                    return Ok((value, true));
                }
            }
        }

        let value = match (self.parser)(&buf) {
            Ok(value) => value,
            Err(e) => {
                metrics::record_provider_update(&self.name, UpdateOutcome::Failed);
                return Err(e);
            }
        };

        self.persist(&buf).await;
        if self.accept(hash, value.clone(), Utc::now()) {
            metrics::record_provider_update(&self.name, UpdateOutcome::Changed);
        }
        Ok((value, false))
    }

    async fn fetch_and_parse(&self) -> Result<(Vec<u8>, T)> {
        let buf = self.vehicle.read().await?;
        let value = (self.parser)(&buf)?;
        Ok((buf, value))
    }

    /// Keep a copy of remote payloads for the next cold start.
    async fn persist(&self, buf: &[u8]) {
        if self.vehicle.kind() == VehicleType::File {
            return;
        }
        let path = self.vehicle.path();
        if let Err(e) = write_cache(path, buf).await {
            tracing::warn!(
                provider = %self.name,
                path = %path.display(),
                error = %e,
                "Failed to write provider cache"
            );
        }
    }

    /// Record a new payload and notify the owner. Returns false once destroyed.
    fn accept(&self, hash: [u8; 32], value: T, updated_at: DateTime<Utc>) -> bool {
        let mut state = lock(&self.state);
        if state.destroyed {
            tracing::debug!(provider = %self.name, "Dropping payload fetched after teardown");
            return false;
        }

        state.hash = Some(hash);
        state.value = Some(value.clone());
        state.updated_at = Some(updated_at);
        (self.on_update)(value);
        true
    }
}

async fn pull_loop<T>(inner: Arc<Inner<T>>, stop: CancellationToken, first_delay: Duration)
where
    T: Clone + Send + Sync + 'static,
{
    let mut delay = first_delay;
    let mut failures: u32 = 0;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let result = tokio::select! {
            _ = stop.cancelled() => break,
            result = inner.update() => result,
        };

        match result {
            Ok((_, same)) => {
                failures = 0;
                delay = inner.interval;
                tracing::debug!(provider = %inner.name, same, "Provider refreshed");
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                delay = calculate_backoff(failures, RETRY_BASE, inner.interval);
                tracing::warn!(
                    provider = %inner.name,
                    error = %e,
                    attempt = failures,
                    retry_in_secs = delay.as_secs(),
                    "Provider refresh failed, keeping last snapshot"
                );
            }
        }
    }

    tracing::debug!(provider = %inner.name, "Pull loop exited");
}

async fn read_local(path: &Path) -> Option<(Vec<u8>, DateTime<Utc>)> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    if !meta.is_file() {
        return None;
    }
    let buf = tokio::fs::read(path).await.ok()?;
    let modified = meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
    Some((buf, modified))
}

fn digest(buf: &[u8]) -> [u8; 32] {
    Sha256::digest(buf).into()
}

fn lock<S>(mutex: &Mutex<S>) -> MutexGuard<'_, S> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
