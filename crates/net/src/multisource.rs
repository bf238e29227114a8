//! Mirror fallback with per-host back-off.
//!
//! Every host gets a tally of successes and failures. A failure that follows a
//! success (or is the first one ever) is only counted; consecutive failures
//! ban the host for `failures - successes - 1` seconds, capped at an hour.
//! Failures while the device is offline say nothing about the host and are
//! neither counted nor retried elsewhere.

use crate::error::{ErrorKind, Result};
use crate::provider::{HttpProvider, ProviderHandle};
use exn::ResultExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, instrument};
use url::Url;

const MAX_BAN_SECONDS: u64 = 3600;

/// Monotonic milliseconds, injectable for tests.
pub trait TimeSource: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Milliseconds since the clock was created.
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self { start: Instant::now() }
    }
}

impl TimeSource for SystemClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Clock that only moves when told to.
#[derive(Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) -> u64 {
        self.0.fetch_add(millis, Ordering::SeqCst) + millis
    }
}

impl TimeSource for ManualClock {
    fn now_millis(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct HostStats {
    successes: u64,
    failures: u64,
    last_failed: bool,
    disabled_till: u64,
}

impl HostStats {
    fn on_success(&mut self) {
        self.successes += 1;
        self.last_failed = false;
    }

    /// Returns the ban length in seconds, if any.
    fn on_failure(&mut self, now: u64) -> Option<u64> {
        self.failures += 1;
        let repeated = std::mem::replace(&mut self.last_failed, true);
        if !repeated {
            return None;
        }
        let seconds = self
            .failures
            .saturating_sub(self.successes)
            .saturating_sub(1)
            .min(MAX_BAN_SECONDS);
        if seconds == 0 {
            return None;
        }
        self.disabled_till = now + seconds * 1000;
        Some(seconds)
    }
}

/// Tries mirrors in order, skipping hosts that are serving a ban.
pub struct MultisourceProvider {
    delegate: ProviderHandle,
    clock: Arc<dyn TimeSource>,
    hosts: Mutex<HashMap<String, HostStats>>,
}

impl MultisourceProvider {
    pub fn new(delegate: ProviderHandle) -> Self {
        Self::with_clock(delegate, Arc::new(SystemClock::default()))
    }

    pub fn with_clock(delegate: ProviderHandle, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            delegate,
            clock,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    pub fn delegate(&self) -> &ProviderHandle {
        &self.delegate
    }

    /// `true` if `host` is banned at time `at` (milliseconds on the provider's clock).
    pub fn is_host_disabled_for(&self, host: &str, at: u64) -> bool {
        self.with_hosts(|hosts| hosts.get(host).is_some_and(|stats| at < stats.disabled_till))
    }

    /// Fetch the first of `uris` that succeeds.
    ///
    /// Host-independent failures ([`ErrorKind::is_host_independent`]) abort the
    /// whole attempt. If every host is banned the first one is tried anyway.
    #[instrument(level = "debug", skip_all, fields(sources = uris.len()))]
    pub async fn fetch_any(&self, uris: &[Url]) -> Result<Vec<u8>> {
        let Some(first) = uris.first() else {
            exn::bail!(ErrorKind::NoSources);
        };
        let now = self.clock.now_millis();
        let mut last_error = None;
        for uri in uris {
            let host = host_of(uri);
            if self.is_host_disabled_for(&host, now) {
                debug!(host = %host, "Skipping banned host");
                continue;
            }
            match self.attempt(uri, &host, now).await {
                Ok(data) => return Ok(data),
                Err(err) if err.is_host_independent() => return Err(err),
                Err(err) => last_error = Some(err),
            }
        }
        match last_error {
            Some(err) => Err(err),
            None => {
                debug!(uri = %first, "Every host is banned, trying the first one");
                self.attempt(first, &host_of(first), now).await
            },
        }
    }

    async fn attempt(&self, uri: &Url, host: &str, now: u64) -> Result<Vec<u8>> {
        match self.delegate.fetch(uri).await {
            Ok(data) => {
                self.with_hosts(|hosts| hosts.entry(host.to_string()).or_default().on_success());
                Ok(data)
            },
            Err(err) if err.is_host_independent() => Err(err),
            Err(err) if !self.delegate.has_connection().await => Err(err).or_raise(|| ErrorKind::NoConnectivity),
            Err(err) => {
                let banned = self.with_hosts(|hosts| hosts.entry(host.to_string()).or_default().on_failure(now));
                if let Some(seconds) = banned {
                    info!(host = %host, seconds, "Host temporarily disabled");
                }
                Err(err)
            },
        }
    }

    fn with_hosts<T>(&self, f: impl FnOnce(&mut HashMap<String, HostStats>) -> T) -> T {
        let mut hosts = self.hosts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut hosts)
    }
}

#[async_trait::async_trait]
impl HttpProvider for MultisourceProvider {
    async fn fetch(&self, uri: &Url) -> Result<Vec<u8>> {
        self.fetch_any(std::slice::from_ref(uri)).await
    }

    async fn has_connection(&self) -> bool {
        self.delegate.has_connection().await
    }
}

fn host_of(uri: &Url) -> String {
    uri.host_str().unwrap_or_default().to_string()
}
