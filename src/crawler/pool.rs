//! Fetch pool: bounded concurrency plus per-host politeness
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore (excess fetches queue)
//! - Per-host dispatch spacing (the politeness delay)
//! - Integrating robots.txt crawl delays

use super::fetcher::{FetchError, FetchResponse, PageFetcher};
use crate::url::netloc;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use url::Url;

/// Upper bound applied to robots.txt `Crawl-delay` values
pub const MAX_ROBOTS_DELAY: Duration = Duration::from_secs(10);

/// Calculates the effective delay for a host
///
/// This takes the maximum of the configured delay and the robots.txt crawl
/// delay (if specified), with the robots value capped at [`MAX_ROBOTS_DELAY`].
pub fn effective_delay(config_delay: Duration, robots_delay_secs: Option<f64>) -> Duration {
    let robots_delay = robots_delay_secs
        .filter(|s| s.is_finite() && *s > 0.0)
        .map(Duration::from_secs_f64)
        .map(|d| d.min(MAX_ROBOTS_DELAY))
        .unwrap_or(Duration::ZERO);

    config_delay.max(robots_delay)
}

/// Dispatch bookkeeping for one host
#[derive(Debug, Clone)]
struct HostState {
    delay: Duration,
    /// Earliest instant the next request may be dispatched
    next_slot: Option<Instant>,
    request_count: u32,
}

/// Spaces request dispatches to the same host
///
/// Each caller reserves the next free slot under the lock and then sleeps
/// until it, so concurrent callers for one host are serialized in arrival
/// order without holding the lock across the wait.
#[derive(Debug)]
pub struct HostPacer {
    default_delay: Duration,
    hosts: Mutex<HashMap<String, HostState>>,
}

impl HostPacer {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Overrides the delay for one host (e.g. from robots.txt)
    pub fn set_delay(&self, host: &str, delay: Duration) {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts
            .entry(host.to_string())
            .or_insert_with(|| HostState {
                delay,
                next_slot: None,
                request_count: 0,
            })
            .delay = delay;
    }

    pub fn delay_for(&self, host: &str) -> Duration {
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts
            .get(host)
            .map(|s| s.delay)
            .unwrap_or(self.default_delay)
    }

    /// Number of dispatches recorded for a host
    pub fn request_count(&self, host: &str) -> u32 {
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts.get(host).map(|s| s.request_count).unwrap_or(0)
    }

    /// Reserves the next dispatch slot for `host` and returns when it arrives
    pub async fn wait_turn(&self, host: &str) {
        let now = Instant::now();
        let slot = {
            let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
            let state = hosts.entry(host.to_string()).or_insert_with(|| HostState {
                delay: self.default_delay,
                next_slot: None,
                request_count: 0,
            });

            let slot = state.next_slot.map_or(now, |next| next.max(now));
            state.next_slot = Some(slot + state.delay);
            state.request_count += 1;
            slot
        };

        if slot > now {
            tracing::trace!("Pacing {}: waiting {:?}", host, slot - now);
            tokio::time::sleep_until(slot).await;
        }
    }
}

/// Bounded-concurrency front end over a [`PageFetcher`]
///
/// The pool coordinates:
/// - Global concurrency limits (max fetches in flight)
/// - Per-host dispatch spacing
#[derive(Clone)]
pub struct FetchPool {
    fetcher: Arc<dyn PageFetcher>,
    permits: Arc<Semaphore>,
    pacer: Arc<HostPacer>,
}

impl FetchPool {
    /// Creates a new pool
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Transport used for every request
    /// * `max_concurrent` - Fetches allowed in flight at once (at least 1)
    /// * `delay` - Default spacing between dispatches to the same host
    pub fn new(fetcher: Arc<dyn PageFetcher>, max_concurrent: usize, delay: Duration) -> Self {
        Self {
            fetcher,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            pacer: Arc::new(HostPacer::new(delay)),
        }
    }

    pub fn pacer(&self) -> &HostPacer {
        &self.pacer
    }

    /// Fetches one URL once a host slot and a concurrency permit are free
    ///
    /// Never raises: failures come back as [`FetchError`] values.
    pub async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        self.pacer.wait_turn(&netloc(url)).await;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::Other("fetch pool closed".to_string()))?;

        tracing::debug!("Fetching {}", url);
        self.fetcher.fetch(url).await
    }

    /// Fetches many URLs concurrently under the pool's limit
    ///
    /// Results are returned in input order.
    pub async fn fetch_many(&self, urls: &[Url]) -> Vec<Result<FetchResponse, FetchError>> {
        join_all(urls.iter().map(|url| self.fetch(url))).await
    }

    /// Number of permits currently free
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}
