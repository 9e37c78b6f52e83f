//! Fixed-window, per-client rate limiting over a shared counter store.

use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Admission decision with the quota metadata the API layer turns into
/// `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix timestamp (seconds) when the current window ends.
    pub reset_at: u64,
}

/// What to do when the counter store is unreachable.
///
/// Default is fail-closed: unmetered admission risks cascading overload of the
/// breaker and the external worker behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    FailClosed,
    FailOpen,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum admissions per client per window.
    pub limit: u32,
    pub window: Duration,
    pub failure_mode: FailureMode,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            // 60 requests per hour per client.
            limit: 60,
            window: Duration::from_secs(3600),
            failure_mode: FailureMode::FailClosed,
        }
    }
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window.max(Duration::from_secs(1));
        self
    }

    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }
}

/// Shared counter store: the atomic-increment primitive is what makes
/// concurrent admissions for one client linearizable, and what breaks ties
/// among simultaneous requests.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment `key` and return the new count. `ttl` bounds the
    /// counter's lifetime so finished windows can be reclaimed.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64>;

    /// Cheap liveness probe for the health monitor.
    async fn ping(&self) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// In-process counter store. One mutex spans load-and-increment, which is the
/// linearizability requirement; the map is pruned opportunistically.
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, (u64, u64)>>, // key -> (expires_at, count)
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64> {
        let now = unix_now();
        let mut counters = self.counters.lock().map_err(|_| {
            Error::store(
                "counter store lock poisoned",
                ErrorContext::new().with_source("counter_store"),
            )
        })?;
        counters.retain(|_, (expires_at, _)| *expires_at > now);

        let entry = counters
            .entry(key.to_string())
            .or_insert((now + ttl.as_secs().max(1), 0));
        entry.1 += 1;
        Ok(entry.1)
    }

    async fn ping(&self) -> Result<()> {
        self.counters.lock().map(|_| ()).map_err(|_| {
            Error::store(
                "counter store lock poisoned",
                ErrorContext::new().with_source("counter_store"),
            )
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Per-client request gate using a fixed time window.
///
/// The current window is `floor(now / window)`; rollover is monotonic because
/// it derives from the wall clock, never from per-client state.
pub struct RateLimiter {
    store: std::sync::Arc<dyn CounterStore>,
    cfg: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: std::sync::Arc<dyn CounterStore>, cfg: RateLimitConfig) -> Self {
        Self { store, cfg }
    }

    /// Admit or reject one request from `client_id`.
    ///
    /// The increment that pushes the count from `limit` to `limit + 1` is the
    /// first rejected request of the window. On store failure the configured
    /// [`FailureMode`] applies; fail-open still reports honest quota metadata.
    pub async fn admit(&self, client_id: &str) -> Result<RateDecision> {
        let now = unix_now();
        let window_secs = self.cfg.window.as_secs().max(1);
        let window_index = now / window_secs;
        let reset_at = (window_index + 1) * window_secs;
        let key = format!("rate:{}:{}", client_id, window_index);

        match self.store.increment(&key, self.cfg.window).await {
            Ok(count) => {
                let allowed = count <= self.cfg.limit as u64;
                let remaining = (self.cfg.limit as u64).saturating_sub(count) as u32;
                Ok(RateDecision {
                    allowed,
                    limit: self.cfg.limit,
                    remaining,
                    reset_at,
                })
            }
            Err(e) => match self.cfg.failure_mode {
                FailureMode::FailOpen => {
                    tracing::warn!(client_id, error = %e, "counter store unavailable; admitting unmetered");
                    Ok(RateDecision {
                        allowed: true,
                        limit: self.cfg.limit,
                        remaining: 0,
                        reset_at,
                    })
                }
                FailureMode::FailClosed => Err(Error::server(
                    format!("rate limit store unavailable: {}", e),
                    ErrorContext::new().with_source("rate_limiter"),
                )),
            },
        }
    }

    pub fn limit(&self) -> u32 {
        self.cfg.limit
    }

    pub fn window(&self) -> Duration {
        self.cfg.window
    }

    /// Store probe for the health monitor.
    pub async fn ping_store(&self) -> Result<()> {
        self.store.ping().await
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
