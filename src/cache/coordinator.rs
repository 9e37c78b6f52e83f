//! Cache coordinator: TTL'd storage plus single-flight population.

use super::backend::CacheBackend;
use super::key::CacheKey;
use crate::{Error, ErrorContext, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            // Extractions are expensive and brand identity changes rarely.
            default_ttl: Duration::from_secs(86_400),
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

type FlightOutput<T> = std::result::Result<T, Arc<Error>>;
type Flight<T> = Shared<BoxFuture<'static, FlightOutput<T>>>;

/// Coordinates the shared result store and the per-key in-flight computations.
///
/// The single-flight guarantee is the core correctness property here: under N
/// concurrent [`populate`](CacheCoordinator::populate) calls for one key, the
/// expensive computation runs exactly once and every caller observes the same
/// terminal result. The computation runs on a spawned task, so it completes
/// for the remaining waiters even if the originating caller disconnects.
pub struct CacheCoordinator<T> {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
    stats: AtomicStats,
    // Shared with every flight task: each flight unregisters itself when it
    // settles, so cleanup never depends on any caller still being around.
    inflight: Arc<Mutex<HashMap<String, Flight<T>>>>,
}

impl<T> CacheCoordinator<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self {
            backend,
            config,
            stats: AtomicStats::default(),
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Non-blocking lookup. Misses on expired entries, disabled cache, or an
    /// undecodable payload; never waits on an in-flight population.
    pub async fn lookup(&self, key: &CacheKey) -> Result<Option<T>> {
        if !self.config.enabled {
            return Ok(None);
        }
        match self.backend.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    Ok(Some(value))
                }
                Err(e) => {
                    // A payload we wrote but cannot read back is dropped, not fatal.
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(key = %key, error = %e, "discarding undecodable cache entry");
                    let _ = self.backend.delete(key).await;
                    Ok(None)
                }
            },
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Unconditional overwrite with an explicit TTL (default when `None`).
    pub async fn store(&self, key: &CacheKey, value: &T, ttl: Option<Duration>) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let bytes = serde_json::to_vec(value)?;
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        match self.backend.set(key, &bytes, ttl).await {
            Ok(()) => {
                self.stats.sets.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Run `compute` for `key` with the single-flight guarantee.
    ///
    /// If a computation for this key is already in flight, the caller joins it
    /// instead of re-invoking `compute`; all waiters receive the same success
    /// or the same classified failure. Successful payloads are stored with the
    /// configured TTL before waiters are released; a store failure degrades to
    /// a log line and the uncached value. Failures are never cached, so the
    /// next flight retries.
    pub async fn populate<F>(&self, key: &CacheKey, compute: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let flight = {
            let mut inflight = self
                .inflight
                .lock()
                .map_err(|_| poisoned("cache_coordinator"))?;
            if let Some(existing) = inflight.get(key.as_str()) {
                existing.clone()
            } else {
                let flight = self.spawn_flight(key.clone(), compute);
                inflight.insert(key.as_str().to_string(), flight.clone());
                flight
            }
        };

        flight.await.map_err(|shared| shared.clone_fault())
    }

    fn spawn_flight<F>(&self, key: CacheKey, compute: F) -> Flight<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let enabled = self.config.enabled;
        let ttl = self.config.default_ttl;
        let inflight = Arc::clone(&self.inflight);

        let task = tokio::spawn(async move {
            let result: FlightOutput<T> = async {
                // A previous flight may have stored a value between the
                // caller's lookup and this populate; re-check before paying
                // for compute.
                if enabled {
                    if let Ok(Some(bytes)) = backend.get(&key).await {
                        if let Ok(value) = serde_json::from_slice::<T>(&bytes) {
                            return Ok(value);
                        }
                    }
                }

                let value = compute.await.map_err(Arc::new)?;

                if enabled {
                    match serde_json::to_vec(&value) {
                        Ok(bytes) => {
                            if let Err(e) = backend.set(&key, &bytes, ttl).await {
                                tracing::warn!(key = %key, error = %e, "cache store failed; returning uncached result");
                            }
                        }
                        Err(e) => {
                            tracing::warn!(key = %key, error = %e, "payload not serializable; skipping cache store");
                        }
                    }
                }
                Ok(value)
            }
            .await;

            // Unregister on settlement. The single-flight window is exactly
            // the computation's lifetime: a settled failure must not keep
            // absorbing later callers, and the originator may be long gone.
            if let Ok(mut inflight) = inflight.lock() {
                inflight.remove(key.as_str());
            }
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                // The flight task only aborts on panic or runtime shutdown.
                Err(e) => Err(Arc::new(Error::server(
                    format!("extraction flight aborted: {}", e),
                    ErrorContext::new().with_source("cache_coordinator"),
                ))),
            }
        }
        .boxed()
        .shared()
    }

    /// Administrative single-key invalidation.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<bool> {
        match self.backend.delete(key).await {
            Ok(deleted) => {
                if deleted {
                    self.stats.deletes.fetch_add(1, Ordering::Relaxed);
                }
                Ok(deleted)
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Administrative clear-all; authorization is the caller's concern.
    pub async fn clear_all(&self) -> Result<usize> {
        let dropped = self.backend.clear().await?;
        self.stats
            .deletes
            .fetch_add(dropped as u64, Ordering::Relaxed);
        Ok(dropped)
    }

    /// Cheap liveness probe for the health monitor.
    pub async fn ping(&self) -> Result<usize> {
        self.backend.len().await
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn default_ttl(&self) -> Duration {
        self.config.default_ttl
    }
}

fn poisoned(source: &str) -> Error {
    Error::server(
        "in-flight registry lock poisoned",
        ErrorContext::new().with_source(source.to_string()),
    )
}
