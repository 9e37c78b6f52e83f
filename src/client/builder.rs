//! Builder for the extractor client.

use super::auth::{AdminAuth, DisabledAdmin, SharedSecret};
use super::core::ExtractorClient;
use crate::cache::{CacheBackend, CacheConfig, CacheCoordinator, MemoryCache};
use crate::health::{HealthConfig, HealthMonitor, ReachabilityProbe};
use crate::resilience::circuit_breaker::{BreakerConfig, BreakerRegistry};
use crate::resilience::rate_limiter::{
    CounterStore, MemoryCounterStore, RateLimitConfig, RateLimiter,
};
use crate::worker::{BasicAnalyzer, BrandAnalyzer, ExtractionWorker, HttpWorker};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Capacity of the default in-memory cache backend.
const DEFAULT_CACHE_ENTRIES: usize = 10_000;

/// Builds an [`ExtractorClient`] from explicit collaborators, with in-memory
/// defaults for everything left unset.
///
/// Environment overrides are applied at [`build`](ExtractorBuilder::build)
/// time, only for the knobs the caller did not set explicitly:
///
/// | Variable | Overrides |
/// |----------|-----------|
/// | `BRANDLENS_RATE_LIMIT` | requests per window |
/// | `BRANDLENS_RATE_WINDOW_SECS` | rate window length |
/// | `BRANDLENS_BREAKER_FAILURE_THRESHOLD` | consecutive failures before open |
/// | `BRANDLENS_BREAKER_RESET_SECS` | open-to-half-open delay |
/// | `BRANDLENS_CACHE_TTL_SECS` | default cache TTL |
/// | `BRANDLENS_ADMIN_TOKEN` | shared admin secret |
#[derive(Default)]
pub struct ExtractorBuilder {
    worker: Option<Arc<dyn ExtractionWorker>>,
    analyzer: Option<Arc<dyn BrandAnalyzer>>,
    cache_backend: Option<Arc<dyn CacheBackend>>,
    counter_store: Option<Arc<dyn CounterStore>>,
    cache_config: Option<CacheConfig>,
    rate_limit_config: Option<RateLimitConfig>,
    breaker_config: Option<BreakerConfig>,
    health_config: Option<HealthConfig>,
    admin: Option<Arc<dyn AdminAuth>>,
    probe: Option<Arc<dyn ReachabilityProbe>>,
    expose_internals: bool,
}

impl ExtractorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker(mut self, worker: Arc<dyn ExtractionWorker>) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn BrandAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn with_cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    pub fn with_counter_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.counter_store = Some(store);
        self
    }

    pub fn with_cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = Some(config);
        self
    }

    pub fn with_rate_limit_config(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit_config = Some(config);
        self
    }

    pub fn with_breaker_config(mut self, config: BreakerConfig) -> Self {
        self.breaker_config = Some(config);
        self
    }

    pub fn with_health_config(mut self, config: HealthConfig) -> Self {
        self.health_config = Some(config);
        self
    }

    /// Enable the admin surface with a shared secret.
    pub fn with_admin_secret(mut self, secret: impl Into<String>) -> Self {
        self.admin = Some(Arc::new(SharedSecret::new(secret)));
        self
    }

    pub fn with_admin_auth(mut self, admin: Arc<dyn AdminAuth>) -> Self {
        self.admin = Some(admin);
        self
    }

    /// Probe used by the health monitor to verify the extraction target is
    /// reachable. Reachability checking is opt-in; without a probe the health
    /// report simply omits the worker component.
    pub fn with_probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Include stack summaries and fault names in error envelopes. Off by
    /// default; enable only behind operator auth.
    pub fn expose_internals(mut self, expose: bool) -> Self {
        self.expose_internals = expose;
        self
    }

    /// Assemble the client. Fails only when a default collaborator cannot be
    /// constructed (e.g. the reqwest client for the default worker).
    pub fn build(self) -> Result<ExtractorClient> {
        // Explicit builder settings win; the environment fills in the rest.
        let rate_cfg = self.rate_limit_config.unwrap_or_else(|| {
            let mut cfg = RateLimitConfig::new();
            if let Some(limit) = env_u64("BRANDLENS_RATE_LIMIT") {
                cfg = cfg.with_limit(limit as u32);
            }
            if let Some(secs) = env_u64("BRANDLENS_RATE_WINDOW_SECS") {
                cfg = cfg.with_window(Duration::from_secs(secs));
            }
            cfg
        });

        let breaker_cfg = self.breaker_config.unwrap_or_else(|| {
            let mut cfg = BreakerConfig::new();
            if let Some(threshold) = env_u64("BRANDLENS_BREAKER_FAILURE_THRESHOLD") {
                cfg = cfg.with_failure_threshold(threshold as u32);
            }
            if let Some(secs) = env_u64("BRANDLENS_BREAKER_RESET_SECS") {
                cfg = cfg.with_reset_timeout(Duration::from_secs(secs));
            }
            cfg
        });

        let cache_cfg = self.cache_config.unwrap_or_else(|| {
            let mut cfg = CacheConfig::new();
            if let Some(secs) = env_u64("BRANDLENS_CACHE_TTL_SECS") {
                cfg = cfg.with_ttl(Duration::from_secs(secs));
            }
            cfg
        });

        let admin = match self.admin {
            Some(admin) => admin,
            None => match std::env::var("BRANDLENS_ADMIN_TOKEN") {
                Ok(token) if !token.is_empty() => {
                    Arc::new(SharedSecret::new(token)) as Arc<dyn AdminAuth>
                }
                _ => Arc::new(DisabledAdmin),
            },
        };

        let backend = self
            .cache_backend
            .unwrap_or_else(|| Arc::new(MemoryCache::new(DEFAULT_CACHE_ENTRIES)));
        let store = self
            .counter_store
            .unwrap_or_else(|| Arc::new(MemoryCounterStore::new()));
        let worker = match self.worker {
            Some(worker) => worker,
            None => Arc::new(HttpWorker::new(Default::default())?),
        };
        let analyzer = self
            .analyzer
            .unwrap_or_else(|| Arc::new(BasicAnalyzer::new()));

        Ok(ExtractorClient {
            cache: Arc::new(CacheCoordinator::new(backend, cache_cfg)),
            limiter: RateLimiter::new(store, rate_cfg),
            breakers: BreakerRegistry::new(breaker_cfg),
            worker,
            analyzer,
            admin,
            probe: self.probe,
            monitor: HealthMonitor::new(self.health_config.unwrap_or_default()),
            expose_internals: self.expose_internals,
        })
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_defaults() {
        let client = ExtractorBuilder::new().build().unwrap();
        assert_eq!(client.limiter.store_name(), "memory");
        assert_eq!(client.cache.backend_name(), "memory");
    }

    #[test]
    fn explicit_config_is_kept() {
        let client = ExtractorBuilder::new()
            .with_rate_limit_config(RateLimitConfig::new().with_limit(5))
            .build()
            .unwrap();
        assert_eq!(client.limiter.limit(), 5);
    }
}
