//! The extractor client: composition root for the whole pipeline.

use super::auth::AdminAuth;
use super::envelope::{
    CacheClearReceipt, CacheOutcome, ExtractionResponse, RateLimitMeta, ResponseMeta,
};
use crate::cache::{normalize, CacheCoordinator, CacheKey, CacheStats};
use crate::classify::{classify, ErrorRecord};
use crate::health::{HealthMonitor, ReachabilityProbe, SystemHealth};
use crate::resilience::circuit_breaker::{BreakerRegistry, BreakerSnapshot};
use crate::resilience::rate_limiter::RateLimiter;
use crate::worker::{BrandAnalyzer, BrandProfile, ExtractionWorker};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Fronts the expensive extraction with the full resilience pipeline:
/// rate-limit check, cache lookup, breaker-guarded fetch + analyze,
/// classification, cache population, envelope.
///
/// [`extract`](ExtractorClient::extract) always resolves to an envelope; a
/// fault anywhere in the pipeline is classified, logged once and embedded,
/// never propagated to the caller.
pub struct ExtractorClient {
    pub(crate) cache: Arc<CacheCoordinator<BrandProfile>>,
    pub(crate) limiter: RateLimiter,
    pub(crate) breakers: BreakerRegistry,
    pub(crate) worker: Arc<dyn ExtractionWorker>,
    pub(crate) analyzer: Arc<dyn BrandAnalyzer>,
    pub(crate) admin: Arc<dyn AdminAuth>,
    pub(crate) probe: Option<Arc<dyn ReachabilityProbe>>,
    pub(crate) monitor: HealthMonitor,
    /// Include stack summaries and fault names in error envelopes
    /// (operator/debug deployments only).
    pub(crate) expose_internals: bool,
}

impl ExtractorClient {
    /// Extract the brand profile for `url` on behalf of `client_id`.
    pub async fn extract(&self, url: &str, client_id: &str) -> ExtractionResponse {
        let trace_id = uuid::Uuid::new_v4().to_string();

        // 1. Admission. Rejections and limiter-store faults both end the
        //    request here; quota metadata is reported either way when known.
        let rate_limit = match self.limiter.admit(client_id).await {
            Ok(decision) => {
                let meta = RateLimitMeta {
                    limit: decision.limit,
                    remaining: decision.remaining,
                    reset_at: decision.reset_at,
                };
                if !decision.allowed {
                    let err = Error::RateLimited {
                        limit: decision.limit,
                        reset_at: decision.reset_at,
                    };
                    return self.fail(url, &err, trace_id, CacheOutcome::Skipped, Some(meta));
                }
                Some(meta)
            }
            Err(e) => {
                return self.fail(url, &e, trace_id, CacheOutcome::Skipped, None);
            }
        };

        // 2. Key normalization; malformed input never reaches the cache.
        let key = match normalize(url) {
            Ok(key) => key,
            Err(e) => {
                return self.fail(url, &e, trace_id, CacheOutcome::Skipped, rate_limit);
            }
        };

        // 3. Cache lookup. A hit is served without touching the breaker or
        //    the worker; a backend fault degrades to a bypass, never a
        //    failed request.
        let mut cache_outcome = CacheOutcome::Miss;
        match self.cache.lookup(&key).await {
            Ok(Some(profile)) => {
                let meta = ResponseMeta {
                    trace_id,
                    cache: CacheOutcome::Hit,
                    rate_limit,
                };
                return ExtractionResponse::from_profile(profile, meta);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache lookup failed; bypassing cache");
                cache_outcome = CacheOutcome::Bypass;
            }
        }

        // 4. Single-flight compute: breaker-guarded fetch, then analysis.
        //    The flight runs on its own task, so it finishes for concurrent
        //    waiters even if this caller goes away.
        let result = self.cache.populate(&key, self.compute(&key)).await;

        let meta = ResponseMeta {
            trace_id: trace_id.clone(),
            cache: cache_outcome,
            rate_limit,
        };
        match result {
            Ok(profile) => ExtractionResponse::from_profile(profile, meta),
            Err(e) => {
                let record = self.record(&e, url, trace_id);
                // A fault after a successful fetch leaves a salvaged partial
                // profile behind; ship it as a degraded envelope with the
                // error attached rather than a bare failure.
                if let Ok(Some(profile)) = self.cache.lookup(&key).await {
                    if !profile.complete {
                        return ExtractionResponse::degraded(
                            profile,
                            record.to_envelope(self.expose_internals),
                            meta,
                        );
                    }
                }
                ExtractionResponse::failure(
                    url.to_string(),
                    record.to_envelope(self.expose_internals),
                    record.http_status,
                    meta,
                )
            }
        }
    }

    /// Build the single-flight computation for one key.
    fn compute(
        &self,
        key: &CacheKey,
    ) -> impl std::future::Future<Output = Result<BrandProfile>> + Send + 'static {
        let breaker = self.breakers.get(self.worker.name());
        let worker = Arc::clone(&self.worker);
        let analyzer = Arc::clone(&self.analyzer);
        let cache = Arc::clone(&self.cache);
        let key = key.clone();
        let url = key.canonical.clone();

        async move {
            // Only the external fetch counts against the breaker; analyzer
            // faults are local and must not open the circuit.
            let raw = breaker.call(worker.fetch(&url)).await?;
            match analyzer.analyze(&url, &raw).await {
                Ok(profile) => Ok(profile),
                Err(e) => {
                    // The fetch already succeeded, so the request is not a
                    // total loss: record what is known as a partial profile.
                    // The orchestrator picks it up to shape a degraded
                    // envelope, and later requests hit it without re-fetching.
                    let salvaged = BrandProfile {
                        url: raw.resolved_url.clone(),
                        logo: None,
                        colors: Vec::new(),
                        complete: false,
                        note: Some("analysis failed after content fetch".to_string()),
                    };
                    if let Err(store_err) = cache.store(&key, &salvaged, None).await {
                        tracing::warn!(key = %key, error = %store_err, "failed to cache partial profile");
                    }
                    Err(e)
                }
            }
        }
    }

    /// Administrative clear-all. Requires a valid credential; missing or
    /// rejected credentials classify as `authentication` / `authorization`.
    pub async fn clear_cache(&self, credential: Option<&str>) -> Result<CacheClearReceipt> {
        self.admin.authorize(credential)?;
        let entries_removed = self.cache.clear_all().await?;
        let trace_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(trace_id = %trace_id, entries_removed, "cache cleared by administrator");
        Ok(CacheClearReceipt {
            entries_removed,
            trace_id,
        })
    }

    /// Aggregated health over cache, limiter store, breakers and the worker.
    pub async fn health(&self) -> SystemHealth {
        self.monitor
            .check_all(
                &self.cache,
                &self.limiter,
                &self.breakers,
                self.probe.as_deref(),
            )
            .await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshots()
    }

    fn record(&self, err: &Error, url: &str, trace_id: String) -> ErrorRecord {
        let mut context = BTreeMap::new();
        context.insert("url".to_string(), serde_json::json!(url));
        let record = classify(err, context, Some(trace_id));
        record.log();
        record
    }

    fn fail(
        &self,
        url: &str,
        err: &Error,
        trace_id: String,
        cache: CacheOutcome,
        rate_limit: Option<RateLimitMeta>,
    ) -> ExtractionResponse {
        let record = self.record(err, url, trace_id);
        let meta = ResponseMeta {
            trace_id: record.trace_id.clone(),
            cache,
            rate_limit,
        };
        ExtractionResponse::failure(
            url.to_string(),
            record.to_envelope(self.expose_internals),
            record.http_status,
            meta,
        )
    }
}
