//! 健康监测模块：对缓存、限流存储、熔断器与外部依赖做有界探测。
//!
//! # Health Monitoring Module
//!
//! The health monitor observes every shared piece of the pipeline: the cache
//! backend, the rate limiter's counter store, the circuit breaker state per
//! dependency, and the external worker's basic reachability. Each sub-check
//! runs under its own bounded timeout, so one stuck dependency can never wedge
//! the aggregation; a timed-out check reports `Unhealthy` for itself only.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`HealthMonitor`] | Runs the sub-checks and aggregates |
//! | [`ComponentHealth`] | One component's status, latency and detail |
//! | [`SystemHealth`] | Worst-of aggregate plus HTTP status mapping |
//! | [`ReachabilityProbe`] | Lightweight "is the dependency there" contract |
//! | [`HttpProbe`] | Default HTTP GET/HEAD probe |

use crate::cache::CacheCoordinator;
use crate::resilience::circuit_breaker::{BreakerRegistry, BreakerState};
use crate::resilience::rate_limiter::RateLimiter;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

/// One component's probe result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub component: String,
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Aggregated report: overall status is the worst component status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub timestamp: f64,
    pub components: Vec<ComponentHealth>,
}

impl SystemHealth {
    pub fn http_status(&self) -> u16 {
        match self.status {
            HealthStatus::Unhealthy => 503,
            _ => 200,
        }
    }
}

/// Lightweight reachability contract for the external worker.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn ping(&self) -> Result<()>;
    fn target(&self) -> &str;
}

/// Default probe: an HTTP GET against a cheap endpoint of the dependency.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::server(
                    format!("failed to build probe client: {}", e),
                    ErrorContext::new().with_source("http_probe"),
                )
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn ping(&self) -> Result<()> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            Error::network(
                format!("probe failed: {}", e),
                ErrorContext::new()
                    .with_details(self.url.clone())
                    .with_source("http_probe"),
            )
        })?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::upstream(
                format!("probe returned HTTP {}", response.status().as_u16()),
                ErrorContext::new()
                    .with_details(self.url.clone())
                    .with_source("http_probe"),
            ))
        }
    }

    fn target(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Deadline applied to each sub-check individually.
    pub check_timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_timeout: Duration::from_secs(2),
        }
    }
}

impl HealthConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }
}

pub struct HealthMonitor {
    cfg: HealthConfig,
}

impl HealthMonitor {
    pub fn new(cfg: HealthConfig) -> Self {
        Self { cfg }
    }

    /// Probe every shared component and aggregate worst-of.
    pub async fn check_all<T>(
        &self,
        cache: &CacheCoordinator<T>,
        limiter: &RateLimiter,
        breakers: &BreakerRegistry,
        probe: Option<&dyn ReachabilityProbe>,
    ) -> SystemHealth
    where
        T: Clone + serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
    {
        let mut components = Vec::new();
        components.push(self.check_cache(cache).await);
        components.push(self.check_counter_store(limiter).await);
        components.extend(self.check_breakers(breakers));
        if let Some(probe) = probe {
            components.push(self.check_reachability(probe).await);
        }

        let status = components
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        SystemHealth {
            status,
            timestamp: unix_now_f64(),
            components,
        }
    }

    async fn check_cache<T>(&self, cache: &CacheCoordinator<T>) -> ComponentHealth
    where
        T: Clone + serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
    {
        let name = format!("cache:{}", cache.backend_name());
        self.bounded(&name, async {
            let entries = cache.ping().await?;
            Ok(format!("{} live entries", entries))
        })
        .await
    }

    async fn check_counter_store(&self, limiter: &RateLimiter) -> ComponentHealth {
        let name = format!("rate_limit_store:{}", limiter.store_name());
        self.bounded(&name, async {
            limiter.ping_store().await?;
            Ok("reachable".to_string())
        })
        .await
    }

    fn check_breakers(&self, breakers: &BreakerRegistry) -> Vec<ComponentHealth> {
        breakers
            .snapshots()
            .into_iter()
            .map(|snap| {
                let (status, detail) = match snap.state {
                    BreakerState::Closed => (
                        HealthStatus::Healthy,
                        format!("closed, {} consecutive failures", snap.consecutive_failures),
                    ),
                    // An open circuit still serves cached results, so the
                    // system is degraded rather than down.
                    BreakerState::Open => (
                        HealthStatus::Degraded,
                        format!(
                            "open, retry in {}ms",
                            snap.open_remaining_ms.unwrap_or_default()
                        ),
                    ),
                    BreakerState::HalfOpen => {
                        (HealthStatus::Degraded, "half-open, probing".to_string())
                    }
                };
                ComponentHealth {
                    component: format!("breaker:{}", snap.dependency),
                    status,
                    latency_ms: None,
                    detail: Some(detail),
                }
            })
            .collect()
    }

    async fn check_reachability(&self, probe: &dyn ReachabilityProbe) -> ComponentHealth {
        let name = format!("worker:{}", probe.target());
        self.bounded(&name, async {
            probe.ping().await?;
            Ok("reachable".to_string())
        })
        .await
    }

    /// Run one sub-check under the configured deadline.
    async fn bounded<F>(&self, component: &str, check: F) -> ComponentHealth
    where
        F: Future<Output = Result<String>>,
    {
        let start = Instant::now();
        match tokio::time::timeout(self.cfg.check_timeout, check).await {
            Ok(Ok(detail)) => ComponentHealth {
                component: component.to_string(),
                status: HealthStatus::Healthy,
                latency_ms: Some(elapsed_ms(start)),
                detail: Some(detail),
            },
            Ok(Err(e)) => ComponentHealth {
                component: component.to_string(),
                status: HealthStatus::Unhealthy,
                latency_ms: Some(elapsed_ms(start)),
                detail: Some(e.to_string()),
            },
            Err(_) => ComponentHealth {
                component: component.to_string(),
                status: HealthStatus::Unhealthy,
                latency_ms: Some(elapsed_ms(start)),
                detail: Some(format!(
                    "check timed out after {:?}",
                    self.cfg.check_timeout
                )),
            },
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

fn unix_now_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
