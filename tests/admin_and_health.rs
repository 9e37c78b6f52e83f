use async_trait::async_trait;
use brandlens::cache::CacheConfig;
use brandlens::classify::ErrorCategory;
use brandlens::client::{CacheOutcome, ExtractorBuilder};
use brandlens::health::{HealthStatus, ReachabilityProbe};
use brandlens::resilience::circuit_breaker::BreakerConfig;
use brandlens::worker::{BrandAnalyzer, BrandProfile, ExtractionWorker, RawContent};
use brandlens::{Error, ErrorContext, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct OkWorker;

#[async_trait]
impl ExtractionWorker for OkWorker {
    async fn fetch(&self, url: &str) -> Result<RawContent> {
        Ok(RawContent {
            html: "<html></html>".to_string(),
            screenshot: None,
            resolved_url: url.to_string(),
        })
    }
}

struct FailingWorker;

#[async_trait]
impl ExtractionWorker for FailingWorker {
    async fn fetch(&self, _url: &str) -> Result<RawContent> {
        Err(Error::network(
            "connection refused",
            ErrorContext::new().with_source("failing_worker"),
        ))
    }
}

struct OkAnalyzer;

#[async_trait]
impl BrandAnalyzer for OkAnalyzer {
    async fn analyze(&self, url: &str, _content: &RawContent) -> Result<BrandProfile> {
        Ok(BrandProfile {
            url: url.to_string(),
            logo: None,
            colors: Vec::new(),
            complete: true,
            note: None,
        })
    }
}

struct StubProbe {
    reachable: AtomicBool,
}

#[async_trait]
impl ReachabilityProbe for StubProbe {
    async fn ping(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::network(
                "unreachable",
                ErrorContext::new().with_source("stub_probe"),
            ))
        }
    }

    fn target(&self) -> &str {
        "extraction-target"
    }
}

#[tokio::test]
async fn test_clear_cache_rejects_missing_credential() {
    let client = ExtractorBuilder::new()
        .with_worker(Arc::new(OkWorker))
        .with_analyzer(Arc::new(OkAnalyzer))
        .with_admin_secret("s3cret")
        .build()
        .expect("builder");

    let err = client.clear_cache(None).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Authentication);

    let err = client.clear_cache(Some("wrong")).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Authorization);
}

#[tokio::test]
async fn test_clear_cache_is_disabled_without_a_secret() {
    let client = ExtractorBuilder::new()
        .with_worker(Arc::new(OkWorker))
        .with_analyzer(Arc::new(OkAnalyzer))
        .build()
        .expect("builder");

    let err = client.clear_cache(Some("anything")).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Authentication);
}

#[tokio::test]
async fn test_clear_cache_drops_entries_and_reports_count() {
    let client = ExtractorBuilder::new()
        .with_worker(Arc::new(OkWorker))
        .with_analyzer(Arc::new(OkAnalyzer))
        .with_admin_secret("s3cret")
        .build()
        .expect("builder");

    client.extract("https://example.com/a", "c1").await;
    client.extract("https://example.com/b", "c1").await;

    let receipt = client.clear_cache(Some("s3cret")).await.expect("receipt");
    assert_eq!(receipt.entries_removed, 2);
    assert!(!receipt.trace_id.is_empty());

    // Cleared entries are recomputed on the next request.
    let response = client.extract("https://example.com/a", "c1").await;
    assert_eq!(response.meta.cache, CacheOutcome::Miss);
}

#[tokio::test]
async fn test_healthy_system_reports_all_components() {
    let client = ExtractorBuilder::new()
        .with_worker(Arc::new(OkWorker))
        .with_analyzer(Arc::new(OkAnalyzer))
        .build()
        .expect("builder");

    let report = client.health().await;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.http_status(), 200);

    let names: Vec<&str> = report
        .components
        .iter()
        .map(|c| c.component.as_str())
        .collect();
    assert!(names.contains(&"cache:memory"));
    assert!(names.contains(&"rate_limit_store:memory"));
}

#[tokio::test]
async fn test_open_breaker_degrades_health() {
    let client = ExtractorBuilder::new()
        .with_worker(Arc::new(FailingWorker))
        .with_analyzer(Arc::new(OkAnalyzer))
        .with_breaker_config(BreakerConfig::new().with_failure_threshold(1))
        .build()
        .expect("builder");

    client.extract("https://example.com", "c1").await;

    let report = client.health().await;
    assert_eq!(report.status, HealthStatus::Degraded);
    assert_eq!(report.http_status(), 200);
    let breaker = report
        .components
        .iter()
        .find(|c| c.component == "breaker:worker")
        .expect("breaker component");
    assert_eq!(breaker.status, HealthStatus::Degraded);
}

#[tokio::test]
async fn test_unreachable_target_is_unhealthy() {
    let probe = Arc::new(StubProbe {
        reachable: AtomicBool::new(false),
    });
    let client = ExtractorBuilder::new()
        .with_worker(Arc::new(OkWorker))
        .with_analyzer(Arc::new(OkAnalyzer))
        .with_probe(probe.clone())
        .build()
        .expect("builder");

    let report = client.health().await;
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert_eq!(report.http_status(), 503);

    probe.reachable.store(true, Ordering::SeqCst);
    let report = client.health().await;
    assert_eq!(report.status, HealthStatus::Healthy);
    let worker = report
        .components
        .iter()
        .find(|c| c.component == "worker:extraction-target")
        .expect("worker component");
    assert!(worker.latency_ms.is_some());
}

#[tokio::test]
async fn test_cache_stats_track_pipeline_traffic() {
    let client = ExtractorBuilder::new()
        .with_worker(Arc::new(OkWorker))
        .with_analyzer(Arc::new(OkAnalyzer))
        .with_cache_config(CacheConfig::new())
        .build()
        .expect("builder");

    client.extract("https://example.com", "c1").await;
    client.extract("https://example.com", "c1").await;

    let stats = client.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}
