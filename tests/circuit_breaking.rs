use async_trait::async_trait;
use brandlens::classify::ErrorCategory;
use brandlens::client::ExtractorBuilder;
use brandlens::resilience::circuit_breaker::{BreakerConfig, BreakerState};
use brandlens::worker::{BrandAnalyzer, BrandProfile, ExtractionWorker, RawContent};
use brandlens::{Error, ErrorContext, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct FlakyWorker {
    calls: AtomicUsize,
    failing: AtomicBool,
    stall: Option<Duration>,
}

impl FlakyWorker {
    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(true),
            stall: None,
        })
    }

    fn stalling(stall: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            stall: Some(stall),
        })
    }
}

#[async_trait]
impl ExtractionWorker for FlakyWorker {
    async fn fetch(&self, url: &str) -> Result<RawContent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::network(
                "connection reset",
                ErrorContext::new().with_source("flaky_worker"),
            ));
        }
        Ok(RawContent {
            html: "<html></html>".to_string(),
            screenshot: None,
            resolved_url: url.to_string(),
        })
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

#[tokio::test]
async fn test_breaker_opens_after_consecutive_failures() {
    let worker = FlakyWorker::failing();
    let client = ExtractorBuilder::new()
        .with_worker(worker.clone())
        .with_analyzer(Arc::new(OkAnalyzer))
        .with_breaker_config(BreakerConfig::new().with_failure_threshold(2))
        .build()
        .expect("builder");

    // Distinct URLs so the cache never short-circuits the worker.
    let first = client.extract("https://example.com/a", "c1").await;
    assert_eq!(first.http_status, 504);
    let second = client.extract("https://example.com/b", "c1").await;
    assert_eq!(second.http_status, 504);

    // The circuit is now open; the worker must not be reached.
    let third = client.extract("https://example.com/c", "c1").await;
    assert_eq!(third.http_status, 503);
    let envelope = third.error.expect("error envelope");
    assert_eq!(envelope.category, ErrorCategory::ExternalService);
    assert_eq!(worker.calls.load(Ordering::SeqCst), 2);

    let snapshots = client.breaker_snapshots();
    assert_eq!(snapshots[0].state, BreakerState::Open);
    assert!(snapshots[0].open_remaining_ms.is_some());
}

#[tokio::test]
async fn test_breaker_recovers_through_half_open_probe() {
    let worker = FlakyWorker::failing();
    let client = ExtractorBuilder::new()
        .with_worker(worker.clone())
        .with_analyzer(Arc::new(OkAnalyzer))
        .with_breaker_config(
            BreakerConfig::new()
                .with_failure_threshold(1)
                .with_reset_timeout(Duration::from_millis(50)),
        )
        .build()
        .expect("builder");

    let tripped = client.extract("https://example.com/a", "c1").await;
    assert_eq!(tripped.http_status, 504);
    assert_eq!(client.breaker_snapshots()[0].state, BreakerState::Open);

    // Dependency recovers while the circuit is open.
    worker.failing.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(80)).await;

    // First call after the reset timeout is the half-open probe.
    let probe = client.extract("https://example.com/b", "c1").await;
    assert!(probe.success);
    assert_eq!(client.breaker_snapshots()[0].state, BreakerState::Closed);

    let followup = client.extract("https://example.com/c", "c1").await;
    assert!(followup.success);
}

#[tokio::test]
async fn test_failed_probe_reopens_the_circuit() {
    let worker = FlakyWorker::failing();
    let client = ExtractorBuilder::new()
        .with_worker(worker.clone())
        .with_analyzer(Arc::new(OkAnalyzer))
        .with_breaker_config(
            BreakerConfig::new()
                .with_failure_threshold(1)
                .with_reset_timeout(Duration::from_millis(50)),
        )
        .build()
        .expect("builder");

    client.extract("https://example.com/a", "c1").await;
    tokio::time::sleep(Duration::from_millis(80)).await;

    // Probe fails; the circuit reopens for a full reset timeout.
    let probe = client.extract("https://example.com/b", "c1").await;
    assert_eq!(probe.http_status, 504);
    assert_eq!(client.breaker_snapshots()[0].state, BreakerState::Open);

    let shed = client.extract("https://example.com/c", "c1").await;
    assert_eq!(shed.http_status, 503);
    assert_eq!(worker.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stalled_fetch_times_out_and_counts_as_failure() {
    let worker = FlakyWorker::stalling(Duration::from_secs(5));
    let client = ExtractorBuilder::new()
        .with_worker(worker.clone())
        .with_analyzer(Arc::new(OkAnalyzer))
        .with_breaker_config(BreakerConfig::new().with_call_timeout(Duration::from_millis(50)))
        .build()
        .expect("builder");

    let response = client.extract("https://example.com", "c1").await;
    assert!(!response.success);
    assert_eq!(response.http_status, 504);
    let envelope = response.error.expect("error envelope");
    assert_eq!(envelope.category, ErrorCategory::Network);
    assert_eq!(client.breaker_snapshots()[0].consecutive_failures, 1);
}

#[tokio::test]
async fn test_success_resets_the_failure_count() {
    let worker = FlakyWorker::failing();
    let client = ExtractorBuilder::new()
        .with_worker(worker.clone())
        .with_analyzer(Arc::new(OkAnalyzer))
        .with_breaker_config(BreakerConfig::new().with_failure_threshold(3))
        .build()
        .expect("builder");

    client.extract("https://example.com/a", "c1").await;
    client.extract("https://example.com/b", "c1").await;
    assert_eq!(client.breaker_snapshots()[0].consecutive_failures, 2);

    worker.failing.store(false, Ordering::SeqCst);
    let ok = client.extract("https://example.com/c", "c1").await;
    assert!(ok.success);
    assert_eq!(client.breaker_snapshots()[0].consecutive_failures, 0);

    // Consecutive, not cumulative: two more failures still stay under the
    // threshold of three.
    worker.failing.store(true, Ordering::SeqCst);
    client.extract("https://example.com/d", "c1").await;
    client.extract("https://example.com/e", "c1").await;
    assert_eq!(client.breaker_snapshots()[0].state, BreakerState::Closed);
}
