use async_trait::async_trait;
use brandlens::classify::ErrorCategory;
use brandlens::client::ExtractorBuilder;
use brandlens::resilience::rate_limiter::{CounterStore, FailureMode, RateLimitConfig};
use brandlens::worker::{BrandAnalyzer, BrandProfile, ExtractionWorker, RawContent};
use brandlens::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::Duration;

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

/// Counter store that always fails, for failure-mode tests.
struct BrokenCounterStore;

#[async_trait]
impl CounterStore for BrokenCounterStore {
    async fn increment(&self, _key: &str, _ttl: Duration) -> Result<u64> {
        Err(Error::store(
            "store down",
            ErrorContext::new().with_source("broken_counter_store"),
        ))
    }

    async fn ping(&self) -> Result<()> {
        Err(Error::store(
            "store down",
            ErrorContext::new().with_source("broken_counter_store"),
        ))
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

fn limited_client(limit: u32, mode: FailureMode) -> brandlens::ExtractorClient {
    ExtractorBuilder::new()
        .with_worker(Arc::new(OkWorker))
        .with_analyzer(Arc::new(OkAnalyzer))
        .with_rate_limit_config(
            RateLimitConfig::new()
                .with_limit(limit)
                // A wide window so no boundary falls inside a test run.
                .with_window(Duration::from_secs(3600))
                .with_failure_mode(mode),
        )
        .build()
        .expect("builder")
}

#[tokio::test]
async fn test_requests_over_the_limit_are_rejected() {
    let client = limited_client(2, FailureMode::FailClosed);

    for i in 0..2 {
        let response = client
            .extract(&format!("https://example.com/{}", i), "c1")
            .await;
        assert!(response.success, "request {} should be admitted", i);
    }

    let rejected = client.extract("https://example.com/2", "c1").await;
    assert!(!rejected.success);
    assert_eq!(rejected.http_status, 429);
    let envelope = rejected.error.expect("error envelope");
    assert_eq!(envelope.category, ErrorCategory::RateLimit);
}

#[tokio::test]
async fn test_rejection_carries_quota_metadata() {
    let client = limited_client(1, FailureMode::FailClosed);

    client.extract("https://example.com/a", "c1").await;
    let rejected = client.extract("https://example.com/b", "c1").await;

    let meta = rejected.meta.rate_limit.expect("rate limit metadata");
    assert_eq!(meta.limit, 1);
    assert_eq!(meta.remaining, 0);
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    assert!(meta.reset_at > now);
}

#[tokio::test]
async fn test_cache_hits_still_consume_quota() {
    let client = limited_client(2, FailureMode::FailClosed);

    let miss = client.extract("https://example.com", "c1").await;
    assert!(miss.success);
    let hit = client.extract("https://example.com", "c1").await;
    assert!(hit.success);

    // Third request hits the cache but the limiter runs first.
    let rejected = client.extract("https://example.com", "c1").await;
    assert_eq!(rejected.http_status, 429);
}

#[tokio::test]
async fn test_clients_have_independent_quotas() {
    let client = limited_client(1, FailureMode::FailClosed);

    assert!(client.extract("https://example.com/a", "alice").await.success);
    assert!(!client.extract("https://example.com/b", "alice").await.success);
    assert!(client.extract("https://example.com/c", "bob").await.success);
}

#[tokio::test]
async fn test_fail_closed_turns_store_outage_into_500() {
    let client = ExtractorBuilder::new()
        .with_worker(Arc::new(OkWorker))
        .with_analyzer(Arc::new(OkAnalyzer))
        .with_counter_store(Arc::new(BrokenCounterStore))
        .with_rate_limit_config(RateLimitConfig::new().with_failure_mode(FailureMode::FailClosed))
        .build()
        .expect("builder");

    let response = client.extract("https://example.com", "c1").await;
    assert!(!response.success);
    assert_eq!(response.http_status, 500);
    let envelope = response.error.expect("error envelope");
    assert_eq!(envelope.category, ErrorCategory::Server);
}

#[tokio::test]
async fn test_fail_open_admits_during_store_outage() {
    let client = ExtractorBuilder::new()
        .with_worker(Arc::new(OkWorker))
        .with_analyzer(Arc::new(OkAnalyzer))
        .with_counter_store(Arc::new(BrokenCounterStore))
        .with_rate_limit_config(RateLimitConfig::new().with_failure_mode(FailureMode::FailOpen))
        .build()
        .expect("builder");

    let response = client.extract("https://example.com", "c1").await;
    assert!(response.success);
    // Quota metadata stays honest: nothing was counted.
    let meta = response.meta.rate_limit.expect("rate limit metadata");
    assert_eq!(meta.remaining, 0);
}
