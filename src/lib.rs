//! # brandlens
//!
//! 这是品牌识别提取服务的弹性与编排核心，为昂贵且不可靠的提取操作提供统一防护层。
//!
//! Resilience and orchestration core for brand-identity extraction services -
//! caching, rate limiting, circuit breaking and error classification wrapped
//! around one expensive, unreliable operation.
//!
//! ## Overview
//!
//! Extracting a site's brand identity (logo, colors) means fetching and
//! analyzing arbitrary third-party pages: seconds per call, frequent partial
//! or failed results. This library fronts that operation with the protective
//! machinery a production service needs, behind one orchestrated entry point.
//!
//! ## Core Philosophy
//!
//! - **Never-Err surface**: [`ExtractorClient::extract`] always returns an
//!   envelope; faults are classified and embedded, not propagated
//! - **Pluggable collaborators**: workers, analyzers, cache backends and
//!   counter stores are traits with in-memory defaults
//! - **Fail-safe defaults**: the rate limiter fails closed, the cache fails
//!   open, the breaker sheds load before the dependency melts
//!
//! ## Key Features
//!
//! - **Single-flight caching**: concurrent misses on one key share a single
//!   computation via [`cache::CacheCoordinator`]
//! - **Fixed-window rate limiting**: per-client quotas via
//!   [`resilience::rate_limiter::RateLimiter`]
//! - **Circuit breaking**: per-dependency three-state breakers via
//!   [`resilience::circuit_breaker::BreakerRegistry`]
//! - **Error classification**: every fault mapped to a category, HTTP status
//!   and redacted context via [`classify`]
//! - **Health aggregation**: component probes rolled up by
//!   [`health::HealthMonitor`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use brandlens::client::ExtractorBuilder;
//!
//! #[tokio::main]
//! async fn main() -> brandlens::Result<()> {
//!     let client = ExtractorBuilder::new().build()?;
//!
//!     let response = client.extract("https://example.com", "caller-1").await;
//!     println!("{}", serde_json::to_string_pretty(&response)?);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Orchestrated pipeline, builder and response envelopes |
//! | [`cache`] | Key normalization, backends, single-flight coordinator |
//! | [`resilience`] | Circuit breaker and rate limiting |
//! | [`classify`] | Error categories, records and redaction |
//! | [`health`] | Component and system health aggregation |
//! | [`worker`] | Extraction worker / analyzer contracts and defaults |

pub mod cache;
pub mod classify;
pub mod client;
pub mod health;
pub mod resilience;
pub mod worker;

// Re-export main types for convenience
pub use client::{ExtractionResponse, ExtractorBuilder, ExtractorClient};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
