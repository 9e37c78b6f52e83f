//! 弹性模式模块：熔断器与固定窗口限流器。
//!
//! # Resilience Primitives Module
//!
//! This module provides the two admission gates the orchestrator runs before
//! any expensive work: a per-client fixed-window rate limiter and a
//! per-dependency circuit breaker guarding the external extraction worker.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`circuit_breaker`] | Closed / open / half-open state machine per dependency |
//! | [`rate_limiter`] | Fixed-window admission over a shared counter store |
//!
//! ## Circuit Breaker
//!
//! - **Closed**: calls pass through; consecutive failures are counted
//! - **Open**: calls fail fast without touching the dependency
//! - **Half-Open**: exactly one probe tests whether the dependency recovered
//!
//! ```rust
//! use brandlens::resilience::circuit_breaker::{BreakerConfig, CircuitBreaker};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new(
//!     "worker",
//!     BreakerConfig::new()
//!         .with_failure_threshold(5)
//!         .with_reset_timeout(Duration::from_secs(30)),
//! );
//! ```
//!
//! ## Rate Limiter
//!
//! The limiter counts admissions per client within discrete windows; the
//! shared store's atomic increment is what keeps concurrent admissions for one
//! client linearizable.
//!
//! ```rust
//! use brandlens::resilience::rate_limiter::{
//!     MemoryCounterStore, RateLimitConfig, RateLimiter,
//! };
//! use std::sync::Arc;
//!
//! let limiter = RateLimiter::new(
//!     Arc::new(MemoryCounterStore::new()),
//!     RateLimitConfig::new().with_limit(60),
//! );
//! ```

pub mod circuit_breaker;
pub mod rate_limiter;
