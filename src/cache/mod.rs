//! 缓存协调模块：内容寻址的结果存储与单飞（single-flight）填充。
//!
//! # Cache Coordination Module
//!
//! This module fronts the shared result store: a normalized request key maps
//! to a previously computed extraction payload, and population of a missing
//! key is guaranteed to run at most once concurrently per key.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheCoordinator`] | Lookup / store / single-flight populate over a backend |
//! | [`CacheConfig`] | TTL and enablement switches |
//! | [`CacheBackend`] | Trait for pluggable shared stores |
//! | [`MemoryCache`] | In-process backend with lazy expiry and eviction |
//! | [`NullCache`] | No-op backend for disabling caching |
//! | [`CacheKey`] / [`normalize`] | Deterministic key derivation from a URL |
//!
//! ## Failure policy
//!
//! Backend faults carry category `resource`. The orchestrator treats them as
//! soft: a failing cache degrades to a bypass (compute anyway), it never fails
//! the request.

mod backend;
mod coordinator;
mod key;

pub use backend::{CacheBackend, MemoryCache, NullCache};
pub use coordinator::{CacheConfig, CacheCoordinator, CacheStats};
pub use key::{normalize, CacheKey};
