//! 客户端模块：编排整条提取管线并产出响应信封。
//!
//! # Client Module
//!
//! The orchestration layer. [`ExtractorClient`] wires the cache coordinator,
//! rate limiter, circuit breakers, worker and analyzer into one pipeline and
//! exposes the three operations a service front-end needs: `extract`,
//! `clear_cache` and `health`. [`ExtractorBuilder`] assembles a client from
//! explicit collaborators plus `BRANDLENS_*` environment overrides.
//!
//! `extract` never returns `Err`: every fault is classified and embedded in
//! an [`ExtractionResponse`] with the HTTP status a transport layer should
//! use.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ExtractorClient`] | Pipeline orchestrator |
//! | [`ExtractorBuilder`] | Builder with env overrides and defaults |
//! | [`ExtractionResponse`] | Response envelope (success / degraded / failure) |
//! | [`AdminAuth`] / [`SharedSecret`] | Credential check for admin operations |

mod auth;
mod builder;
mod core;
mod envelope;

pub use auth::{AdminAuth, DisabledAdmin, SharedSecret};
pub use builder::ExtractorBuilder;
pub use core::ExtractorClient;
pub use envelope::{
    CacheClearReceipt, CacheOutcome, ExtractionResponse, RateLimitMeta, ResponseMeta,
};
