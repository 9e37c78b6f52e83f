//! 外部协作者模块：抓取 worker 与品牌分析器的契约及默认实现。
//!
//! # External Collaborators Module
//!
//! The core treats the expensive parts of extraction as opaque collaborators:
//! an [`ExtractionWorker`] that fetches raw page content (slow, unreliable,
//! always consumed through the circuit breaker) and a [`BrandAnalyzer`] that
//! turns raw content into a [`BrandProfile`], possibly a partial one.
//!
//! Thin default implementations keep the crate runnable end to end:
//! [`HttpWorker`] does a plain GET with a deadline, [`BasicAnalyzer`] applies
//! the cheapest meta-tag and stylesheet heuristics. Anything smarter (headless
//! rendering, vision models) plugs in behind the same traits.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ExtractionWorker`] | `fetch(url) -> RawContent` contract |
//! | [`BrandAnalyzer`] | `analyze(url, content) -> BrandProfile` contract |
//! | [`BrandProfile`] / [`LogoData`] / [`ColorData`] | Extraction payload |
//! | [`HttpWorker`] | Default reqwest-based fetcher |
//! | [`BasicAnalyzer`] | Default meta-tag / hex-color analyzer |

mod analyzer;
mod http;

pub use analyzer::BasicAnalyzer;
pub use http::{HttpWorker, HttpWorkerConfig};

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Raw content recovered from the target site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContent {
    pub html: String,
    /// Base64-encoded screenshot, when the worker can render one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    /// Final URL after redirects.
    pub resolved_url: String,
}

/// Extracted logo information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Base64-encoded image bytes, when the analyzer inlined them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// How the logo was found (e.g. "meta-tag", "link-icon").
    pub source: String,
}

/// One extracted brand color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorData {
    /// Normalized `#rrggbb`.
    pub hex: String,
    pub rgb: [u8; 3],
    /// Where the color came from (e.g. "stylesheet", "inline-style").
    pub source: String,
}

/// The computed extraction payload stored in the cache.
///
/// `complete == false` marks a partial result (e.g. colors found but no
/// logo); partial payloads are preserved, returned as degraded envelopes and
/// cached like any other result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandProfile {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<LogoData>,
    #[serde(default)]
    pub colors: Vec<ColorData>,
    pub complete: bool,
    /// Human-readable note on what is missing from a partial profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// The expensive, unreliable external fetch. Expected to take seconds and to
/// fail with network / timeout / malformed-content faults; only ever invoked
/// through the circuit breaker.
#[async_trait]
pub trait ExtractionWorker: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawContent>;

    /// Dependency name for breaker keying and health reporting.
    fn name(&self) -> &'static str {
        "worker"
    }
}

/// Turns raw content into a brand profile. Invoked only on a cache miss after
/// the breaker admits the fetch; may return a partial profile rather than
/// failing when some signals are missing.
#[async_trait]
pub trait BrandAnalyzer: Send + Sync {
    async fn analyze(&self, url: &str, content: &RawContent) -> Result<BrandProfile>;
}
