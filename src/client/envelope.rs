//! Response envelopes: the one shape every request resolves to.

use crate::classify::ErrorEnvelope;
use crate::worker::{BrandProfile, ColorData, LogoData};
use serde::{Deserialize, Serialize};

/// How the cache participated in this request.
///
/// `Bypass` means the cache was unreachable and the pipeline degraded to
/// computing anyway; `Skipped` means the pipeline ended before the cache
/// (rejected admission, invalid input).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOutcome {
    Hit,
    Miss,
    Bypass,
    Skipped,
}

/// Quota metadata the API layer turns into `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitMeta {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: u64,
}

/// Trace metadata attached to every envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub trace_id: String,
    pub cache: CacheOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitMeta>,
}

/// The envelope returned for every extraction request: success, degraded
/// (partial data, `success: false`) or failure (classified error attached).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResponse {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<LogoData>,
    #[serde(default)]
    pub colors: Vec<ColorData>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    pub meta: ResponseMeta,
    /// HTTP status the API layer should answer with; not serialized into the
    /// body (the transport carries it).
    #[serde(skip, default = "default_status")]
    pub http_status: u16,
}

fn default_status() -> u16 {
    200
}

impl ExtractionResponse {
    /// Envelope for a complete or partial profile. Partial profiles come back
    /// with `success: false` and the profile's note, but still HTTP 200.
    pub fn from_profile(profile: BrandProfile, meta: ResponseMeta) -> Self {
        let success = profile.complete;
        let message = if success {
            Some("extraction completed".to_string())
        } else {
            profile
                .note
                .clone()
                .or_else(|| Some("partial extraction".to_string()))
        };
        Self {
            url: profile.url,
            logo: profile.logo,
            colors: profile.colors,
            success,
            message,
            error: None,
            meta,
            http_status: 200,
        }
    }

    /// Degraded envelope: a fault occurred but partial data was recovered.
    /// The payload rides along with the classified error, still HTTP 200.
    pub fn degraded(profile: BrandProfile, error: ErrorEnvelope, meta: ResponseMeta) -> Self {
        Self {
            url: profile.url,
            logo: profile.logo,
            colors: profile.colors,
            success: false,
            message: Some("extraction degraded".to_string()),
            error: Some(error),
            meta,
            http_status: 200,
        }
    }

    /// Pure failure envelope: no data was recovered.
    pub fn failure(url: String, error: ErrorEnvelope, status: u16, meta: ResponseMeta) -> Self {
        Self {
            url,
            logo: None,
            colors: Vec::new(),
            success: false,
            message: Some(error.message.clone()),
            error: Some(error),
            meta,
            http_status: status,
        }
    }
}

/// Confirmation returned by an authorized administrative cache clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheClearReceipt {
    pub entries_removed: usize,
    pub trace_id: String,
}
