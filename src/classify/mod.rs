//! 错误分类模块：将故障映射为结构化、可分类的错误记录。
//!
//! # Error Classification Module
//!
//! This module maps any fault raised inside the extraction pipeline into a
//! structured [`ErrorRecord`] that carries a category, an HTTP status, a trace
//! id and a redacted context map. The orchestrator attaches the record (via
//! [`ErrorRecord::to_envelope`]) to every failure or degraded response.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ErrorCategory`] | Closed taxonomy of failure categories |
//! | [`ErrorRecord`] | Structured record: category, status, trace id, context |
//! | [`ErrorEnvelope`] | Client-facing serialized form of a record |
//! | [`classify`] | Map an [`Error`] plus context into a record |
//!
//! Classification precedence: explicit domain faults (validation,
//! authentication, authorization, rate limit) > known external-dependency
//! faults (timeout, malformed upstream response, breaker open) > everything
//! else, which lands in `unknown` with HTTP 500.

use crate::{Error, ErrorContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Closed set of failure categories.
///
/// The category fully determines the default HTTP status; callers never pick
/// statuses ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    ExternalService,
    Validation,
    Authentication,
    Authorization,
    Resource,
    RateLimit,
    Server,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::ExternalService => "external_service",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Resource => "resource",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Server => "server",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Default HTTP status for this category.
    pub fn default_status(&self) -> u16 {
        match self {
            ErrorCategory::Network => 504,
            ErrorCategory::ExternalService => 503,
            ErrorCategory::Validation => 400,
            ErrorCategory::Authentication => 401,
            ErrorCategory::Authorization => 403,
            ErrorCategory::Resource => 500,
            ErrorCategory::RateLimit => 429,
            ErrorCategory::Server => 500,
            ErrorCategory::Unknown => 500,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Category for this fault shape. Exhaustive by construction.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation { .. } => ErrorCategory::Validation,
            Error::Authentication { .. } => ErrorCategory::Authentication,
            Error::Authorization { .. } => ErrorCategory::Authorization,
            Error::RateLimited { .. } => ErrorCategory::RateLimit,
            Error::BreakerOpen { .. } => ErrorCategory::ExternalService,
            Error::Timeout { .. } => ErrorCategory::Network,
            Error::Network { .. } => ErrorCategory::Network,
            Error::Upstream { .. } => ErrorCategory::ExternalService,
            Error::Store { .. } => ErrorCategory::Resource,
            Error::Server { .. } => ErrorCategory::Server,
            Error::Serialization(_) => ErrorCategory::Server,
            Error::Unknown { .. } => ErrorCategory::Unknown,
        }
    }
}

/// Context keys that must never reach a response or a log line.
const REDACTED_KEYS: &[&str] = &["password", "token", "secret", "api_key"];

/// Structured record produced for every classified fault.
///
/// Created per failure, logged once, attached to the response, then dropped.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub message: String,
    pub category: ErrorCategory,
    pub http_status: u16,
    pub context: BTreeMap<String, serde_json::Value>,
    /// Unix timestamp in seconds (fractional).
    pub timestamp: f64,
    /// Always non-empty; generated when the caller has none.
    pub trace_id: String,
    /// Rust analog of a stack trace: the `source()` chain, outermost first.
    pub stack_summary: Vec<String>,
    /// Variant name of the underlying fault, internal-only.
    pub fault: &'static str,
}

/// Client-facing serialized form of an [`ErrorRecord`].
///
/// `stack_summary` and `fault` only appear when the record was serialized with
/// `expose_internals = true`; the default client envelope never carries them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub message: String,
    pub category: ErrorCategory,
    pub timestamp: f64,
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack_summary: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn variant_name(err: &Error) -> &'static str {
    match err {
        Error::Validation { .. } => "Validation",
        Error::Authentication { .. } => "Authentication",
        Error::Authorization { .. } => "Authorization",
        Error::RateLimited { .. } => "RateLimited",
        Error::BreakerOpen { .. } => "BreakerOpen",
        Error::Timeout { .. } => "Timeout",
        Error::Network { .. } => "Network",
        Error::Upstream { .. } => "Upstream",
        Error::Store { .. } => "Store",
        Error::Server { .. } => "Server",
        Error::Serialization(_) => "Serialization",
        Error::Unknown { .. } => "Unknown",
    }
}

fn source_chain(err: &Error) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain
}

/// Classify a fault into an [`ErrorRecord`].
///
/// `context` is merged into the record (redacted keys dropped); `trace_id` is
/// propagated from the caller or generated fresh so the record can always be
/// correlated across logs.
pub fn classify(
    err: &Error,
    context: BTreeMap<String, serde_json::Value>,
    trace_id: Option<String>,
) -> ErrorRecord {
    let category = err.category();
    let mut merged: BTreeMap<String, serde_json::Value> = context
        .into_iter()
        .filter(|(k, _)| !REDACTED_KEYS.contains(&k.as_str()))
        .collect();

    // Fold structured ErrorContext fields into the context map.
    if let Some(ctx) = err.context() {
        fold_context(&mut merged, ctx);
    }
    if let Error::RateLimited { limit, reset_at } = err {
        merged.insert("limit".into(), serde_json::json!(limit));
        merged.insert("reset_at".into(), serde_json::json!(reset_at));
    }
    if let Error::BreakerOpen { dependency, .. } | Error::Timeout { dependency, .. } = err {
        merged.insert("dependency".into(), serde_json::json!(dependency));
    }

    ErrorRecord {
        message: err.to_string(),
        category,
        http_status: category.default_status(),
        context: merged,
        timestamp: now_unix(),
        trace_id: trace_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        stack_summary: source_chain(err),
        fault: variant_name(err),
    }
}

fn fold_context(map: &mut BTreeMap<String, serde_json::Value>, ctx: &ErrorContext) {
    if let Some(ref field) = ctx.field_path {
        map.insert("field".into(), serde_json::json!(field));
    }
    if let Some(ref details) = ctx.details {
        map.insert("details".into(), serde_json::json!(details));
    }
    if let Some(ref source) = ctx.source {
        map.insert("source".into(), serde_json::json!(source));
    }
}

impl ErrorRecord {
    /// Log the record once as a single structured line.
    ///
    /// Logging is best-effort: serialization failures fall back to the Debug
    /// form rather than propagating.
    pub fn log(&self) {
        let detail = serde_json::to_string(&self.to_envelope(true))
            .unwrap_or_else(|_| format!("{:?}", self));
        if self.http_status >= 500 {
            tracing::error!(
                trace_id = %self.trace_id,
                category = %self.category,
                status = self.http_status,
                "{} {}",
                self.message,
                detail
            );
        } else {
            tracing::warn!(
                trace_id = %self.trace_id,
                category = %self.category,
                status = self.http_status,
                "{} {}",
                self.message,
                detail
            );
        }
    }

    /// Serialize for a response.
    ///
    /// The default client-facing envelope (`expose_internals = false`) never
    /// includes the stack summary or the fault variant name.
    pub fn to_envelope(&self, expose_internals: bool) -> ErrorEnvelope {
        ErrorEnvelope {
            message: self.message.clone(),
            category: self.category,
            timestamp: self.timestamp,
            trace_id: self.trace_id.clone(),
            context: self.context.clone(),
            stack_summary: if expose_internals {
                self.stack_summary.clone()
            } else {
                Vec::new()
            },
            fault: expose_internals.then(|| self.fault.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorContext;
    use std::time::Duration;

    #[test]
    fn test_category_statuses() {
        assert_eq!(ErrorCategory::Network.default_status(), 504);
        assert_eq!(ErrorCategory::ExternalService.default_status(), 503);
        assert_eq!(ErrorCategory::Validation.default_status(), 400);
        assert_eq!(ErrorCategory::Authentication.default_status(), 401);
        assert_eq!(ErrorCategory::Authorization.default_status(), 403);
        assert_eq!(ErrorCategory::RateLimit.default_status(), 429);
        assert_eq!(ErrorCategory::Server.default_status(), 500);
        assert_eq!(ErrorCategory::Unknown.default_status(), 500);
    }

    #[test]
    fn test_domain_faults_take_precedence() {
        let err = Error::validation("bad url", ErrorContext::new());
        assert_eq!(err.category(), ErrorCategory::Validation);

        let err = Error::Authentication {
            message: "missing credential".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Authentication);

        let err = Error::RateLimited {
            limit: 60,
            reset_at: 0,
        };
        assert_eq!(err.category(), ErrorCategory::RateLimit);
    }

    #[test]
    fn test_external_faults_map_to_network_and_external_service() {
        let err = Error::Timeout {
            dependency: "worker".into(),
            after: Duration::from_secs(10),
        };
        assert_eq!(err.category(), ErrorCategory::Network);

        let err = Error::BreakerOpen {
            dependency: "worker".into(),
            retry_in_ms: None,
        };
        assert_eq!(err.category(), ErrorCategory::ExternalService);

        let err = Error::upstream("malformed payload", ErrorContext::new());
        assert_eq!(err.category(), ErrorCategory::ExternalService);
    }

    #[test]
    fn test_trace_id_always_present() {
        let err = Error::unknown("boom", ErrorContext::new());
        let record = classify(&err, BTreeMap::new(), None);
        assert!(!record.trace_id.is_empty());

        let record = classify(&err, BTreeMap::new(), Some("trace-123".into()));
        assert_eq!(record.trace_id, "trace-123");

        // Empty caller-provided ids are replaced, never passed through.
        let record = classify(&err, BTreeMap::new(), Some(String::new()));
        assert!(!record.trace_id.is_empty());
    }

    #[test]
    fn test_sensitive_context_keys_redacted() {
        let err = Error::unknown("boom", ErrorContext::new());
        let mut ctx = BTreeMap::new();
        ctx.insert("api_key".to_string(), serde_json::json!("sk-live-xyz"));
        ctx.insert("url".to_string(), serde_json::json!("https://example.com"));
        let record = classify(&err, ctx, None);
        assert!(!record.context.contains_key("api_key"));
        assert!(record.context.contains_key("url"));
    }

    #[test]
    fn test_envelope_hides_internals_by_default() {
        let err = Error::server("exploded", ErrorContext::new().with_source("pipeline"));
        let record = classify(&err, BTreeMap::new(), None);

        let public = record.to_envelope(false);
        assert!(public.stack_summary.is_empty());
        assert!(public.fault.is_none());

        let internal = record.to_envelope(true);
        assert!(!internal.stack_summary.is_empty());
        assert_eq!(internal.fault.as_deref(), Some("Server"));

        // Serialized public form must not even mention the hidden fields.
        let json = serde_json::to_string(&public).unwrap();
        assert!(!json.contains("stack_summary"));
        assert!(!json.contains("fault"));
    }

    #[test]
    fn test_serialization_fault_exposes_source_chain() {
        let cause = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = Error::Serialization(cause);
        let record = classify(&err, BTreeMap::new(), None);
        assert!(record.stack_summary.len() >= 1);
        assert_eq!(record.category, ErrorCategory::Server);
    }
}
