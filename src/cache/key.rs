//! Cache key normalization.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Content-addressed cache key.
///
/// `hash` is a deterministic function of the canonical URL: equal logical
/// inputs always map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
    /// Canonical form of the input URL, kept for logging and diagnostics.
    pub canonical: String,
}

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

/// Normalize a resource identifier into a [`CacheKey`].
///
/// Pure and deterministic. Requires a well-formed http(s) URL with a host;
/// anything else fails with a `validation` fault. Canonicalization lowercases
/// scheme and host, drops the fragment and any default port, and normalizes an
/// empty path to `/` so `HTTP://Example.COM` and `http://example.com/` collide.
pub fn normalize(input: &str) -> Result<CacheKey> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(
            "resource identifier must not be empty",
            ErrorContext::new()
                .with_field_path("request.url")
                .with_source("normalizer"),
        ));
    }

    let mut url = Url::parse(trimmed).map_err(|e| {
        Error::validation(
            format!("not a well-formed URL: {}", e),
            ErrorContext::new()
                .with_field_path("request.url")
                .with_details(trimmed.to_string())
                .with_source("normalizer"),
        )
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::validation(
                format!("unsupported scheme '{}'", other),
                ErrorContext::new()
                    .with_field_path("request.url")
                    .with_source("normalizer"),
            ));
        }
    }
    if url.host_str().is_none() {
        return Err(Error::validation(
            "URL has no host",
            ErrorContext::new()
                .with_field_path("request.url")
                .with_source("normalizer"),
        ));
    }

    // Url already lowercases scheme and host and strips default ports;
    // the fragment is client-side state and never affects the fetched content.
    url.set_fragment(None);

    let canonical = url.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();

    Ok(CacheKey { hash, canonical })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_logical_inputs_share_a_key() {
        let a = normalize("HTTP://Example.COM").unwrap();
        let b = normalize("http://example.com/").unwrap();
        let c = normalize("http://example.com:80/#section").unwrap();
        assert_eq!(a.hash, b.hash);
        assert_eq!(b.hash, c.hash);
    }

    #[test]
    fn test_distinct_inputs_get_distinct_keys() {
        let a = normalize("https://example.com/a").unwrap();
        let b = normalize("https://example.com/b").unwrap();
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_query_is_significant() {
        let a = normalize("https://example.com/?page=1").unwrap();
        let b = normalize("https://example.com/?page=2").unwrap();
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_malformed_input_is_a_validation_fault() {
        for bad in ["", "   ", "not a url", "ftp://example.com", "https://"] {
            let err = normalize(bad).unwrap_err();
            assert_eq!(
                err.category(),
                crate::classify::ErrorCategory::Validation,
                "input {:?} should fail validation",
                bad
            );
        }
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let a = normalize("https://example.com/path?q=1").unwrap();
        let b = normalize("https://example.com/path?q=1").unwrap();
        assert_eq!(a, b);
    }
}
