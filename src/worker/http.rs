//! Default reqwest-based extraction worker.

use super::{ExtractionWorker, RawContent};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpWorkerConfig {
    pub timeout: Duration,
    pub user_agent: String,
    /// Responses above this size are refused rather than buffered.
    pub max_body_bytes: usize,
}

impl Default for HttpWorkerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: format!("brandlens/{}", env!("CARGO_PKG_VERSION")),
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Plain GET fetcher. No rendering, no scripting; a headless-browser worker
/// would implement the same trait.
pub struct HttpWorker {
    client: reqwest::Client,
    cfg: HttpWorkerConfig,
}

impl HttpWorker {
    pub fn new(cfg: HttpWorkerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .user_agent(cfg.user_agent.clone())
            .build()
            .map_err(|e| {
                Error::server(
                    format!("failed to build HTTP client: {}", e),
                    ErrorContext::new().with_source("http_worker"),
                )
            })?;
        Ok(Self { client, cfg })
    }

    fn network_fault(&self, url: &str, e: reqwest::Error) -> Error {
        let ctx = ErrorContext::new()
            .with_details(url.to_string())
            .with_source("http_worker");
        if e.is_timeout() {
            Error::Timeout {
                dependency: "worker".into(),
                after: self.cfg.timeout,
            }
        } else if e.is_connect() || e.is_request() {
            Error::network(format!("request failed: {}", e), ctx)
        } else {
            Error::upstream(format!("upstream error: {}", e), ctx)
        }
    }
}

#[async_trait]
impl ExtractionWorker for HttpWorker {
    async fn fetch(&self, url: &str) -> Result<RawContent> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.network_fault(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::upstream(
                format!("upstream returned HTTP {}", status.as_u16()),
                ErrorContext::new()
                    .with_details(url.to_string())
                    .with_source("http_worker"),
            ));
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.cfg.max_body_bytes {
                return Err(Error::upstream(
                    format!("response body too large: {} bytes", len),
                    ErrorContext::new()
                        .with_details(url.to_string())
                        .with_source("http_worker"),
                ));
            }
        }

        let resolved_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| self.network_fault(url, e))?;

        if html.trim().is_empty() {
            return Err(Error::upstream(
                "upstream returned an empty body",
                ErrorContext::new()
                    .with_details(url.to_string())
                    .with_source("http_worker"),
            ));
        }

        Ok(RawContent {
            html,
            screenshot: None,
            resolved_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let cfg = HttpWorkerConfig::default();
        assert_eq!(cfg.timeout, Duration::from_secs(15));
        assert!(cfg.user_agent.starts_with("brandlens/"));
    }

    #[test]
    fn test_worker_builds_with_defaults() {
        assert!(HttpWorker::new(HttpWorkerConfig::default()).is_ok());
    }
}
