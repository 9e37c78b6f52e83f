//! Per-dependency circuit breaker: closed / open / half-open.

use crate::{Error, ErrorContext, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a probe.
    pub reset_timeout: Duration,
    /// Deadline applied to every guarded call; exceeding it is a failure.
    pub call_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl BreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

/// Read-only view for the health monitor and response metadata.
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    pub dependency: String,
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Normal,
    Probe,
}

/// Guards calls to one external dependency.
///
/// All transitions happen under one mutex, so no two tasks can both decide
/// closed -> open from the same failure-count race, and half-open admits
/// exactly one probe at a time.
pub struct CircuitBreaker {
    dependency: String,
    cfg: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(dependency: impl Into<String>, cfg: BreakerConfig) -> Self {
        Self {
            dependency: dependency.into(),
            cfg,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// Execute `op` under breaker protection with the configured deadline.
    ///
    /// Open state short-circuits without invoking `op`. A timed-out `op`
    /// counts as a failure and surfaces as a `network`-category fault.
    pub async fn call<F, T>(&self, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let kind = self.try_acquire()?;
        let mut guard = CallGuard {
            breaker: self,
            kind,
            settled: false,
        };

        match tokio::time::timeout(self.cfg.call_timeout, op).await {
            Ok(Ok(value)) => {
                guard.succeed();
                Ok(value)
            }
            Ok(Err(e)) => {
                guard.fail();
                Err(e)
            }
            Err(_) => {
                guard.fail();
                Err(Error::Timeout {
                    dependency: self.dependency.clone(),
                    after: self.cfg.call_timeout,
                })
            }
        }
    }

    fn try_acquire(&self) -> Result<CallKind> {
        let mut inner = self.lock()?;
        match inner.state {
            BreakerState::Closed => Ok(CallKind::Normal),
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.cfg.reset_timeout {
                    // A probe from an earlier half-open phase may still be
                    // running if the circuit re-opened underneath it; never
                    // run two probes against the dependency at once.
                    if inner.probe_in_flight {
                        return Err(self.short_circuit(None));
                    }
                    tracing::info!(dependency = %self.dependency, "circuit transitioning open -> half-open");
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_in_flight = true;
                    Ok(CallKind::Probe)
                } else {
                    let remaining = self.cfg.reset_timeout - elapsed;
                    Err(self.short_circuit(Some(remaining)))
                }
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(self.short_circuit(None))
                } else {
                    inner.probe_in_flight = true;
                    Ok(CallKind::Probe)
                }
            }
        }
    }

    fn short_circuit(&self, retry_in: Option<Duration>) -> Error {
        Error::BreakerOpen {
            dependency: self.dependency.clone(),
            retry_in_ms: retry_in.map(|d| d.as_millis() as u64),
        }
    }

    fn on_success(&self, kind: CallKind) {
        if let Ok(mut inner) = self.lock() {
            if kind == CallKind::Probe {
                tracing::info!(dependency = %self.dependency, "probe succeeded; circuit half-open -> closed");
            }
            inner.state = BreakerState::Closed;
            inner.consecutive_failures = 0;
            inner.opened_at = None;
            inner.probe_in_flight = false;
        }
    }

    fn on_failure(&self, kind: CallKind) {
        if let Ok(mut inner) = self.lock() {
            // Only the probe itself settles the probe slot; a normal call
            // failing while a probe runs must not free it.
            if kind == CallKind::Probe {
                inner.probe_in_flight = false;
            }
            match (kind, inner.state) {
                (CallKind::Probe, _) | (_, BreakerState::HalfOpen) => {
                    tracing::warn!(dependency = %self.dependency, "probe failed; circuit re-opened");
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
                _ => {
                    inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                    if inner.consecutive_failures >= self.cfg.failure_threshold {
                        tracing::warn!(
                            dependency = %self.dependency,
                            failures = inner.consecutive_failures,
                            "failure threshold reached; circuit closed -> open"
                        );
                        inner.state = BreakerState::Open;
                        inner.opened_at = Some(Instant::now());
                    }
                }
            }
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let (state, consecutive_failures, open_remaining_ms) = match self.lock() {
            Ok(inner) => {
                let remaining = if inner.state == BreakerState::Open {
                    inner.opened_at.and_then(|t| {
                        self.cfg
                            .reset_timeout
                            .checked_sub(t.elapsed())
                            .map(|d| d.as_millis() as u64)
                    })
                } else {
                    None
                };
                (inner.state, inner.consecutive_failures, remaining)
            }
            Err(_) => (BreakerState::Closed, 0, None),
        };
        BreakerSnapshot {
            dependency: self.dependency.clone(),
            state,
            consecutive_failures,
            failure_threshold: self.cfg.failure_threshold,
            open_remaining_ms,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| {
            Error::server(
                "circuit breaker lock poisoned",
                ErrorContext::new().with_source("circuit_breaker"),
            )
        })
    }
}

/// Settles the breaker exactly once per call. An abandoned probe (caller
/// dropped mid-call) must not wedge half-open, so an unsettled drop counts
/// as a failure.
struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
    kind: CallKind,
    settled: bool,
}

impl CallGuard<'_> {
    fn succeed(&mut self) {
        self.settled = true;
        self.breaker.on_success(self.kind);
    }

    fn fail(&mut self) {
        self.settled = true;
        self.breaker.on_failure(self.kind);
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_failure(self.kind);
        }
    }
}

/// Breakers keyed per dependency name, so independent external dependencies
/// never share failure counts.
pub struct BreakerRegistry {
    default_cfg: BreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(default_cfg: BreakerConfig) -> Self {
        Self {
            default_cfg,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the breaker for `dependency`.
    pub fn get(&self, dependency: &str) -> Arc<CircuitBreaker> {
        let mut breakers = match self.breakers.lock() {
            Ok(b) => b,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(breakers.entry(dependency.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(dependency, self.default_cfg.clone()))
        }))
    }

    /// Register a breaker with a dependency-specific config.
    pub fn insert(&self, dependency: &str, cfg: BreakerConfig) {
        let mut breakers = match self.breakers.lock() {
            Ok(b) => b,
            Err(poisoned) => poisoned.into_inner(),
        };
        breakers.insert(
            dependency.to_string(),
            Arc::new(CircuitBreaker::new(dependency, cfg)),
        );
    }

    /// Guarded call through the named dependency's breaker.
    pub async fn call<F, T>(&self, dependency: &str, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.get(dependency).call(op).await
    }

    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        match self.breakers.lock() {
            Ok(breakers) => {
                let mut snaps: Vec<_> = breakers.values().map(|b| b.snapshot()).collect();
                snaps.sort_by(|a, b| a.dependency.cmp(&b.dependency));
                snaps
            }
            Err(_) => Vec::new(),
        }
    }
}
