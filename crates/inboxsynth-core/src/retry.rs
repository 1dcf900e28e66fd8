//! Retry, circuit breaking, and idempotency (C2). Every external-call
//! stage (mail fetch, LLM call, constrained write) owns one
//! [`RetryPolicy`] and, where failures should eventually stop being
//! attempted at all, one [`CircuitBreaker`].

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::model::IdempotencyKey;

/// A stage's breaker is open; callers short-circuit to a stage-specific
/// fallback or surface this to the user.
#[derive(Debug, Clone, thiserror::Error)]
#[error("circuit open for stage {0}")]
pub struct CircuitOpen(pub &'static str);

/// Exponential backoff with jitter and a non-retryable predicate. Retry
/// on transient failures (5xx, timeouts, "database is locked"); never on
/// permanent ones (4xx, schema errors) — the caller supplies the
/// predicate since retryability depends on the error type per call site.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Matches spec.md §4.1's lock-retry policy: base 10ms, jittered,
    /// capped, bounded retry count.
    pub fn db_lock_default() -> Self {
        RetryPolicy::new(6, Duration::from_millis(10), Duration::from_millis(500))
    }

    pub fn adapter_default() -> Self {
        RetryPolicy::new(3, Duration::from_millis(200), Duration::from_secs(4))
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_millis() as u64 * 2u64.saturating_pow(attempt.min(16));
        let capped = exp.min(self.max_delay.as_millis() as u64);
        let jittered = rand::thread_rng().gen_range(0..=capped.max(1));
        Duration::from_millis(jittered)
    }

    /// Runs `op` until it succeeds, `is_retryable` returns false, or
    /// `max_attempts` is exhausted. `op` receives the 1-based attempt
    /// number so callers can log/tag retries.
    pub fn execute<T, E>(
        &self,
        is_retryable: impl Fn(&E) -> bool,
        mut op: impl FnMut(u32) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt >= self.max_attempts || !is_retryable(&e) {
                        return Err(e);
                    }
                    thread::sleep(self.backoff_for(attempt));
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// One probe allowed while half-open; set while that probe is in
    /// flight so concurrent callers don't pile onto the same probe.
    probe_in_flight: bool,
}

/// Opens after `failure_threshold` consecutive failures; after
/// `reset_timeout` elapses, allows exactly one half-open probe through.
pub struct CircuitBreaker {
    name: &'static str,
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, failure_threshold: u32, reset_timeout: Duration) -> Self {
        CircuitBreaker {
            name,
            failure_threshold,
            reset_timeout,
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Must be called before attempting the guarded operation. Returns
    /// `Err(CircuitOpen)` if the stage should short-circuit right now.
    pub fn try_acquire(&self) -> Result<(), CircuitOpen> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.reset_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    tracing::info!(stage = self.name, "circuit half-open, probe allowed");
                    Ok(())
                } else {
                    Err(CircuitOpen(self.name))
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(CircuitOpen(self.name))
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!(stage = self.name, "circuit closed after success");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.probe_in_flight = false;
        inner.consecutive_failures += 1;
        if inner.state == CircuitState::HalfOpen
            || inner.consecutive_failures >= self.failure_threshold
        {
            if inner.state != CircuitState::Open {
                tracing::warn!(
                    stage = self.name,
                    consecutive_failures = inner.consecutive_failures,
                    "circuit opened"
                );
            }
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock().state == CircuitState::Open
    }
}

/// Batch-scoped dedup set keyed by [`IdempotencyKey`]. Reset at batch
/// start; durable cross-batch dedup is deferred to external storage
/// (spec.md §9, open question).
#[derive(Default)]
pub struct IdempotencySet {
    seen: Mutex<HashSet<IdempotencyKey>>,
}

impl IdempotencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `key` was already seen (and leaves it recorded);
    /// otherwise records it and returns `false`.
    pub fn is_duplicate(&self, key: &IdempotencyKey) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|p| p.into_inner());
        !seen.insert(key.clone())
    }
}
