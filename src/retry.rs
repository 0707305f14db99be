//! Bounded re-execution with exponential backoff and jitter.
//!
//! The engine wraps an operation supplier: the blocking variant sleeps on
//! the calling thread between attempts, the futures variant schedules a
//! non-blocking timer. Retryability is decided from the failure's root
//! cause against the policy's allow-lists.

use crate::error::Error;
use crate::transport::TransportKind;
use crate::Result;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// A retryable status code: a single code or a closed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRange {
    Single(u16),
    Span(u16, u16),
}

impl StatusRange {
    pub fn contains(&self, status: u16) -> bool {
        match *self {
            StatusRange::Single(code) => status == code,
            StatusRange::Span(lo, hi) => (lo..=hi).contains(&status),
        }
    }
}

/// Retry configuration. `max_attempts` is always at least 1.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    jitter_factor: f64,
    retryable_kinds: HashSet<TransportKind>,
    retryable_statuses: Vec<StatusRange>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
            retryable_kinds: HashSet::from([
                TransportKind::Connect,
                TransportKind::Timeout,
                TransportKind::Io,
            ]),
            retryable_statuses: Vec::new(),
        }
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Symmetric jitter magnitude relative to the computed delay. Zero
    /// disables jitter.
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    pub fn retry_on_kinds(mut self, kinds: impl IntoIterator<Item = TransportKind>) -> Self {
        self.retryable_kinds = kinds.into_iter().collect();
        self
    }

    pub fn retry_on_status(mut self, range: StatusRange) -> Self {
        self.retryable_statuses.push(range);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff delay before the attempt following failure number `attempt`
    /// (1-based): `min(initial * multiplier^(attempt-1), max)`, then jitter,
    /// re-clamped to `[0, max]`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let mut delay = base.min(self.max_delay.as_secs_f64());
        if self.jitter_factor > 0.0 {
            let swing = (fastrand::f64() * 2.0 - 1.0) * delay * self.jitter_factor;
            delay = (delay + swing).clamp(0.0, self.max_delay.as_secs_f64());
        }
        Duration::from_secs_f64(delay)
    }

    /// Whether the failure's root cause matches the policy's allow-lists.
    /// Codec and descriptor errors are never retryable.
    pub fn is_retryable(&self, error: &Error) -> bool {
        match error.root_cause() {
            Error::Transport(t) => self.retryable_kinds.contains(&t.kind()),
            Error::HttpStatus(failure) => self
                .retryable_statuses
                .iter()
                .any(|range| range.contains(failure.status)),
            _ => false,
        }
    }
}

/// Blocking retry: sleeps on the calling thread between attempts. Gives up
/// with [`Error::RetryExhausted`] on a non-retryable failure or once
/// `max_attempts` is reached.
pub fn run_blocking<T, F>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 1u32;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !policy.is_retryable(&error) || attempt >= policy.max_attempts {
                    return Err(Error::RetryExhausted {
                        attempts: attempt,
                        source: Box::new(error),
                    });
                }
                let delay = policy.delay_for(attempt);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after retryable failure"
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

/// Futures retry: a non-blocking timer schedules each next attempt, so
/// intermediate attempts never occupy a thread.
pub async fn run<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !policy.is_retryable(&error) || attempt >= policy.max_attempts {
                    return Err(Error::RetryExhausted {
                        attempts: attempt,
                        source: Box::new(error),
                    });
                }
                let delay = policy.delay_for(attempt);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after retryable failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusFailure;
    use crate::transport::{RequestEcho, TransportError};

    fn timeout_error() -> Error {
        Error::Transport(TransportError::Timeout("deadline exceeded".into()))
    }

    fn status_error(status: u16) -> Error {
        Error::http_status(StatusFailure {
            status,
            body: String::new(),
            headers: Vec::new(),
            request: RequestEcho {
                verb: "GET".into(),
                url: "http://api.test/x".into(),
                headers: Vec::new(),
            },
        })
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3)
            .initial_delay(Duration::from_millis(100))
            .backoff_multiplier(2.0)
            .jitter_factor(0.0)
    }

    #[test]
    fn delays_follow_the_backoff_formula() {
        let p = policy();
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn delay_is_capped_by_max_delay() {
        let p = policy().max_delay(Duration::from_millis(150));
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(150));
        assert_eq!(p.delay_for(9), Duration::from_millis(150));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let p = policy().jitter_factor(0.5);
        for _ in 0..200 {
            let d = p.delay_for(1).as_secs_f64();
            assert!((0.05..=0.15).contains(&d), "delay out of bounds: {d}");
        }
    }

    #[test]
    fn max_attempts_is_at_least_one() {
        assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
    }

    #[test]
    fn retryability_follows_kind_and_status_allow_lists() {
        let p = policy().retry_on_status(StatusRange::Span(500, 599));
        assert!(p.is_retryable(&timeout_error()));
        assert!(p.is_retryable(&status_error(503)));
        assert!(!p.is_retryable(&status_error(404)));
        assert!(!p.is_retryable(&Error::UnsupportedShape {
            declared: "set<T>".into()
        }));
    }

    #[test]
    fn single_status_range_matches_one_code() {
        let range = StatusRange::Single(429);
        assert!(range.contains(429));
        assert!(!range.contains(430));
    }

    #[test]
    fn blocking_retry_exhausts_after_max_attempts() {
        let p = policy()
            .initial_delay(Duration::from_millis(1))
            .retry_on_kinds([TransportKind::Timeout]);
        let mut calls = 0u32;
        let result: Result<()> = run_blocking(&p, || {
            calls += 1;
            Err(timeout_error())
        });
        match result.unwrap_err() {
            Error::RetryExhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, Error::Transport(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls, 3);
    }

    #[test]
    fn non_retryable_failure_surfaces_after_one_attempt() {
        let p = policy();
        let mut calls = 0u32;
        let result: Result<()> = run_blocking(&p, || {
            calls += 1;
            Err(status_error(400))
        });
        match result.unwrap_err() {
            Error::RetryExhausted { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn blocking_retry_recovers_on_a_later_attempt() {
        let p = policy().initial_delay(Duration::from_millis(1));
        let mut calls = 0u32;
        let result = run_blocking(&p, || {
            calls += 1;
            if calls < 3 {
                Err(timeout_error())
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn async_retry_sleeps_the_backoff_schedule() {
        let p = policy();
        let started = tokio::time::Instant::now();
        let mut calls = 0u32;
        let result: Result<()> = run(&p, || {
            calls += 1;
            async { Err(timeout_error()) }
        })
        .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::RetryExhausted { attempts: 3, .. }
        ));
        // 100ms + 200ms of virtual timer time between the three attempts.
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }
}
