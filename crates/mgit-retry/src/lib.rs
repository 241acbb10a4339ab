#![deny(unsafe_code)]
#![warn(missing_docs)]
//! mgit-retry
//!
//! Exponential backoff with jitter, shared by the provider drivers' (C2)
//! rate-limit handling and the resolver's (C4) `NetworkError`/`RateLimited`
//! retries, per spec.md §7 "Retries": base 1s, factor 2, jitter, cap 3
//! attempts. Grounded on the teacher's `abp-retry` crate's declared
//! dependency shape; that crate shipped as an empty placeholder, so the
//! policy and executor here are a fresh implementation over the same
//! `tokio` + `tracing` stack.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// A backoff policy: base delay, multiplicative factor, jitter, and a cap
/// on the number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Multiplicative growth factor applied per subsequent retry.
    pub factor: f64,
    /// Maximum number of attempts (the first try plus up to
    /// `max_attempts - 1` retries).
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            factor: 2.0,
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// The spec-mandated default: base 1s, factor 2, cap 3 attempts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The unjittered delay before the `attempt`-th retry (1-indexed: the
    /// delay before the *second* overall attempt is `delay_for_attempt(1)`).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.factor.powi(attempt.saturating_sub(1) as i32);
        Duration::from_secs_f64(self.base.as_secs_f64() * multiplier)
    }

    /// The delay before the `attempt`-th retry with up to full jitter
    /// applied (uniformly sampled in `[0, unjittered_delay]`).
    #[must_use]
    pub fn jittered_delay_for_attempt(&self, attempt: u32) -> Duration {
        let max = self.delay_for_attempt(attempt);
        let mut rng = rand::thread_rng();
        let jitter_fraction: f64 = rng.gen_range(0.5..=1.0);
        Duration::from_secs_f64(max.as_secs_f64() * jitter_fraction)
    }
}

/// Diagnostics describing how many attempts a retried operation took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryDiagnostics {
    /// Total attempts made, including the first (non-retry) attempt.
    pub attempts: u32,
    /// `attempts - 1`; the number of times the operation was retried.
    pub retries: u32,
}

/// Run `op` under `policy`, retrying while `is_retryable` returns `true` for
/// the error and attempts remain, sleeping a jittered exponential backoff
/// delay between attempts. Returns the diagnostics alongside the result so
/// callers can surface retry counts (spec.md §8 S6).
pub async fn retry_with_diagnostics<T, E, F, Fut>(
    policy: RetryPolicy,
    mut is_retryable: impl FnMut(&E) -> bool,
    mut op: F,
) -> (Result<T, E>, RetryDiagnostics)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => {
                return (
                    Ok(value),
                    RetryDiagnostics {
                        attempts: attempt,
                        retries: attempt - 1,
                    },
                );
            }
            Err(err) => {
                if attempt >= policy.max_attempts || !is_retryable(&err) {
                    return (
                        Err(err),
                        RetryDiagnostics {
                            attempts: attempt,
                            retries: attempt - 1,
                        },
                    );
                }
                let delay = policy.jittered_delay_for_attempt(attempt);
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying after transient failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Convenience wrapper over [`retry_with_diagnostics`] for callers that
/// don't need the attempt count.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, is_retryable: impl FnMut(&E) -> bool, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with_diagnostics(policy, is_retryable, op).await.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_exponentially() {
        let policy = RetryPolicy::new();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn jittered_delay_never_exceeds_unjittered() {
        let policy = RetryPolicy::new();
        for attempt in 1..=3 {
            let max = policy.delay_for_attempt(attempt);
            for _ in 0..50 {
                assert!(policy.jittered_delay_for_attempt(attempt) <= max);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_without_retry_on_first_try() {
        let policy = RetryPolicy::new();
        let (result, diag) = retry_with_diagnostics(policy, |_: &&str| true, || async { Ok::<_, &str>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(diag.attempts, 1);
        assert_eq!(diag.retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_up_to_max_attempts_then_gives_up() {
        let policy = RetryPolicy {
            base: Duration::from_millis(1),
            factor: 1.0,
            max_attempts: 3,
        };
        let calls = AtomicU32::new(0);
        let (result, diag) = retry_with_diagnostics(policy, |_: &&str| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>("rate limited") }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(diag.attempts, 3);
        assert_eq!(diag.retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_two_failures() {
        let policy = RetryPolicy {
            base: Duration::from_millis(1),
            factor: 1.0,
            max_attempts: 3,
        };
        let calls = AtomicU32::new(0);
        let (result, diag) = retry_with_diagnostics(policy, |_: &&str| true, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err::<i32, _>("rate limited")
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(diag.retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::new();
        let calls = AtomicU32::new(0);
        let (result, diag) = retry_with_diagnostics(policy, |_: &&str| false, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>("auth failed") }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(diag.attempts, 1);
    }
}
