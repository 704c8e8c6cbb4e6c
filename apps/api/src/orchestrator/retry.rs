//! Bounded retry with exponential backoff for generation calls.
//!
//! Every attempt carries its own timeout; an elapsed timeout is a transient
//! failure like any other. Non-transient errors stop immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::llm_client::GenerationError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1000),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`: base, 2·base, 4·base, ...
    /// Saturates at `Duration::MAX`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff
            .checked_mul(1u32 << (attempt.saturating_sub(1)).min(16))
            .unwrap_or(Duration::MAX)
    }
}

#[derive(Debug)]
pub struct RetryFailure {
    pub error: GenerationError,
    pub attempts: u32,
}

impl RetryFailure {
    /// True when retries ran out on transient errors rather than stopping on a fatal one.
    pub fn exhausted(&self) -> bool {
        self.error.is_transient()
    }
}

pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = GenerationError::Timeout;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            let delay = policy.backoff(attempt - 1);
            warn!(
                "{} attempt {} failed ({}), retrying after {}ms...",
                label,
                attempt - 1,
                last_error.kind(),
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let error = match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => GenerationError::Timeout,
        };

        if !error.is_transient() {
            warn!("{} failed with a non-retryable error: {}", label, error);
            return Err(RetryFailure {
                error,
                attempts: attempt,
            });
        }
        last_error = error;
    }

    warn!("{} gave up after {} attempts: {}", label, max_attempts, last_error);
    Err(RetryFailure {
        error: last_error,
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1000),
            attempt_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let p = policy();
        assert_eq!(p.backoff(1), Duration::from_millis(1000));
        assert_eq!(p.backoff(2), Duration::from_millis(2000));
        assert_eq!(p.backoff(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_huge_base_backoff_saturates() {
        let p = RetryPolicy {
            base_backoff: Duration::from_millis(u64::MAX),
            ..policy()
        };
        assert_eq!(p.backoff(1), Duration::from_millis(u64::MAX));
        assert_eq!(p.backoff(5), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retry_then_succeed() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();
        let result = with_retry(&policy(), "test", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(GenerationError::RateLimited)
            } else {
                Ok("done")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000) && elapsed < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_report_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&policy(), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(GenerationError::Service {
                status: 503,
                message: "overloaded".into(),
            })
        })
        .await;
        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert!(failure.exhausted());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&policy(), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(GenerationError::Malformed("not json".into()))
        })
        .await;
        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert!(!failure.exhausted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_times_out_and_is_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retry(&policy(), "test", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
