//! Bounded retry with exponential backoff for network-backed stores.
//!
//! A [`RetryPolicy`] runs an async operation up to `max_attempts` times,
//! sleeping `base_delay * 2^attempt` between attempts (no sleep after the last
//! one). An optional overall deadline bounds the whole sequence, sleeps
//! included. Exhaustion surfaces [`RagError::OperationFailed`] carrying the
//! last error; non-retryable errors are returned as-is on first sight.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, warn};

use crate::error::{RagError, Result};

/// Default number of attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default overall deadline for one retried operation.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// How many times to try a network call and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each subsequent retry.
    pub base_delay: Duration,
    /// Upper bound on the time spent across all attempts and sleeps.
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            deadline: Some(DEFAULT_DEADLINE),
        }
    }
}

impl RetryPolicy {
    /// Create a policy without an overall deadline.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay, deadline: None }
    }

    /// Bound the whole retried operation by `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Delay to wait after the failed attempt with zero-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `op` under this policy.
    ///
    /// `operation` names the call in logs and in the resulting error.
    ///
    /// # Errors
    ///
    /// - The operation's own error, unchanged, if it is not retryable.
    /// - [`RagError::OperationFailed`] once attempts or the deadline run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let deadline = self.deadline.map(|d| Instant::now() + d);
        let mut attempt: u32 = 0;

        loop {
            let outcome = match deadline {
                Some(at) => tokio::time::timeout_at(at, op())
                    .await
                    .unwrap_or_else(|_| Err(self.timeout_error(operation))),
                None => op().await,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            let delay = self.delay_for(attempt);
            attempt += 1;

            let out_of_time = deadline.is_some_and(|at| Instant::now() + delay >= at);
            if attempt >= max_attempts || out_of_time {
                error!(operation, attempts = attempt, error = %err, "operation failed, giving up");
                return Err(RagError::OperationFailed {
                    operation: operation.to_string(),
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            warn!(operation, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
            tokio::time::sleep(delay).await;
        }
    }

    fn timeout_error(&self, operation: &str) -> RagError {
        RagError::Timeout {
            operation: operation.to_string(),
            elapsed: self.deadline.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn transient() -> RagError {
        RagError::VectorStoreError { backend: "test".into(), message: "unavailable".into() }
    }

    #[test]
    fn delays_double_from_the_base() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_does_not_sleep() {
        let policy = RetryPolicy::default();
        let started = Instant::now();
        let value = policy.run("op", || async { Ok::<_, RagError>(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_sleep_only_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let err = policy
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(transient()) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms + 200ms, nothing after the final attempt.
        assert_eq!(started.elapsed(), Duration::from_millis(300));
        assert!(matches!(err, RagError::OperationFailed { attempts: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_is_returned_immediately() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let err = policy
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(RagError::DimensionMismatch { expected: 2, actual: 3 }) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, RagError::DimensionMismatch { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_stops_a_hanging_call() {
        let policy =
            RetryPolicy::new(3, Duration::from_millis(100)).with_deadline(Duration::from_secs(1));
        let started = Instant::now();

        let err = policy
            .run("op", || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, RagError>(())
            })
            .await
            .unwrap_err();

        assert_eq!(started.elapsed(), Duration::from_secs(1));
        match err {
            RagError::OperationFailed { attempts, source, .. } => {
                assert_eq!(attempts, 1);
                assert!(matches!(*source, RagError::Timeout { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
