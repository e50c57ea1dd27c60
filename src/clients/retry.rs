//! Timeout and retry wrapper for external client calls.
//!
//! Every model and store call the engine makes goes through
//! [`call_with_retry`]: the attempt is bounded by a timeout, and transient
//! failures are retried a bounded number of times. Non-retryable failures
//! return immediately.

use std::future::Future;
use std::time::Duration;

/// Bounds on a single external call: per-attempt timeout, retry count,
/// and the pause between attempts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Ceiling for one attempt; an attempt past this counts as timed out.
    pub call_timeout: Duration,
    /// Retries after the first attempt (2 means up to 3 attempts total).
    pub max_retries: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            max_retries: 2,
            backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(call_timeout: Duration, max_retries: u32) -> Self {
        Self {
            call_timeout,
            max_retries,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Failure classification for the retry loop.
///
/// `timed_out()` is the error an elapsed attempt is reported as, so the
/// loop can treat timeouts like any other failure of that error family.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
    fn timed_out() -> Self;
}

/// Runs `attempt` under the policy's timeout, retrying transient failures.
///
/// Returns the first success, the first non-retryable failure, or the
/// last failure once retries are exhausted. Each retry is logged with the
/// call label.
pub async fn call_with_retry<T, E, Fut>(
    policy: &RetryPolicy,
    call: &'static str,
    mut attempt: impl FnMut() -> Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        let outcome = match tokio::time::timeout(policy.call_timeout, attempt()).await {
            Ok(result) => result,
            Err(_) => Err(E::timed_out()),
        };
        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempts <= policy.max_retries => {
                tracing::warn!(call, attempt = attempts, error = %err, "retrying external call");
                tokio::time::sleep(policy.backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum FakeError {
        Transient,
        Fatal,
        TimedOut,
    }

    impl std::fmt::Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Retryable for FakeError {
        fn is_retryable(&self) -> bool {
            matches!(self, FakeError::Transient | FakeError::TimedOut)
        }
        fn timed_out() -> Self {
            FakeError::TimedOut
        }
    }

    fn quick_policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(50), 2).with_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn exhausts_retries_on_persistent_transient_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FakeError> = call_with_retry(&quick_policy(), "fake", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FakeError::Transient) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, FakeError> = call_with_retry(&quick_policy(), "fake", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(FakeError::Transient)
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fatal_failure_returns_without_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FakeError> = call_with_retry(&quick_policy(), "fake", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FakeError::Fatal) }
        })
        .await;
        assert!(matches!(result, Err(FakeError::Fatal)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_attempt_is_reported_as_timeout() {
        let policy = RetryPolicy::new(Duration::from_millis(5), 0);
        let result: Result<(), FakeError> = call_with_retry(&policy, "fake", || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(FakeError::TimedOut)));
    }
}
