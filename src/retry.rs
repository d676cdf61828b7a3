//! Fixed-delay retry policy
//!
//! A single policy type used at every transient call site: the per-batch
//! source query and the warehouse connect. Each call site supplies its own
//! predicate deciding which errors are worth another attempt. Calls that are
//! never retried, such as the loader's warehouse calls, still go through
//! [`with_timeout`].

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy with a fixed attempt budget and a fixed delay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    max_attempts: u32,
    /// Delay between consecutive attempts
    delay: Duration,
    /// Upper bound for a single attempt
    call_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(5))
    }
}

impl RetryPolicy {
    /// Create a fixed-delay policy
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            call_timeout: None,
        }
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Bound every attempt with a timeout
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Total attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between attempts
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Per-attempt timeout
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    /// Run `op`, retrying errors accepted by `should_retry`.
    ///
    /// Errors rejected by the predicate propagate unchanged after the first
    /// failure. When the budget is spent the last error is wrapped in
    /// [`Error::RetriesExhausted`].
    pub async fn run<T, F, Fut, P>(&self, operation: &str, should_retry: P, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&Error) -> bool,
    {
        let mut attempt = 1;

        loop {
            let error = match self.attempt(operation, op()).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !should_retry(&error) {
                return Err(error);
            }

            if attempt >= self.max_attempts {
                return Err(Error::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    source: Box::new(error),
                });
            }

            warn!(
                operation,
                attempt,
                max_attempts = self.max_attempts,
                error = %error,
                "Transient failure, retrying in {:?}",
                self.delay
            );
            tokio::time::sleep(self.delay).await;
            attempt += 1;
        }
    }

    /// Run `op`, retrying transient errors only
    pub async fn run_transient<T, F, Fut>(&self, operation: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run(operation, Error::is_transient, op).await
    }

    async fn attempt<T, Fut>(&self, operation: &str, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        with_timeout(operation, self.call_timeout, fut).await
    }
}

/// Bound a single call by `timeout`, mapping expiry to [`Error::Timeout`]
pub async fn with_timeout<T, Fut>(operation: &str, timeout: Option<Duration>, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| Error::Timeout {
                operation: operation.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })?,
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use test_case::test_case;
    use tokio::time::Instant;

    fn transient() -> Error {
        Error::http_status(503, "Service Unavailable")
    }

    /// Fails transiently `failures` times, then succeeds
    async fn flaky(calls: &AtomicU32, failures: u32) -> Result<&'static str> {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < failures {
            Err(transient())
        } else {
            Ok("ok")
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay(), Duration::from_secs(5));
        assert_eq!(policy.call_timeout(), None);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::fixed(0, Duration::ZERO).max_attempts(), 1);
        assert_eq!(RetryPolicy::no_retry().max_attempts(), 1);
    }

    #[test_case(0 ; "first attempt succeeds")]
    #[test_case(1 ; "one failure")]
    #[test_case(2 ; "two failures")]
    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_k_failures(k: u32) {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(5));
        let calls = &AtomicU32::new(0);
        let start = Instant::now();

        let result = policy.run_transient("fetch", move || flaky(calls, k)).await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), k + 1);
        assert_eq!(start.elapsed(), Duration::from_secs(5) * k);
    }

    #[test_case(3 ; "exactly the budget")]
    #[test_case(10 ; "beyond the budget")]
    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts(k: u32) {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(5));
        let calls = &AtomicU32::new(0);
        let start = Instant::now();

        let err = policy
            .run_transient("fetch", move || flaky(calls, k))
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        match err {
            Error::RetriesExhausted {
                operation,
                attempts,
                source,
            } => {
                assert_eq!(operation, "fetch");
                assert_eq!(attempts, 3);
                assert!(source.is_transient());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_propagates_immediately() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(5));
        let calls = &AtomicU32::new(0);
        let start = Instant::now();

        let err = policy
            .run_transient("fetch", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::source("Neo.ClientError.Statement.SyntaxError", "bad"))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(err, Error::Source { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_predicate_retries_everything() {
        let policy = RetryPolicy::fixed(2, Duration::from_secs(1));
        let calls = &AtomicU32::new(0);

        let result = policy
            .run(
                "connect",
                |_| true,
                move || async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(Error::config("not yet"))
                    } else {
                        Ok(42)
                    }
                },
            )
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_is_transient() {
        let policy =
            RetryPolicy::fixed(2, Duration::from_secs(1)).with_call_timeout(Duration::from_secs(30));
        let calls = &AtomicU32::new(0);

        let err = policy
            .run_transient("load", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match err {
            Error::RetriesExhausted { source, .. } => {
                assert!(matches!(*source, Error::Timeout { timeout_ms: 30_000, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout() {
        let quick = with_timeout("copy", Some(Duration::from_secs(5)), async { Ok(7) }).await;
        assert_eq!(quick.unwrap(), 7);

        let unbounded = with_timeout("copy", None, async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        })
        .await;
        assert!(unbounded.is_ok());

        let stalled =
            with_timeout("copy", Some(Duration::from_secs(5)), std::future::pending::<Result<()>>())
                .await;
        assert!(matches!(
            stalled,
            Err(Error::Timeout { ref operation, timeout_ms: 5_000 }) if operation == "copy"
        ));
    }
}
