//! Bounded retry for transient store failures.
//!
//! Modelled as an explicit loop with an attempt counter and a cancellation
//! token. Linear backoff: attempt n sleeps `base_delay × n` before trying
//! again. Non-transient errors and exhausted budgets propagate unchanged;
//! cancellation stops retrying and propagates the last error.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::StoreError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Zero-delay policy for tests.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay: Duration::ZERO,
        }
    }
}

/// Run `op` until it succeeds, fails terminally, or the retry budget is
/// spent. `op` is re-invoked from scratch on every attempt.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    what: &str,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.attempts => {
                warn!(what, attempt, error = %err, "transient store failure, retrying");
                let delay = policy.base_delay * attempt;
                tokio::select! {
                    _ = cancel.cancelled() => return Err(err),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn succeeds_first_try() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();
        let out = with_retry(RetryPolicy::immediate(3), &cancel, "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, StoreError>(7) }
        })
        .await
        .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_until_budget_spent() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();
        let err = with_retry(RetryPolicy::immediate(3), &cancel, "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(StoreError::Transient("reset".into())) }
        })
        .await
        .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_error_not_retried() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();
        let err = with_retry(RetryPolicy::immediate(3), &cancel, "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(StoreError::Unavailable) }
        })
        .await
        .unwrap_err();
        assert_eq!(err, StoreError::Unavailable);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_one_transient() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();
        let out = with_retry(RetryPolicy::immediate(3), &cancel, "op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(StoreError::Timeout)
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancellation_stops_retrying() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let policy = RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_secs(60),
        };
        let err = with_retry(policy, &cancel, "op", || async {
            Err::<(), _>(StoreError::Timeout)
        })
        .await
        .unwrap_err();
        assert_eq!(err, StoreError::Timeout);
    }
}
