use crate::utils::error::{CloudError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

const BACKOFF_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub period: Duration,
    pub max_period: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, period: Duration, max_period: Duration) -> Self {
        Self {
            timeout,
            period,
            max_period,
        }
    }

    fn next_period(&self, current: Duration) -> Duration {
        current.mul_f64(BACKOFF_FACTOR).min(self.max_period)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(1200),
            Duration::from_millis(500),
            Duration::from_secs(5),
        )
    }
}

/// Calls `check` until it yields a value, sleeping with backoff in between.
/// A check error ends the wait immediately.
pub async fn retry_until<T, F, Fut>(policy: &RetryPolicy, description: &str, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let mut period = policy.period;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        if let Some(value) = check().await? {
            tracing::debug!(%description, attempts, "condition met");
            return Ok(value);
        }
        let waited = started.elapsed();
        if waited >= policy.timeout {
            tracing::warn!(%description, attempts, ?waited, "gave up waiting");
            return Err(CloudError::Timeout {
                operation: description.to_string(),
                waited,
            });
        }
        let remaining = policy.timeout - waited;
        tokio::time::sleep(period.min(remaining)).await;
        period = policy.next_period(period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(200),
            Duration::from_millis(5),
            Duration::from_millis(20),
        )
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(
            Duration::from_secs(60),
            Duration::from_secs(2),
            Duration::from_secs(4),
        );
        assert_eq!(policy.next_period(Duration::from_secs(2)), Duration::from_secs(3));
        assert_eq!(policy.next_period(Duration::from_secs(3)), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_returns_value_once_ready() {
        let calls = &AtomicUsize::new(0);
        let value = retry_until(&fast(), "counter", || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok((n >= 3).then_some(n))
        })
        .await
        .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_times_out() {
        let err = retry_until(&fast(), "never", || async { Ok::<Option<()>, _>(None) })
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Timeout { ref operation, .. } if operation == "never"));
    }

    #[tokio::test]
    async fn test_check_error_aborts() {
        let calls = &AtomicUsize::new(0);
        let err = retry_until(&fast(), "broken", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<Option<()>, _>(CloudError::illegal_state("node went into error"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, CloudError::IllegalState { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
