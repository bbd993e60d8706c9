//! Bounded retry of transient failures.

use std::future::Future;

use marquee_core::{MarqueeError, RetryConfig};

/// Final failure of a retried operation.
#[derive(Debug, Clone)]
pub struct RetryExhausted {
    pub error: MarqueeError,
    /// Total attempts made, including the first.
    pub attempts: u32,
}

/// Run `op`, retrying transient errors with exponential backoff.
///
/// Non-retryable errors return immediately. At most `policy.max_retries`
/// retries follow the first attempt.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryConfig,
    operation: &'static str,
    mut on_retry: impl FnMut(),
    mut op: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MarqueeError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_retryable() && attempt <= policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient failure, retrying"
                );
                on_retry();
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                return Err(RetryExhausted {
                    error,
                    attempts: attempt,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::{IndexError, QueueError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unavailable() -> MarqueeError {
        QueueError::Unavailable {
            reason: "broker down".to_string(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let mut retries = 0;
        let result = retry_transient(&RetryConfig::immediate(3), "enqueue", || retries += 1, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(unavailable())
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries, 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_bound() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> =
            retry_transient(&RetryConfig::immediate(2), "enqueue", || {}, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(unavailable())
            })
            .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> =
            retry_transient(&RetryConfig::immediate(5), "upsert", || {}, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(IndexError::Schema {
                    reason: "mapping".to_string(),
                }
                .into())
            })
            .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
