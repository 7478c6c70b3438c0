//! Bounded retry with jittered exponential backoff.
//!
//! Used around transient cache/lock/broker calls so that a blip does not
//! surface to callers immediately. Non-retryable errors (exhaustion,
//! validation, ...) pass through untouched on the first attempt.

use std::future::Future;
use std::time::Duration;

use rand::RngExt;
use tracing::warn;

use crate::result::AppResult;

/// Base delay before the first retry. Doubles per attempt.
const BASE_DELAY_MS: u64 = 25;
/// Upper bound for the random jitter added to each delay.
const JITTER_MS: u64 = 25;

/// Run `op`, retrying up to `retries` additional times while it fails with
/// a retryable error kind.
pub async fn with_backoff<T, F, Fut>(name: &str, retries: u32, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < retries => {
                attempt += 1;
                let jitter = rand::rng().random_range(0..=JITTER_MS);
                let delay = Duration::from_millis(BASE_DELAY_MS * (1 << (attempt - 1)) + jitter);
                warn!(
                    operation = name,
                    attempt,
                    retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let result = with_backoff("op", 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, AppError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_backoff("op", 3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AppError::cache("flaky"))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_terminal_errors() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = with_backoff("op", 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::exhausted("gone")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = with_backoff("op", 2, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::cache("down")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
