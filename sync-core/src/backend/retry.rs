//! Shared retry helper used by both backend client variants.
//!
//! Retries connect/timeout errors only; a non-2xx HTTP response is a
//! terminal failure returned up immediately, never retried. `retry_count`
//! is a total-attempts budget, not a number of retries beyond the first.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

pub async fn with_retry<T, F, Fut>(retry_count: u32, retry_interval: Duration, mut attempt_fn: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retriable() && attempt < retry_count => {
                tracing::warn!(attempt, retry_count, error = %err, "backend request failed, retrying");
                tokio::time::sleep(retry_interval).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Classifies a `reqwest::Error` as a retriable (connect/timeout) or
/// terminal backend failure.
pub fn classify_transport_error(err: &reqwest::Error) -> Error {
    if err.is_timeout() || err.is_connect() {
        Error::backend_transient(err.to_string(), None)
    } else {
        Error::backend_permanent(err.to_string(), err.status().map(|s| s.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_up_to_limit() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(3, Duration::from_millis(1), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(Error::backend_transient("timeout", None))
            } else {
                Ok(())
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_retry_count_total_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(2, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::backend_transient("timeout", None))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(5, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::backend_permanent("bad request", Some(400)))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
