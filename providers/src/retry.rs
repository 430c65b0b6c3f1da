//! Transient-error retry with exponential backoff bounded by a wall-clock
//! cap (SPEC_FULL.md §4.9 "Retry"), grounded on the teacher's
//! `tokio_retry::{strategy::ExponentialBackoff, Retry}` usage in
//! `common/src/storage/types/text_chunk.rs`.

use std::future::Future;
use std::time::{Duration, Instant};

use common::error::EngineError;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tracing::warn;

/// Wall-clock cap on the total time spent retrying a single call (§5 "Timeouts").
pub const MAX_RETRY_WALL_CLOCK: Duration = Duration::from_secs(30);

/// Runs `op` under an exponential backoff retry policy, but only for
/// errors classified as transient (`ProviderTransient`). Any other error
/// — auth failures, validation, token-limit — fails fast on the first
/// attempt. The backoff schedule itself comes from `tokio_retry`, driven
/// by hand so a non-retryable error can short-circuit the iterator
/// instead of burning through it.
pub async fn retry_transient<F, Fut, T>(op: F) -> Result<T, EngineError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let deadline = Instant::now() + MAX_RETRY_WALL_CLOCK;
    let mut delays = ExponentialBackoff::from_millis(200).map(jitter);

    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if !is_retryable(&e) => return Err(e),
            Err(e) => {
                if Instant::now() >= deadline {
                    warn!(error = %e, "retry wall-clock budget exhausted");
                    return Err(e);
                }
                match delays.next() {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => return Err(e),
                }
            }
        }
    }
}

fn is_retryable(err: &EngineError) -> bool {
    matches!(err, EngineError::ProviderTransient(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicUsize::new(0);
        let result = retry_transient(|| async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(EngineError::ProviderTransient("timeout".into()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fails_fast_on_non_transient_error() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), EngineError> = retry_transient(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::ProviderAuth("bad key".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
