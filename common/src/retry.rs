//! Retry utilities using tryhard for rate-limited upstream calls.

use core::fmt::Display;
use core::future::Future;
use core::time::Duration;

use tryhard::RetryPolicy;

/// Runs an async operation and, if it fails with an error accepted by `should_retry`,
/// waits `cooldown` and runs it exactly once more.
///
/// Errors rejected by `should_retry` are returned immediately without waiting.
/// Logs the retry attempt and the final failure.
///
/// # Example
///
/// ```ignore
/// let result = retry_once_after_cooldown(
///     Duration::from_secs(60),
///     |e: &UpstreamError| matches!(e, UpstreamError::RateLimited),
///     || async { fetch_data().await },
/// )
/// .await;
/// ```
pub async fn retry_once_after_cooldown<F, Fut, T, E, P>(
    cooldown: Duration,
    should_retry: P,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + 'static,
    P: Fn(&E) -> bool,
{
    tryhard::retry_fn(operation)
        .retries(1)
        .custom_backoff(|_attempt, error: &E| {
            if should_retry(error) {
                RetryPolicy::Delay(cooldown)
            } else {
                RetryPolicy::Break
            }
        })
        .on_retry(|attempt, next_delay, error: &E| {
            tracing::warn!(
                attempt = attempt,
                next_delay_secs = next_delay.map(|d| d.as_secs()),
                error = %error,
                "Operation failed, retrying after cooldown"
            );
            core::future::ready(())
        })
        .await
        .inspect_err(|e| {
            tracing::error!(
                cooldown_secs = cooldown.as_secs(),
                error = %e,
                "Operation failed after cooldown retry"
            );
        })
}
