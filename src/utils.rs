use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Runs `operation` until it succeeds or `max_retries` retries have failed.
///
/// Delays grow along the Fibonacci sequence starting at `initial_delay`,
/// which gives a local emulator a few seconds to come up without stalling a
/// healthy run.
pub async fn retry_with_backoff<T, E, Fut, F>(
    operation: F,
    initial_delay: Duration,
    max_retries: usize,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
{
    let mut attempt = 0;
    let (mut delay, mut next_delay) = (initial_delay, initial_delay);

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries => {
                attempt += 1;
                warn!(
                    error = ?e,
                    ?delay,
                    attempt,
                    max_retries,
                    "operation failed, retrying"
                );
                sleep(delay).await;
                (delay, next_delay) = (next_delay, delay + next_delay);
            }
            Err(e) => return Err(e),
        }
    }
}
