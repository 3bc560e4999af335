// Bounded fixed-delay retry
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Run `op` until it succeeds, at most `attempts` times, sleeping `delay`
/// between failures. The last error is returned when every attempt fails.
pub async fn retry<T, F, Fut>(attempts: usize, delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => {
                return Err(e.context(format!("Gave up after {} attempts", attempts)));
            }
            Err(e) => {
                debug!(attempt, attempts, error = %e, "Attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
