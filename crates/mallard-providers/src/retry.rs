//! Linear backoff for token acquisition.
//!
//! Only the initial token fetch is retried; chat dispatch and mid-stream
//! failures are not.

use std::future::Future;

use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

use crate::error::UpstreamError;

/// Linear retry policy: delay before retry `n` is `n * step`.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    /// Retries after the first attempt. 0 disables retrying.
    pub retries: u32,
    /// Delay unit. Retry 1 waits `step`, retry 2 waits `2 * step`, ...
    pub step: Duration,
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self {
            retries: 3,
            step: Duration::from_secs(1),
        }
    }
}

/// Run `operation`, retrying retryable failures with linear backoff.
pub async fn with_linear_backoff<T, F, Fut>(
    policy: &LinearBackoff,
    mut operation: F,
) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt < policy.retries => {
                attempt += 1;
                let delay = policy.step * attempt;
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying after failure");
                sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
