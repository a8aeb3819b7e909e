//! Exponential backoff with jitter for retrying a fallible async call.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Number of retries attempted after the first call, so the total
    /// number of attempts is `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay for attempt `k` (0-indexed): `min(base_delay * 2^k, max_delay)`
    /// scaled by a uniform jitter factor in `[0.5, 1.0]`.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let capped = exponential.min(self.max_delay);
        let jitter = rand::rng().random_range(0.5..=1.0);
        capped.mul_f64(jitter)
    }
}

/// Retry `call` up to `policy.max_retries` additional times after the
/// first attempt, sleeping with jittered exponential backoff between
/// attempts. An error for which `should_retry` returns false is returned
/// immediately; otherwise the first success or the last error once
/// retries are exhausted.
pub async fn retry_with_jitter<T, E, F, Fut>(
    policy: RetryPolicy,
    mut call: F,
    should_retry: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_retries || !should_retry(&err) {
                    return Err(err);
                }
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}
