//! Retrying fetcher: exponential back-off with jitter around one adapter call.
//!
//! [`fetch_with_retry`] retries only transient failures (timeout, rate limit,
//! upstream unavailable). Auth and malformed-response failures return on the
//! first attempt. Every attempt first acquires a token from the source's bucket.

use std::time::Duration;

use socialpulse_core::{AppConfig, FetchError, Instrument, RawPost, Window};

use crate::rate_limit::RateLimiter;
use crate::sources::SourceAdapter;

/// Back-off parameters shared by every source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Relative jitter; `0.25` spreads each delay over `±25 %`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_secs(60),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_backoff_base_ms),
            ..Self::default()
        }
    }

    /// Un-jittered delay before the retry that follows failed attempt `attempt` (1-based).
    ///
    /// | Attempt | Delay            |
    /// |---------|------------------|
    /// | 1       | base × 2⁰        |
    /// | 2       | base × 2¹        |
    /// | 3       | base × 2²        |
    ///
    /// Capped at `max_delay`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// [`Self::backoff`] scaled by a random factor in `[1 - jitter, 1 + jitter]`.
    #[must_use]
    pub fn jittered_backoff(&self, attempt: u32) -> Duration {
        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = 1.0 - jitter + rand::random::<f64>() * 2.0 * jitter;
        self.backoff(attempt).mul_f64(factor)
    }
}

/// Calls `adapter.fetch` under the rate limiter, retrying transient failures.
///
/// Exhausting the attempts yields the last [`FetchError`]; the caller records
/// it against the source and carries on.
pub async fn fetch_with_retry(
    adapter: &dyn SourceAdapter,
    limiter: &RateLimiter,
    policy: &RetryPolicy,
    instrument: &Instrument,
    window: Window,
) -> Result<Vec<RawPost>, FetchError> {
    let source = adapter.source();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        limiter.acquire(source).await;
        match adapter.fetch(instrument, window).await {
            Ok(posts) => return Ok(posts),
            Err(err) => {
                if !err.is_retryable() || attempt >= max_attempts {
                    return Err(err);
                }
                let delay = policy.jittered_backoff(attempt);
                tracing::warn!(
                    source = %source,
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient fetch error, retrying after back-off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
