//! Per-source token buckets throttling outbound fetches.
//!
//! Each [`Source`] owns an independent bucket, so a slow or exhausted source
//! never delays another. [`RateLimiter::acquire`] never fails; it only waits.
//!
//! Buckets use a reservation scheme: a caller takes its token immediately,
//! letting the balance go negative, and then sleeps off the debt outside the
//! lock. Concurrent callers on one source therefore queue up behind each other
//! at exactly the refill rate.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use socialpulse_core::{AppConfig, Source};
use tokio::time::Instant;

/// Capacity and refill rate for one source's bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketConfig {
    /// Maximum tokens held; the size of an allowed burst.
    pub capacity: u32,
    /// Tokens added per second. Must be positive.
    pub refill_per_sec: f64,
}

impl BucketConfig {
    #[must_use]
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity: capacity.max(1),
            refill_per_sec,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
struct Bucket {
    config: BucketConfig,
    state: Mutex<BucketState>,
}

impl Bucket {
    fn new(config: BucketConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BucketState {
                tokens: f64::from(config.capacity),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Takes one token and returns how long the caller must wait before using it.
    fn reserve(&self) -> Duration {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        let capacity = f64::from(self.config.capacity);
        state.tokens = (state.tokens + elapsed * self.config.refill_per_sec).min(capacity);
        state.last_refill = now;
        state.tokens -= 1.0;

        if state.tokens >= 0.0 || self.config.refill_per_sec <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(-state.tokens / self.config.refill_per_sec)
                .unwrap_or(Duration::MAX)
        }
    }
}

/// Token-bucket limiter keyed by source.
///
/// Sources without a configured bucket are not throttled.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: BTreeMap<Source, Bucket>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(configs: impl IntoIterator<Item = (Source, BucketConfig)>) -> Self {
        Self {
            buckets: configs
                .into_iter()
                .map(|(source, config)| (source, Bucket::new(config)))
                .collect(),
        }
    }

    /// Builds one bucket per source from its `rate_per_sec` and `burst` settings.
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(Source::ALL.into_iter().map(|source| {
            let settings = config.source(source);
            (
                source,
                BucketConfig::new(settings.burst, settings.rate_per_sec),
            )
        }))
    }

    /// Waits until a token is available for `source`.
    pub async fn acquire(&self, source: Source) {
        let Some(bucket) = self.buckets.get(&source) else {
            return;
        };
        let wait = bucket.reserve();
        if !wait.is_zero() {
            tracing::debug!(
                source = %source,
                wait = ?wait,
                "rate limit: waiting for token"
            );
            tokio::time::sleep(wait).await;
        }
    }
}
