//! Collection fan-out: every configured source concurrently, failures isolated.
//!
//! Each adapter runs on its own task behind a shared concurrency cap. The
//! fan-out returns when every source has answered or the global deadline
//! passes; sources still pending at the deadline are aborted and recorded as
//! [`FetchErrorReason::Timeout`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use socialpulse_core::{FetchError, FetchErrorReason, Instrument, RawPost, Source, Window};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::rate_limit::RateLimiter;
use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::sources::SourceAdapter;

/// What one source produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceOutcome {
    pub posts: Vec<RawPost>,
    pub error: Option<FetchError>,
}

/// Per-source results of one fan-out, ordered by [`Source`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionOutcome {
    pub by_source: BTreeMap<Source, SourceOutcome>,
}

impl CollectionOutcome {
    /// Raw post count per source, before dedup or filtering.
    #[must_use]
    pub fn raw_counts(&self) -> BTreeMap<Source, usize> {
        self.by_source
            .iter()
            .map(|(source, outcome)| (*source, outcome.posts.len()))
            .collect()
    }

    #[must_use]
    pub fn errors(&self) -> BTreeMap<Source, FetchError> {
        self.by_source
            .iter()
            .filter_map(|(source, outcome)| outcome.error.clone().map(|e| (*source, e)))
            .collect()
    }

    #[must_use]
    pub fn posts_found(&self) -> usize {
        self.by_source.values().map(|o| o.posts.len()).sum()
    }

    /// All posts in source order, each source's posts in fetch order.
    #[must_use]
    pub fn merged_posts(&self) -> Vec<RawPost> {
        self.by_source
            .values()
            .flat_map(|o| o.posts.iter().cloned())
            .collect()
    }
}

/// Concurrent collector over a set of adapters.
#[derive(Debug, Clone)]
pub struct FanOut {
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    deadline: Duration,
    max_concurrent: usize,
}

impl FanOut {
    #[must_use]
    pub fn new(
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        deadline: Duration,
        max_concurrent: usize,
    ) -> Self {
        Self {
            limiter,
            policy,
            deadline,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Runs every adapter through the retrying fetcher and gathers the outcomes.
    ///
    /// Never fails: each source ends up with posts, an error, or both empty.
    pub async fn collect(
        &self,
        adapters: &[Arc<dyn SourceAdapter>],
        instrument: &Instrument,
        window: Window,
    ) -> CollectionOutcome {
        let deadline = Instant::now() + self.deadline;
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let instrument = Arc::new(instrument.clone());

        let mut tasks = JoinSet::new();
        let mut pending: HashMap<tokio::task::Id, Source> = HashMap::new();
        for adapter in adapters {
            let adapter = Arc::clone(adapter);
            let source = adapter.source();
            let limiter = Arc::clone(&self.limiter);
            let semaphore = Arc::clone(&semaphore);
            let instrument = Arc::clone(&instrument);
            let policy = self.policy;
            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                fetch_with_retry(adapter.as_ref(), &limiter, &policy, &instrument, window).await
            });
            pending.insert(handle.id(), source);
        }

        let mut outcome = CollectionOutcome::default();
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await {
                Ok(Some(Ok((id, result)))) => {
                    let Some(source) = pending.remove(&id) else {
                        continue;
                    };
                    let entry = outcome.by_source.entry(source).or_default();
                    match result {
                        Ok(posts) => {
                            tracing::info!(
                                source = %source,
                                symbol = %instrument.symbol,
                                count = posts.len(),
                                "collected posts"
                            );
                            entry.posts = posts;
                        }
                        Err(err) => {
                            tracing::warn!(
                                source = %source,
                                symbol = %instrument.symbol,
                                reason = %err.reason,
                                error = %err,
                                "source fetch failed"
                            );
                            entry.error = Some(err);
                        }
                    }
                }
                Ok(Some(Err(join_err))) => {
                    let Some(source) = pending.remove(&join_err.id()) else {
                        continue;
                    };
                    tracing::error!(source = %source, error = %join_err, "source task failed");
                    outcome.by_source.entry(source).or_default().error = Some(FetchError::new(
                        source,
                        FetchErrorReason::Unknown,
                        format!("fetch task failed: {join_err}"),
                    ));
                }
                Ok(None) => break,
                Err(_) => {
                    tasks.abort_all();
                    break;
                }
            }
        }

        for source in pending.into_values() {
            tracing::warn!(
                source = %source,
                symbol = %instrument.symbol,
                deadline_secs = self.deadline.as_secs(),
                "source abandoned at fan-out deadline"
            );
            outcome.by_source.entry(source).or_default().error = Some(FetchError::timeout(
                source,
                format!("no response within {}s fan-out deadline", self.deadline.as_secs()),
            ));
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    struct Fake {
        source: Source,
        delay: Duration,
        result: Result<usize, FetchErrorReason>,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SourceAdapter for Fake {
        fn source(&self) -> Source {
            self.source
        }

        async fn fetch(&self, _: &Instrument, _: Window) -> Result<Vec<RawPost>, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            match self.result {
                Ok(n) => Ok((0..n)
                    .map(|i| RawPost::new(self.source, i.to_string(), "u", Utc::now(), "$AAPL"))
                    .collect()),
                Err(reason) => Err(FetchError::new(self.source, reason, "fake")),
            }
        }
    }

    struct Harness {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                in_flight: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn adapter(
            &self,
            source: Source,
            delay_ms: u64,
            result: Result<usize, FetchErrorReason>,
        ) -> Arc<dyn SourceAdapter> {
            Arc::new(Fake {
                source,
                delay: Duration::from_millis(delay_ms),
                result,
                in_flight: Arc::clone(&self.in_flight),
                peak: Arc::clone(&self.peak),
            })
        }
    }

    fn fanout(deadline_secs: u64, max_concurrent: usize) -> FanOut {
        FanOut::new(
            Arc::new(RateLimiter::default()),
            RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            },
            Duration::from_secs(deadline_secs),
            max_concurrent,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_does_not_affect_others() {
        let h = Harness::new();
        let adapters = vec![
            h.adapter(Source::Reddit, 100, Ok(4)),
            h.adapter(Source::Stocktwits, 50, Err(FetchErrorReason::Auth)),
            h.adapter(Source::X, 200, Ok(2)),
        ];
        let out = fanout(10, 3)
            .collect(&adapters, &Instrument::unlisted("AAPL"), Window::Hours24)
            .await;

        assert_eq!(out.posts_found(), 6);
        assert_eq!(out.raw_counts()[&Source::Stocktwits], 0);
        let errors = out.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[&Source::Stocktwits].reason, FetchErrorReason::Auth);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_times_out_at_deadline() {
        let h = Harness::new();
        let adapters = vec![
            h.adapter(Source::Reddit, 100, Ok(3)),
            h.adapter(Source::X, 120_000, Ok(9)),
        ];
        let start = Instant::now();
        let out = fanout(5, 3)
            .collect(&adapters, &Instrument::unlisted("AAPL"), Window::Hours24)
            .await;

        assert!(start.elapsed() <= Duration::from_secs(6));
        assert_eq!(out.by_source[&Source::Reddit].posts.len(), 3);
        let x = &out.by_source[&Source::X];
        assert!(x.posts.is_empty());
        assert_eq!(x.error.as_ref().unwrap().reason, FetchErrorReason::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_capped() {
        let h = Harness::new();
        let adapters = vec![
            h.adapter(Source::Reddit, 100, Ok(1)),
            h.adapter(Source::Stocktwits, 100, Ok(1)),
            h.adapter(Source::X, 100, Ok(1)),
        ];
        let out = fanout(10, 1)
            .collect(&adapters, &Instrument::unlisted("AAPL"), Window::Hours24)
            .await;
        assert_eq!(out.posts_found(), 3);
        assert_eq!(h.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sources_run_concurrently() {
        let h = Harness::new();
        let adapters = vec![
            h.adapter(Source::Reddit, 1_000, Ok(1)),
            h.adapter(Source::Stocktwits, 1_000, Ok(1)),
            h.adapter(Source::X, 1_000, Ok(1)),
        ];
        let start = Instant::now();
        fanout(10, 3)
            .collect(&adapters, &Instrument::unlisted("AAPL"), Window::Hours24)
            .await;
        assert!(start.elapsed() < Duration::from_millis(1_500));
        assert_eq!(h.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_adapters_yields_empty_outcome() {
        let out = fanout(1, 3)
            .collect(&[], &Instrument::unlisted("AAPL"), Window::Hours24)
            .await;
        assert!(out.by_source.is_empty());
        assert!(out.merged_posts().is_empty());
    }

    #[test]
    fn merged_posts_follow_source_order() {
        let mut out = CollectionOutcome::default();
        out.by_source.insert(
            Source::X,
            SourceOutcome {
                posts: vec![RawPost::new(Source::X, "x1", "u", Utc::now(), "x")],
                error: None,
            },
        );
        out.by_source.insert(
            Source::Reddit,
            SourceOutcome {
                posts: vec![RawPost::new(Source::Reddit, "r1", "u", Utc::now(), "r")],
                error: None,
            },
        );
        let ids: Vec<_> = out.merged_posts().into_iter().map(|p| p.platform_id).collect();
        assert_eq!(ids, vec!["r1", "x1"]);
    }
}
