//! Source adapters: one polymorphic capability per platform.
//!
//! Every adapter performs exactly one upstream request per `fetch` call and
//! reports failures as a classified [`FetchError`]. Retrying and rate limiting
//! live in [`crate::retry`], so the orchestrator never branches on source
//! identity except to label results.

mod reddit;
mod stocktwits;
mod x;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use socialpulse_core::{
    AppConfig, FetchError, FetchErrorReason, Instrument, RawPost, Source, Window,
};

pub use reddit::RedditAdapter;
pub use stocktwits::StocktwitsAdapter;
pub use x::XAdapter;

/// Fetches posts about one instrument from one platform.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// Returns posts created within `window`, or a classified failure.
    async fn fetch(&self, instrument: &Instrument, window: Window)
        -> Result<Vec<RawPost>, FetchError>;
}

/// Builds the shared HTTP client used by every adapter.
///
/// # Errors
///
/// Returns the underlying [`reqwest::Error`] if the TLS backend fails to initialize.
pub fn build_http_client(config: &AppConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
}

/// One adapter per enabled source, in [`Source`] order.
#[must_use]
pub fn build_adapters(config: &AppConfig, client: &reqwest::Client) -> Vec<Arc<dyn SourceAdapter>> {
    config
        .enabled_sources()
        .into_iter()
        .filter_map(|source| -> Option<Arc<dyn SourceAdapter>> {
            let base_url = config.source(source).base_url.clone();
            match source {
                Source::Reddit => Some(Arc::new(RedditAdapter::new(client.clone(), base_url))),
                Source::Stocktwits => {
                    Some(Arc::new(StocktwitsAdapter::new(client.clone(), base_url)))
                }
                Source::X => config.x_bearer_token.as_ref().map(|token| -> Arc<dyn SourceAdapter> {
                    Arc::new(XAdapter::new(client.clone(), base_url, token.clone()))
                }),
            }
        })
        .collect()
}

/// Maps a non-success HTTP status onto the fetch error taxonomy.
pub(crate) fn classify_status(source: Source, status: StatusCode) -> FetchError {
    let reason = match status.as_u16() {
        429 => FetchErrorReason::RateLimited,
        401 | 403 => FetchErrorReason::Auth,
        408 => FetchErrorReason::Timeout,
        500..=599 => FetchErrorReason::Unavailable,
        400..=499 => FetchErrorReason::Malformed,
        _ => FetchErrorReason::Unknown,
    };
    FetchError::new(source, reason, format!("HTTP {status}"))
}

/// Maps a transport-level failure onto the fetch error taxonomy.
pub(crate) fn classify_transport(source: Source, err: &reqwest::Error) -> FetchError {
    let reason = if err.is_timeout() {
        FetchErrorReason::Timeout
    } else if err.is_connect() {
        FetchErrorReason::Unavailable
    } else if err.is_decode() {
        FetchErrorReason::Malformed
    } else {
        FetchErrorReason::Unknown
    };
    FetchError::new(source, reason, err.to_string())
}

/// Sends `request` and decodes a JSON body, classifying every failure.
pub(crate) async fn get_json<T: DeserializeOwned>(
    source: Source,
    request: reqwest::RequestBuilder,
) -> Result<T, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_transport(source, &e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(classify_status(source, status));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| classify_transport(source, &e))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        FetchError::new(
            source,
            FetchErrorReason::Malformed,
            format!("failed to parse response body: {e}"),
        )
    })
}

/// Drops posts created before the window start.
pub(crate) fn retain_within(posts: &mut Vec<RawPost>, start: DateTime<Utc>) {
    posts.retain(|post| post.created_at >= start);
}
