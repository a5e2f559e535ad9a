//! X (Twitter) API v2 recent search with a bearer token.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::Deserialize;
use socialpulse_core::{FetchError, Instrument, RawPost, Source, Window};

use super::{get_json, retain_within, SourceAdapter};

const MAX_RESULTS: u32 = 100;
const TWEET_FIELDS: &str = "created_at,public_metrics,author_id,referenced_tweets";
const USER_FIELDS: &str = "username,public_metrics";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Tweet>,
    includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    author_id: Option<String>,
    created_at: DateTime<Utc>,
    public_metrics: Option<TweetMetrics>,
    #[serde(default)]
    referenced_tweets: Vec<ReferencedTweet>,
}

#[derive(Debug, Deserialize)]
struct TweetMetrics {
    like_count: Option<u64>,
    reply_count: Option<u64>,
    retweet_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ReferencedTweet {
    #[serde(rename = "type")]
    kind: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
    public_metrics: Option<UserMetrics>,
}

#[derive(Debug, Deserialize)]
struct UserMetrics {
    followers_count: Option<u64>,
}

#[derive(Clone)]
pub struct XAdapter {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl std::fmt::Debug for XAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XAdapter")
            .field("base_url", &self.base_url)
            .field("bearer_token", &"[redacted]")
            .finish_non_exhaustive()
    }
}

impl XAdapter {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        bearer_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
        }
    }
}

fn search_query(instrument: &Instrument) -> String {
    format!(
        "(${} OR \"{}\") -is:retweet lang:en",
        instrument.symbol, instrument.name
    )
}

/// Recent search rejects a `start_time` older than seven days.
fn search_start(window: Window, now: DateTime<Utc>) -> DateTime<Utc> {
    let oldest = now - TimeDelta::days(7) + TimeDelta::minutes(1);
    window.start(now).max(oldest)
}

fn into_raw_posts(response: SearchResponse) -> Vec<RawPost> {
    let users: HashMap<String, User> = response
        .includes
        .map(|i| i.users)
        .unwrap_or_default()
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    response
        .data
        .into_iter()
        .map(|tweet| {
            let author_id = tweet.author_id.unwrap_or_default();
            let mut post = RawPost::new(
                Source::X,
                tweet.id.clone(),
                author_id.clone(),
                tweet.created_at,
                tweet.text,
            );
            if let Some(metrics) = tweet.public_metrics {
                post.like_count = metrics.like_count;
                post.reply_count = metrics.reply_count;
                post.repost_count = metrics.retweet_count;
            }
            for referenced in tweet.referenced_tweets {
                match referenced.kind.as_str() {
                    "replied_to" => post.reply_to_id = Some(referenced.id),
                    "retweeted" | "quoted" => post.repost_of_id = Some(referenced.id),
                    _ => {}
                }
            }
            if let Some(user) = users.get(&author_id) {
                post.author_handle = Some(user.username.clone());
                post.author_followers = user
                    .public_metrics
                    .as_ref()
                    .and_then(|m| m.followers_count);
                post.permalink = Some(format!("https://x.com/{}/status/{}", user.username, tweet.id));
            }
            post
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for XAdapter {
    fn source(&self) -> Source {
        Source::X
    }

    async fn fetch(
        &self,
        instrument: &Instrument,
        window: Window,
    ) -> Result<Vec<RawPost>, FetchError> {
        let now = Utc::now();
        let start_time = search_start(window, now).to_rfc3339_opts(SecondsFormat::Secs, true);
        let max_results = MAX_RESULTS.to_string();
        let request = self
            .client
            .get(format!("{}/2/tweets/search/recent", self.base_url))
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("query", search_query(instrument).as_str()),
                ("max_results", max_results.as_str()),
                ("start_time", start_time.as_str()),
                ("tweet.fields", TWEET_FIELDS),
                ("expansions", "author_id"),
                ("user.fields", USER_FIELDS),
            ]);

        let response: SearchResponse = get_json(Source::X, request).await?;
        let mut posts = into_raw_posts(response);
        retain_within(&mut posts, window.start(now));

        tracing::debug!(
            symbol = %instrument.symbol,
            count = posts.len(),
            "fetched X posts"
        );
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_excludes_retweets() {
        let instrument = Instrument {
            symbol: "AAPL".into(),
            name: "Apple Inc.".into(),
            aliases: vec![],
            cik: None,
            isin: None,
            figi: None,
        };
        assert_eq!(
            search_query(&instrument),
            "($AAPL OR \"Apple Inc.\") -is:retweet lang:en"
        );
    }

    #[test]
    fn search_start_is_clamped_to_seven_days() {
        let now = Utc::now();
        assert_eq!(search_start(Window::Hours24, now), now - TimeDelta::hours(24));
        assert!(search_start(Window::Days7, now) > now - TimeDelta::days(7));
    }

    #[test]
    fn metrics_references_and_authors_are_mapped() {
        let response: SearchResponse = serde_json::from_str(
            r#"{
                "data": [{
                    "id": "100", "text": "$TSLA to the moon", "author_id": "9",
                    "created_at": "2024-05-01T12:00:00.000Z",
                    "public_metrics": {"like_count": 5, "reply_count": 1, "retweet_count": 2, "quote_count": 0},
                    "referenced_tweets": [{"type": "replied_to", "id": "99"}]
                }],
                "includes": {"users": [{"id": "9", "username": "elon_fan", "public_metrics": {"followers_count": 42}}]},
                "meta": {"result_count": 1}
            }"#,
        )
        .unwrap();
        let posts = into_raw_posts(response);
        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.like_count, Some(5));
        assert_eq!(post.repost_count, Some(2));
        assert_eq!(post.reply_to_id.as_deref(), Some("99"));
        assert_eq!(post.author_followers, Some(42));
        assert_eq!(post.author_handle.as_deref(), Some("elon_fan"));
    }

    #[test]
    fn empty_result_has_no_data_field() {
        let response: SearchResponse =
            serde_json::from_str(r#"{"meta": {"result_count": 0}}"#).unwrap();
        assert!(into_raw_posts(response).is_empty());
    }
}
