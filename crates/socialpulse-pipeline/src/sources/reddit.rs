//! Reddit search across the investing subreddits (public JSON listing).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use socialpulse_core::{FetchError, Instrument, RawPost, Source, Window};

use super::{get_json, retain_within, SourceAdapter};

const SEARCH_SUBREDDITS: &str = "stocks+wallstreetbets+investing+StockMarket+options";
const PAGE_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    author: Option<String>,
    author_fullname: Option<String>,
    created_utc: f64,
    score: Option<i64>,
    num_comments: Option<u64>,
    permalink: Option<String>,
    crosspost_parent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RedditAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl RedditAdapter {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Reddit's `t` search parameter for a window.
fn time_filter(window: Window) -> &'static str {
    match window {
        Window::Hours24 => "day",
        Window::Days7 | Window::Weeks1 => "week",
    }
}

fn search_query(instrument: &Instrument) -> String {
    format!("${} OR \"{}\"", instrument.symbol, instrument.name)
}

fn is_removed(text: &str) -> bool {
    matches!(text.trim(), "[deleted]" | "[removed]")
}

fn to_raw_post(data: PostData) -> Option<RawPost> {
    if is_removed(&data.selftext) || is_removed(&data.title) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let created_at = DateTime::from_timestamp(data.created_utc as i64, 0)?;

    let text = if data.selftext.trim().is_empty() {
        data.title
    } else {
        format!("{}\n{}", data.title, data.selftext)
    };
    let author_id = data
        .author_fullname
        .or_else(|| data.author.clone())
        .unwrap_or_default();

    let mut post = RawPost::new(
        Source::Reddit,
        format!("post_{}", data.id),
        author_id,
        created_at,
        text,
    );
    post.author_handle = data.author.filter(|a| a != "[deleted]");
    post.like_count = data.score.map(|s| u64::try_from(s).unwrap_or(0));
    post.reply_count = data.num_comments;
    post.repost_of_id = data.crosspost_parent;
    post.permalink = data.permalink.map(|p| format!("https://www.reddit.com{p}"));
    Some(post)
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    fn source(&self) -> Source {
        Source::Reddit
    }

    async fn fetch(
        &self,
        instrument: &Instrument,
        window: Window,
    ) -> Result<Vec<RawPost>, FetchError> {
        let url = format!("{}/r/{SEARCH_SUBREDDITS}/search.json", self.base_url);
        let limit = PAGE_LIMIT.to_string();
        let request = self.client.get(&url).query(&[
            ("q", search_query(instrument).as_str()),
            ("sort", "new"),
            ("restrict_sr", "on"),
            ("t", time_filter(window)),
            ("limit", limit.as_str()),
        ]);

        let listing: Listing = get_json(Source::Reddit, request).await?;
        let mut posts: Vec<RawPost> = listing
            .data
            .children
            .into_iter()
            .filter_map(|child| to_raw_post(child.data))
            .collect();
        retain_within(&mut posts, window.start(Utc::now()));

        tracing::debug!(
            symbol = %instrument.symbol,
            count = posts.len(),
            "fetched Reddit posts"
        );
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_data(json: &str) -> PostData {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn title_and_selftext_are_joined() {
        let post = to_raw_post(post_data(
            r#"{"id": "abc", "title": "AAPL earnings", "selftext": "Thoughts?",
                "author": "bob", "author_fullname": "t2_bob", "created_utc": 1714564800.0,
                "score": 12, "num_comments": 3, "permalink": "/r/stocks/comments/abc/"}"#,
        ))
        .unwrap();
        assert_eq!(post.platform_id, "post_abc");
        assert_eq!(post.text, "AAPL earnings\nThoughts?");
        assert_eq!(post.author_id, "t2_bob");
        assert_eq!(post.author_handle.as_deref(), Some("bob"));
        assert_eq!(post.like_count, Some(12));
        assert_eq!(post.reply_count, Some(3));
        assert_eq!(
            post.permalink.as_deref(),
            Some("https://www.reddit.com/r/stocks/comments/abc/")
        );
    }

    #[test]
    fn removed_posts_are_skipped() {
        let removed = post_data(
            r#"{"id": "x", "title": "t", "selftext": "[removed]", "created_utc": 1714564800.0}"#,
        );
        let deleted = post_data(
            r#"{"id": "y", "title": "t", "selftext": "[deleted]", "created_utc": 1714564800.0}"#,
        );
        assert!(to_raw_post(removed).is_none());
        assert!(to_raw_post(deleted).is_none());
    }

    #[test]
    fn negative_score_clamps_to_zero() {
        let post = to_raw_post(post_data(
            r#"{"id": "z", "title": "TSLA", "created_utc": 1714564800.0, "score": -4}"#,
        ))
        .unwrap();
        assert_eq!(post.like_count, Some(0));
        assert_eq!(post.text, "TSLA");
    }

    #[test]
    fn window_maps_to_time_filter() {
        assert_eq!(time_filter(Window::Hours24), "day");
        assert_eq!(time_filter(Window::Days7), "week");
        assert_eq!(time_filter(Window::Weeks1), "week");
    }
}
