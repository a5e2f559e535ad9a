//! StockTwits symbol stream.
//!
//! `GET {base}/api/2/streams/symbol/{SYMBOL}.json?limit=30`. The stream is
//! newest-first and unauthenticated; the user-tagged sentiment label, when
//! present, is prefixed to the text as `[BULLISH]` or `[BEARISH]`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Deserialize;
use socialpulse_core::{FetchError, Instrument, RawPost, Source, Window};

use super::{get_json, retain_within, SourceAdapter};

const STREAM_LIMIT: u32 = 30;

/// Characters escaped in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'?')
    .add(b'<')
    .add(b'>');

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    id: u64,
    #[serde(default)]
    body: String,
    created_at: DateTime<Utc>,
    user: User,
    likes: Option<Likes>,
    conversation: Option<Conversation>,
    entities: Option<Entities>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: u64,
    username: Option<String>,
    followers: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Likes {
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Conversation {
    replies: Option<u64>,
    in_reply_to_message_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Entities {
    sentiment: Option<SentimentTag>,
}

#[derive(Debug, Deserialize)]
struct SentimentTag {
    basic: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StocktwitsAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl StocktwitsAdapter {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn to_raw_post(message: Message) -> RawPost {
    let text = match message
        .entities
        .and_then(|e| e.sentiment)
        .and_then(|s| s.basic)
    {
        Some(label) if !label.trim().is_empty() => {
            format!("[{}] {}", label.trim().to_uppercase(), message.body)
        }
        _ => message.body,
    };

    let mut post = RawPost::new(
        Source::Stocktwits,
        message.id.to_string(),
        message.user.id.to_string(),
        message.created_at,
        text,
    );
    post.permalink = message
        .user
        .username
        .as_ref()
        .map(|u| format!("https://stocktwits.com/{u}/message/{}", message.id));
    post.author_handle = message.user.username;
    post.author_followers = message.user.followers;
    post.like_count = message.likes.and_then(|l| l.total);
    if let Some(conversation) = message.conversation {
        post.reply_count = conversation.replies;
        post.reply_to_id = conversation
            .in_reply_to_message_id
            .map(|id| id.to_string());
    }
    post
}

#[async_trait]
impl SourceAdapter for StocktwitsAdapter {
    fn source(&self) -> Source {
        Source::Stocktwits
    }

    async fn fetch(
        &self,
        instrument: &Instrument,
        window: Window,
    ) -> Result<Vec<RawPost>, FetchError> {
        let symbol = utf8_percent_encode(&instrument.symbol, PATH_SEGMENT);
        let url = format!("{}/api/2/streams/symbol/{symbol}.json", self.base_url);
        let request = self.client.get(&url).query(&[("limit", STREAM_LIMIT)]);

        let response: StreamResponse = get_json(Source::Stocktwits, request).await?;
        let mut posts: Vec<RawPost> = response.messages.into_iter().map(to_raw_post).collect();
        retain_within(&mut posts, window.start(Utc::now()));

        tracing::debug!(
            symbol = %instrument.symbol,
            count = posts.len(),
            "fetched StockTwits messages"
        );
        Ok(posts)
    }
}
