//! Post lifecycle: `RawPost` from an adapter, `NormalizedPost` after cleaning,
//! `ScoredPost` after sentiment and embedding.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Source;

/// Model tag carried by a substituted neutral score.
pub const FALLBACK_MODEL: &str = "fallback";

/// A source-native record before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    pub source: Source,
    pub platform_id: String,
    pub author_id: String,
    pub author_handle: Option<String>,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub like_count: Option<u64>,
    pub reply_count: Option<u64>,
    pub repost_count: Option<u64>,
    pub author_followers: Option<u64>,
    pub reply_to_id: Option<String>,
    pub repost_of_id: Option<String>,
    pub permalink: Option<String>,
}

impl RawPost {
    /// A post with only the required attributes set.
    #[must_use]
    pub fn new(
        source: Source,
        platform_id: impl Into<String>,
        author_id: impl Into<String>,
        created_at: DateTime<Utc>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source,
            platform_id: platform_id.into(),
            author_id: author_id.into(),
            author_handle: None,
            created_at,
            text: text.into(),
            like_count: None,
            reply_count: None,
            repost_count: None,
            author_followers: None,
            reply_to_id: None,
            repost_of_id: None,
            permalink: None,
        }
    }

    /// Identity used for deduplication across the whole pipeline.
    #[must_use]
    pub fn dedup_key(&self) -> (Source, &str) {
        (self.source, self.platform_id.as_str())
    }
}

/// A `RawPost` that survived cleaning and filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPost {
    pub raw: RawPost,
    pub clean_text: String,
    /// Referenced symbols; always contains the target instrument's symbol.
    pub symbols: BTreeSet<String>,
    /// Bot likelihood in `[0.0, 1.0]`.
    pub bot_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    /// `-1.0` (negative) to `1.0` (positive).
    pub polarity: f64,
    pub subjectivity: f64,
    pub sarcasm_prob: f64,
    pub confidence: f64,
    pub model: String,
}

impl SentimentScore {
    /// Neutral score substituted when a sentiment capability fails.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            polarity: 0.0,
            subjectivity: 0.0,
            sarcasm_prob: 0.0,
            confidence: 0.0,
            model: FALLBACK_MODEL.to_string(),
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.model == FALLBACK_MODEL
    }
}

/// Terminal form of a post: normalized, scored, and embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPost {
    pub post: NormalizedPost,
    pub sentiment: SentimentScore,
    /// L2-normalized embedding vector.
    pub embedding: Vec<f32>,
}

impl ScoredPost {
    #[must_use]
    pub fn source(&self) -> Source {
        self.post.raw.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_pairs_source_and_platform_id() {
        let post = RawPost::new(Source::Reddit, "post_abc", "u1", Utc::now(), "hello");
        assert_eq!(post.dedup_key(), (Source::Reddit, "post_abc"));
    }

    #[test]
    fn fallback_score_is_neutral_and_degraded() {
        let score = SentimentScore::fallback();
        assert_eq!(score.polarity, 0.0);
        assert_eq!(score.confidence, 0.0);
        assert!(score.is_degraded());
    }
}
