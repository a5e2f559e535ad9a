//! Scoring stage: sentiment plus embedding for every surviving post.
//!
//! Each capability is a two-variant handle. The primary (a remote model) is
//! used when configured and healthy; otherwise the declared fallback (lexicon
//! heuristic, hash embedding) serves every call. The health check runs once,
//! lazily, on first use. A primary failure on a single post substitutes a
//! neutral score or a hash embedding for that post and never drops it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use socialpulse_core::{NormalizedPost, ScoredPost, SentimentScore};
use tokio::sync::OnceCell;

use crate::embeddings::{hash_embedding, HashEmbedder};
use crate::error::ScoringError;
use crate::scorer::{heuristic_score, HEURISTIC_MODEL};

/// Sentiment requests in flight at once.
const SCORING_CONCURRENCY: usize = 8;

/// `score(text) -> polarity, subjectivity, sarcasm, confidence`.
#[async_trait]
pub trait SentimentModel: Send + Sync {
    fn name(&self) -> &str;

    async fn health_check(&self) -> bool;

    async fn score(&self, text: &str) -> Result<SentimentScore, ScoringError>;
}

/// `embed(texts) -> one vector per text`, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn health_check(&self) -> bool;

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ScoringError>;
}

/// The financial-lexicon heuristic as a sentiment model.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSentiment;

#[async_trait]
impl SentimentModel for HeuristicSentiment {
    fn name(&self) -> &str {
        HEURISTIC_MODEL
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn score(&self, text: &str) -> Result<SentimentScore, ScoringError> {
        Ok(heuristic_score(text))
    }
}

/// Which implementation a capability handle settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Primary,
    Fallback,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Variant::Primary => "primary",
            Variant::Fallback => "fallback",
        })
    }
}

/// Runs `health_check` once, picking the primary only when it is present and healthy.
async fn select<F, Fut>(
    cell: &OnceCell<Variant>,
    has_primary: bool,
    health_check: F,
    what: &str,
) -> Variant
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    *cell
        .get_or_init(|| async move {
            if !has_primary {
                tracing::info!(capability = what, "no primary configured, using fallback");
                return Variant::Fallback;
            }
            if health_check().await {
                tracing::info!(capability = what, "primary healthy");
                Variant::Primary
            } else {
                tracing::warn!(capability = what, "primary health check failed, using fallback");
                Variant::Fallback
            }
        })
        .await
}

/// Sentiment handle with a declared fallback.
pub struct SentimentCapability {
    primary: Option<Arc<dyn SentimentModel>>,
    fallback: Arc<dyn SentimentModel>,
    selected: OnceCell<Variant>,
}

impl SentimentCapability {
    #[must_use]
    pub fn new(primary: Option<Arc<dyn SentimentModel>>) -> Self {
        Self::with_fallback(primary, Arc::new(HeuristicSentiment))
    }

    #[must_use]
    pub fn with_fallback(
        primary: Option<Arc<dyn SentimentModel>>,
        fallback: Arc<dyn SentimentModel>,
    ) -> Self {
        Self {
            primary,
            fallback,
            selected: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub async fn variant(&self) -> Variant {
        let primary = self.primary.clone();
        select(
            &self.selected,
            primary.is_some(),
            || async move {
                match primary {
                    Some(model) => model.health_check().await,
                    None => false,
                }
            },
            "sentiment",
        )
        .await
    }

    /// Scores `text`. Never fails: a failing model yields [`SentimentScore::fallback`].
    pub async fn score(&self, text: &str) -> SentimentScore {
        let model = match (self.variant().await, &self.primary) {
            (Variant::Primary, Some(primary)) => primary,
            _ => &self.fallback,
        };
        match model.score(text).await {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!(
                    model = model.name(),
                    error = %e,
                    "sentiment scoring failed, substituting neutral score"
                );
                SentimentScore::fallback()
            }
        }
    }
}

/// Embedding handle with the hash fallback.
pub struct EmbeddingCapability {
    primary: Option<Arc<dyn Embedder>>,
    fallback: HashEmbedder,
    selected: OnceCell<Variant>,
}

impl EmbeddingCapability {
    #[must_use]
    pub fn new(primary: Option<Arc<dyn Embedder>>, dimension: usize) -> Self {
        Self {
            primary,
            fallback: HashEmbedder::new(dimension),
            selected: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.fallback.dimension()
    }

    pub async fn variant(&self) -> Variant {
        let primary = self.primary.clone();
        select(
            &self.selected,
            primary.is_some(),
            || async move {
                match primary {
                    Some(embedder) => embedder.health_check().await,
                    None => false,
                }
            },
            "embedding",
        )
        .await
    }

    /// One unit vector per text. Never fails: a failing primary yields hash vectors.
    pub async fn embed_all(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }
        if let (Variant::Primary, Some(primary)) = (self.variant().await, &self.primary) {
            match primary.embed(texts).await {
                Ok(vectors) if vectors.len() == texts.len() => return vectors,
                Ok(vectors) => tracing::warn!(
                    expected = texts.len(),
                    got = vectors.len(),
                    "embedding count mismatch, substituting hash embeddings"
                ),
                Err(e) => tracing::warn!(
                    embedder = primary.name(),
                    error = %e,
                    "embedding failed, substituting hash embeddings"
                ),
            }
        }
        let dimension = self.dimension();
        texts.iter().map(|t| hash_embedding(t, dimension)).collect()
    }
}

/// Attaches sentiment and embeddings to normalized posts.
pub struct ScoringStage {
    sentiment: SentimentCapability,
    embedding: EmbeddingCapability,
}

impl ScoringStage {
    #[must_use]
    pub fn new(sentiment: SentimentCapability, embedding: EmbeddingCapability) -> Self {
        Self {
            sentiment,
            embedding,
        }
    }

    #[must_use]
    pub fn sentiment(&self) -> &SentimentCapability {
        &self.sentiment
    }

    #[must_use]
    pub fn embedding(&self) -> &EmbeddingCapability {
        &self.embedding
    }

    pub async fn score(&self, post: NormalizedPost) -> ScoredPost {
        let sentiment = self.sentiment.score(&post.clean_text).await;
        let embedding = self
            .embedding
            .embed_all(&[post.clean_text.as_str()])
            .await
            .pop()
            .unwrap_or_else(|| hash_embedding(&post.clean_text, self.embedding.dimension()));
        ScoredPost {
            post,
            sentiment,
            embedding,
        }
    }

    /// Scores every post, preserving input order.
    pub async fn score_all(&self, posts: Vec<NormalizedPost>) -> Vec<ScoredPost> {
        let texts: Vec<&str> = posts.iter().map(|p| p.clean_text.as_str()).collect();

        let sentiments: Vec<SentimentScore> = stream::iter(0..texts.len())
            .map(|i| self.sentiment.score(texts[i]))
            .buffered(SCORING_CONCURRENCY)
            .collect()
            .await;
        let embeddings = self.embedding.embed_all(&texts).await;

        let degraded = sentiments.iter().filter(|s| s.is_degraded()).count();
        if degraded > 0 {
            tracing::warn!(degraded, total = posts.len(), "scoring degraded for some posts");
        }

        posts
            .into_iter()
            .zip(sentiments)
            .zip(embeddings)
            .map(|((post, sentiment), embedding)| ScoredPost {
                post,
                sentiment,
                embedding,
            })
            .collect()
    }
}
