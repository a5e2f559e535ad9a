//! Qdrant vector store for scored posts.

use std::collections::HashMap;

use serde::Serialize;
use sha2::{Digest, Sha256};
use socialpulse_core::ScoredPost;
use tokio::sync::OnceCell;

use crate::error::StorageError;

/// Qdrant HTTP client bound to one collection.
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    dimension: usize,
    ready: OnceCell<()>,
}

#[derive(Serialize)]
struct CreateCollectionRequest {
    vectors: VectorsConfig,
}

#[derive(Serialize)]
struct VectorsConfig {
    size: usize,
    distance: &'static str,
}

#[derive(Serialize)]
struct UpsertPointsRequest {
    points: Vec<Point>,
}

#[derive(Serialize)]
struct Point {
    id: u64,
    vector: Vec<f32>,
    payload: HashMap<&'static str, serde_json::Value>,
}

impl QdrantStore {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        collection: &str,
        dimension: usize,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            dimension,
            ready: OnceCell::new(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    /// Ensures the collection exists, creating it if absent.
    ///
    /// Uses cosine distance and the configured vector dimension. Runs at most
    /// once successfully per store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Qdrant`] on network or API failure.
    pub async fn ensure_collection(&self) -> Result<(), StorageError> {
        self.ready
            .get_or_try_init(|| async {
                let url = self.collection_url();
                if let Ok(resp) = self.client.get(&url).send().await {
                    if resp.status().is_success() {
                        return Ok(());
                    }
                }

                let body = CreateCollectionRequest {
                    vectors: VectorsConfig {
                        size: self.dimension,
                        distance: "Cosine",
                    },
                };
                let resp = self
                    .client
                    .put(&url)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| {
                        StorageError::Qdrant(format!("collection create request failed: {e}"))
                    })?;

                if !resp.status().is_success() {
                    return Err(StorageError::Qdrant(format!(
                        "collection create returned status {}",
                        resp.status()
                    )));
                }
                tracing::info!(
                    collection = %self.collection,
                    dimension = self.dimension,
                    "created Qdrant collection"
                );
                Ok(())
            })
            .await
            .map(|_| ())
    }

    /// Upserts a scored post at its stable point id, so re-persisting overwrites.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Qdrant`] on network or API failure.
    pub async fn upsert_post(&self, post: &ScoredPost) -> Result<(), StorageError> {
        self.ensure_collection().await?;

        let raw = &post.post.raw;
        let payload = HashMap::from([
            ("source", serde_json::json!(raw.source)),
            ("platform_id", serde_json::json!(raw.platform_id)),
            ("author_id", serde_json::json!(raw.author_id)),
            ("created_at", serde_json::json!(raw.created_at)),
            ("text", serde_json::json!(post.post.clean_text)),
            ("symbols", serde_json::json!(post.post.symbols)),
            ("bot_score", serde_json::json!(post.post.bot_score)),
            ("polarity", serde_json::json!(post.sentiment.polarity)),
            ("subjectivity", serde_json::json!(post.sentiment.subjectivity)),
            ("sarcasm_prob", serde_json::json!(post.sentiment.sarcasm_prob)),
            ("confidence", serde_json::json!(post.sentiment.confidence)),
            ("model", serde_json::json!(post.sentiment.model)),
            ("permalink", serde_json::json!(raw.permalink)),
        ]);

        let body = UpsertPointsRequest {
            points: vec![Point {
                id: post_point_id(post),
                vector: post.embedding.clone(),
                payload,
            }],
        };

        let resp = self
            .client
            .put(format!("{}/points", self.collection_url()))
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::Qdrant(format!("upsert request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(StorageError::Qdrant(format!(
                "upsert returned status {}",
                resp.status()
            )));
        }

        Ok(())
    }
}

/// Stable Qdrant point id for a post.
///
/// First 8 bytes of SHA-256(`source:platform_id`) as a big-endian u64.
#[must_use]
pub fn post_point_id(post: &ScoredPost) -> u64 {
    let raw = &post.post.raw;
    let hash = Sha256::digest(format!("{}:{}", raw.source, raw.platform_id).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash[..8]);
    u64::from_be_bytes(bytes)
}
