//! Storage collaborators. Persistence is a side effect of a query, never an
//! input to its result.

mod jsonl;
mod qdrant;

use std::sync::Arc;

use async_trait::async_trait;
use socialpulse_core::{AppConfig, EnrichmentResult, Instrument, ScoredPost};

use crate::error::StorageError;

pub use jsonl::{EnrichmentLog, EnrichmentLogEntry};
pub use qdrant::{post_point_id, QdrantStore};

/// Write side of the post and enrichment stores.
#[async_trait]
pub trait PostStore: Send + Sync {
    fn name(&self) -> &str;

    async fn persist(&self, post: &ScoredPost) -> Result<(), StorageError>;

    async fn persist_enrichment(
        &self,
        instrument: &Instrument,
        enrichment: &EnrichmentResult,
    ) -> Result<(), StorageError>;
}

/// Accepts and discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

#[async_trait]
impl PostStore for NoopStore {
    fn name(&self) -> &str {
        "noop"
    }

    async fn persist(&self, _post: &ScoredPost) -> Result<(), StorageError> {
        Ok(())
    }

    async fn persist_enrichment(
        &self,
        _instrument: &Instrument,
        _enrichment: &EnrichmentResult,
    ) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Posts to Qdrant (when configured), enrichment snapshots to the JSONL log.
pub struct PersistentStore {
    vectors: Option<QdrantStore>,
    log: EnrichmentLog,
}

impl PersistentStore {
    #[must_use]
    pub fn new(vectors: Option<QdrantStore>, log: EnrichmentLog) -> Self {
        Self { vectors, log }
    }

    #[must_use]
    pub fn has_vector_store(&self) -> bool {
        self.vectors.is_some()
    }
}

#[async_trait]
impl PostStore for PersistentStore {
    fn name(&self) -> &str {
        if self.vectors.is_some() {
            "qdrant+jsonl"
        } else {
            "jsonl"
        }
    }

    async fn persist(&self, post: &ScoredPost) -> Result<(), StorageError> {
        match &self.vectors {
            Some(store) => store.upsert_post(post).await,
            None => Ok(()),
        }
    }

    async fn persist_enrichment(
        &self,
        instrument: &Instrument,
        enrichment: &EnrichmentResult,
    ) -> Result<(), StorageError> {
        self.log.append(instrument, enrichment).await
    }
}

/// The store described by `config`.
#[must_use]
pub fn build_store(config: &AppConfig, client: &reqwest::Client) -> Arc<dyn PostStore> {
    let vectors = config.qdrant_url.as_deref().map(|url| {
        QdrantStore::new(
            client.clone(),
            url,
            &config.qdrant_collection,
            config.embedding_dim,
        )
    });
    Arc::new(PersistentStore::new(
        vectors,
        EnrichmentLog::new(config.enrichment_log_path.clone()),
    ))
}
