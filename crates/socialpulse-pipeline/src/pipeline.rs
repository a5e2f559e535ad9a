//! The query entry point: resolve, collect, clean, score, aggregate, persist.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use socialpulse_core::{
    load_instruments, AggregateResult, AppConfig, EnrichmentResult, Instrument, ScoredPost, Source,
    Window,
};

use crate::aggregate::{aggregate, AggregateInput};
use crate::classifier::TeiClassifier;
use crate::clean::PostCleaner;
use crate::embeddings::TeiEmbedder;
use crate::enrichment::{Enricher, HttpTrendsProvider, TrendsProvider};
use crate::error::{PipelineError, ResolutionError, StorageError};
use crate::fanout::FanOut;
use crate::rate_limit::RateLimiter;
use crate::resolver::{InstrumentLookup, RegistryLookup, SymbolResolver};
use crate::retry::RetryPolicy;
use crate::scoring::{
    Embedder, EmbeddingCapability, ScoringStage, SentimentCapability, SentimentModel,
};
use crate::sources::{build_adapters, build_http_client, SourceAdapter};
use crate::storage::{build_store, NoopStore, PostStore};

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub bot_threshold: f64,
    /// Bounds the whole fan-out and, separately, enrichment.
    pub fanout_deadline: Duration,
    pub max_concurrent_sources: usize,
    pub retry: RetryPolicy,
    pub resolver_cache_ttl: Duration,
    pub trends_enabled: bool,
    pub embedding_dim: usize,
    pub dry_run: bool,
    pub strict_persistence: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            bot_threshold: 0.7,
            fanout_deadline: Duration::from_secs(45),
            max_concurrent_sources: Source::ALL.len(),
            retry: RetryPolicy::default(),
            resolver_cache_ttl: Duration::from_secs(3600),
            trends_enabled: true,
            embedding_dim: 384,
            dry_run: false,
            strict_persistence: false,
        }
    }
}

impl PipelineSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            bot_threshold: config.bot_threshold,
            fanout_deadline: Duration::from_secs(config.fanout_deadline_secs),
            max_concurrent_sources: config.max_concurrent_sources,
            retry: RetryPolicy::from_app_config(config),
            resolver_cache_ttl: Duration::from_secs(config.resolver_cache_ttl_secs),
            trends_enabled: config.trends_enabled,
            embedding_dim: config.embedding_dim,
            dry_run: config.dry_run,
            strict_persistence: config.strict_persistence,
        }
    }
}

/// The external capabilities a pipeline is wired to.
pub struct Collaborators {
    pub adapters: Vec<Arc<dyn SourceAdapter>>,
    pub lookup: Arc<dyn InstrumentLookup>,
    pub limiter: RateLimiter,
    pub sentiment: Option<Arc<dyn SentimentModel>>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub trends: Option<Arc<dyn TrendsProvider>>,
    pub store: Arc<dyn PostStore>,
}

impl Collaborators {
    /// Adapters and lookup only: no throttling, fallback scoring, no
    /// enrichment, and a discarding store.
    #[must_use]
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, lookup: Arc<dyn InstrumentLookup>) -> Self {
        Self {
            adapters,
            lookup,
            limiter: RateLimiter::default(),
            sentiment: None,
            embedder: None,
            trends: None,
            store: Arc::new(NoopStore),
        }
    }
}

/// Which parts of the pipeline are live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub sources: Vec<Source>,
    pub enrichment: bool,
    pub sentiment_primary: bool,
    /// `primary` or `fallback`, after the one-time health check.
    pub sentiment: String,
    pub embedding_primary: bool,
    pub embedding: String,
    pub storage: String,
    pub dry_run: bool,
}

pub struct SocialPipeline {
    settings: PipelineSettings,
    resolver: SymbolResolver,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    fanout: FanOut,
    scoring: ScoringStage,
    enricher: Enricher,
    store: Arc<dyn PostStore>,
}

impl SocialPipeline {
    #[must_use]
    pub fn new(settings: PipelineSettings, collaborators: Collaborators) -> Self {
        let Collaborators {
            adapters,
            lookup,
            limiter,
            sentiment,
            embedder,
            trends,
            store,
        } = collaborators;

        let fanout = FanOut::new(
            Arc::new(limiter),
            settings.retry,
            settings.fanout_deadline,
            settings.max_concurrent_sources,
        );
        let scoring = ScoringStage::new(
            SentimentCapability::new(sentiment),
            EmbeddingCapability::new(embedder, settings.embedding_dim),
        );
        let enricher = Enricher::new(trends, settings.trends_enabled, settings.fanout_deadline);

        Self {
            resolver: SymbolResolver::new(lookup, settings.resolver_cache_ttl),
            adapters,
            fanout,
            scoring,
            enricher,
            store,
            settings,
        }
    }

    /// Wires the HTTP adapters, TEI clients, trends sidecar, and stores
    /// described by `config`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Config`] if the instrument registry cannot be loaded.
    /// - [`PipelineError::HttpClient`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, PipelineError> {
        let registry = load_instruments(&config.instruments_path)?;
        let lookup = RegistryLookup::new(registry.instruments);
        let client = build_http_client(config)?;

        let sentiment = config
            .sentiment_url
            .as_deref()
            .map(|url| -> Arc<dyn SentimentModel> {
                Arc::new(TeiClassifier::new(client.clone(), url))
            });
        let embedder = config
            .embedding_url
            .as_deref()
            .map(|url| -> Arc<dyn Embedder> {
                Arc::new(TeiEmbedder::new(client.clone(), url, config.embedding_dim))
            });
        let trends = config
            .trends_url
            .as_deref()
            .map(|url| -> Arc<dyn TrendsProvider> {
                Arc::new(HttpTrendsProvider::new(client.clone(), url))
            });
        let store: Arc<dyn PostStore> = if config.dry_run {
            Arc::new(NoopStore)
        } else {
            build_store(config, &client)
        };

        let adapters = build_adapters(config, &client);
        tracing::info!(
            instruments = lookup.len(),
            sources = ?adapters.iter().map(|a| a.source()).collect::<Vec<_>>(),
            store = store.name(),
            dry_run = config.dry_run,
            "pipeline configured"
        );

        Ok(Self::new(
            PipelineSettings::from_app_config(config),
            Collaborators {
                adapters,
                lookup: Arc::new(lookup),
                limiter: RateLimiter::from_app_config(config),
                sentiment,
                embedder,
                trends,
                store,
            },
        ))
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Resolves a free-form query without collecting anything.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError`] for blank or unknown queries.
    pub async fn resolve(&self, query: &str) -> Result<Instrument, ResolutionError> {
        self.resolver.resolve(query).await
    }

    /// Runs one query end to end.
    ///
    /// Source failures, scoring fallbacks, and missing enrichment degrade the
    /// result without failing it.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Resolution`] when the query names no instrument; no
    ///   source is contacted.
    /// - [`PipelineError::Storage`] only under strict persistence.
    pub async fn query(
        &self,
        query: &str,
        window: Window,
    ) -> Result<AggregateResult, PipelineError> {
        let instrument = self.resolver.resolve(query).await?;
        tracing::info!(
            query,
            symbol = %instrument.symbol,
            window = %window,
            "running social query"
        );

        let (collection, enrichment) = tokio::join!(
            self.fanout.collect(&self.adapters, &instrument, window),
            self.enricher.enrich(&instrument, window),
        );

        let cleaner = PostCleaner::new(&instrument, self.settings.bot_threshold);
        let (normalized, filter_stats) = cleaner.clean_all(collection.merged_posts());
        let scored = self.scoring.score_all(normalized).await;

        let raw_counts = collection.raw_counts();
        let errors = collection.errors();
        let result = aggregate(AggregateInput {
            instrument: &instrument,
            window,
            raw_counts: &raw_counts,
            errors: &errors,
            scored: &scored,
            filter_stats: &filter_stats,
            enrichment: enrichment.as_ref(),
        });

        if self.settings.dry_run {
            tracing::debug!(symbol = %instrument.symbol, "dry run, skipping persistence");
        } else {
            self.persist(&instrument, &scored, enrichment.as_ref())
                .await?;
        }

        tracing::info!(
            symbol = %result.symbol,
            posts_found = result.posts_found,
            posts_processed = result.posts_processed,
            failed_sources = result.source_errors.len(),
            enriched = result.search_interest.is_some(),
            "social query complete"
        );
        Ok(result)
    }

    /// Reports configured components, running the scoring health checks if
    /// they have not run yet.
    pub async fn health(&self) -> HealthReport {
        let sentiment = self.scoring.sentiment();
        let embedding = self.scoring.embedding();
        HealthReport {
            sources: self.adapters.iter().map(|a| a.source()).collect(),
            enrichment: self.enricher.is_enabled(),
            sentiment_primary: sentiment.has_primary(),
            sentiment: sentiment.variant().await.to_string(),
            embedding_primary: embedding.has_primary(),
            embedding: embedding.variant().await.to_string(),
            storage: self.store.name().to_string(),
            dry_run: self.settings.dry_run,
        }
    }

    async fn persist(
        &self,
        instrument: &Instrument,
        scored: &[ScoredPost],
        enrichment: Option<&EnrichmentResult>,
    ) -> Result<(), StorageError> {
        let mut failed = 0usize;
        for post in scored {
            if let Err(e) = self.store.persist(post).await {
                if self.settings.strict_persistence {
                    return Err(e);
                }
                tracing::warn!(
                    store = self.store.name(),
                    source = %post.source(),
                    platform_id = %post.post.raw.platform_id,
                    error = %e,
                    "failed to persist post"
                );
                failed += 1;
            }
        }

        if let Some(enrichment) = enrichment {
            if let Err(e) = self.store.persist_enrichment(instrument, enrichment).await {
                if self.settings.strict_persistence {
                    return Err(e);
                }
                tracing::warn!(
                    store = self.store.name(),
                    symbol = %instrument.symbol,
                    error = %e,
                    "failed to persist enrichment"
                );
            }
        }

        if failed > 0 {
            tracing::warn!(failed, total = scored.len(), "some posts were not persisted");
        }
        Ok(())
    }
}
