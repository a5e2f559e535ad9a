//! Social sentiment collection-and-aggregation pipeline.
//!
//! A query is resolved to an [`Instrument`](socialpulse_core::Instrument),
//! fanned out to every enabled source under per-source rate limits and a
//! retry policy, merged, deduplicated, cleaned, scored, and reduced to one
//! [`AggregateResult`](socialpulse_core::AggregateResult). Enrichment runs
//! alongside collection and persistence is a side effect of the query.
//!
//! Only an unresolvable query (or a storage failure under strict
//! persistence) fails [`SocialPipeline::query`]; every other failure
//! degrades the result.

pub mod aggregate;
pub mod classifier;
pub mod clean;
pub mod embeddings;
pub mod enrichment;
pub mod error;
pub mod fanout;
pub mod pipeline;
pub mod rate_limit;
pub mod resolver;
pub mod retry;
pub mod scorer;
pub mod scoring;
pub mod sources;
pub mod storage;

pub use aggregate::{aggregate, AggregateInput};
pub use classifier::TeiClassifier;
pub use clean::{CleanOutcome, PostCleaner};
pub use embeddings::{HashEmbedder, TeiEmbedder};
pub use enrichment::{Enricher, HttpTrendsProvider, TrendsProvider};
pub use error::{EnrichmentError, PipelineError, ResolutionError, ScoringError, StorageError};
pub use fanout::{CollectionOutcome, FanOut, SourceOutcome};
pub use pipeline::{Collaborators, HealthReport, PipelineSettings, SocialPipeline};
pub use rate_limit::{BucketConfig, RateLimiter};
pub use resolver::{InstrumentLookup, RegistryLookup, SymbolResolver};
pub use retry::{fetch_with_retry, RetryPolicy};
pub use scoring::{
    Embedder, EmbeddingCapability, HeuristicSentiment, ScoringStage, SentimentCapability,
    SentimentModel, Variant,
};
pub use sources::{build_adapters, build_http_client, SourceAdapter};
pub use storage::{NoopStore, PersistentStore, PostStore};
