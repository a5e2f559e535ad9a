use socialpulse_core::ConfigError;
use thiserror::Error;

/// The query could not be mapped to an instrument. A user-input error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("could not resolve \"{query}\" to an instrument")]
    Unresolvable { query: String },
}

/// A sentiment or embedding capability failed for one call.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TEI error: {0}")]
    Tei(String),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("trends provider error: {0}")]
    Upstream(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Qdrant error: {0}")]
    Qdrant(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that abort a whole query.
///
/// Collection, scoring, and enrichment failures never appear here; they
/// degrade the result instead. `Storage` only surfaces under strict persistence.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("persistence failed: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
