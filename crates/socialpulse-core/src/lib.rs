//! Shared domain types and configuration for socialpulse.
//!
//! Everything that crosses a crate boundary lives here: the post lifecycle
//! (`RawPost` → `NormalizedPost` → `ScoredPost`), the resolved `Instrument`,
//! the per-source `FetchError` taxonomy, and the `AggregateResult` returned
//! to callers.

pub mod aggregate;
pub mod app_config;
pub mod config;
pub mod fetch;
pub mod instrument;
pub mod instruments;
pub mod posts;
pub mod types;

use thiserror::Error;

pub use aggregate::{AggregateResult, EnrichmentResult, FilterStats, InterestPoint};
pub use app_config::{AppConfig, Environment, SourceSettings};
pub use config::{load_app_config, load_app_config_from_env};
pub use fetch::{FetchError, FetchErrorReason};
pub use instrument::Instrument;
pub use instruments::{load_instruments, InstrumentsFile};
pub use posts::{NormalizedPost, RawPost, ScoredPost, SentimentScore};
pub use types::{InvalidWindow, Source, Window};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read instrument registry {path}: {source}")]
    RegistryIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse instrument registry: {0}")]
    RegistryParse(#[from] serde_yaml::Error),

    #[error("instrument registry validation failed: {0}")]
    Validation(String),
}
