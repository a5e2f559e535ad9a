use std::net::SocketAddr;
use std::path::PathBuf;

use crate::types::Source;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Per-source switches and token bucket parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub enabled: bool,
    /// Token refill rate in tokens per second.
    pub rate_per_sec: f64,
    /// Bucket capacity (maximum burst).
    pub burst: u32,
    pub base_url: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub instruments_path: PathBuf,
    pub reddit: SourceSettings,
    pub stocktwits: SourceSettings,
    pub x: SourceSettings,
    pub x_bearer_token: Option<String>,
    pub fanout_deadline_secs: u64,
    pub max_concurrent_sources: usize,
    pub retry_max_attempts: u32,
    pub retry_backoff_base_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub bot_threshold: f64,
    pub resolver_cache_ttl_secs: u64,
    pub trends_enabled: bool,
    pub trends_url: Option<String>,
    pub sentiment_url: Option<String>,
    pub embedding_url: Option<String>,
    pub embedding_dim: usize,
    pub qdrant_url: Option<String>,
    pub qdrant_collection: String,
    pub enrichment_log_path: PathBuf,
    pub dry_run: bool,
    pub strict_persistence: bool,
}

impl AppConfig {
    #[must_use]
    pub fn source(&self, source: Source) -> &SourceSettings {
        match source {
            Source::Reddit => &self.reddit,
            Source::Stocktwits => &self.stocktwits,
            Source::X => &self.x,
        }
    }

    /// Sources that are switched on and have the credentials they need.
    #[must_use]
    pub fn enabled_sources(&self) -> Vec<Source> {
        Source::ALL
            .into_iter()
            .filter(|s| self.source(*s).enabled)
            .filter(|s| *s != Source::X || self.x_bearer_token.is_some())
            .collect()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("instruments_path", &self.instruments_path)
            .field("reddit", &self.reddit)
            .field("stocktwits", &self.stocktwits)
            .field("x", &self.x)
            .field(
                "x_bearer_token",
                &self.x_bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .field("fanout_deadline_secs", &self.fanout_deadline_secs)
            .field("max_concurrent_sources", &self.max_concurrent_sources)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("bot_threshold", &self.bot_threshold)
            .field("resolver_cache_ttl_secs", &self.resolver_cache_ttl_secs)
            .field("trends_enabled", &self.trends_enabled)
            .field("trends_url", &self.trends_url)
            .field("sentiment_url", &self.sentiment_url)
            .field("embedding_url", &self.embedding_url)
            .field("embedding_dim", &self.embedding_dim)
            .field("qdrant_url", &self.qdrant_url)
            .field("qdrant_collection", &self.qdrant_collection)
            .field("enrichment_log_path", &self.enrichment_log_path)
            .field("dry_run", &self.dry_run)
            .field("strict_persistence", &self.strict_persistence)
            .finish()
    }
}
