use crate::app_config::{AppConfig, Environment, SourceSettings};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

fn invalid(var: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every setting has a default; only malformed values fail. Decoupled from the
/// real environment so tests can drive it with a `HashMap`.
#[allow(clippy::too_many_lines)]
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e))
    };

    let parse_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(invalid(var, "must be a finite number"))
        }
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(default),
            Ok(raw) => parse_bool_value(&raw).ok_or_else(|| invalid(var, "expected true or false")),
        }
    };

    let source_settings = |prefix: &str,
                           default_rate: &str,
                           default_base_url: &str|
     -> Result<SourceSettings, ConfigError> {
        let rate_var = format!("SOCIALPULSE_{prefix}_RATE_PER_SEC");
        let burst_var = format!("SOCIALPULSE_{prefix}_BURST");
        let rate_per_sec = parse_f64(&rate_var, default_rate)?;
        if rate_per_sec <= 0.0 {
            return Err(invalid(&rate_var, "must be greater than zero"));
        }
        let burst = parse_u32(&burst_var, "1")?;
        if burst == 0 {
            return Err(invalid(&burst_var, "must be at least 1"));
        }
        Ok(SourceSettings {
            enabled: parse_bool(&format!("SOCIALPULSE_{prefix}_ENABLED"), true)?,
            rate_per_sec,
            burst,
            base_url: or_default(&format!("SOCIALPULSE_{prefix}_BASE_URL"), default_base_url)
                .trim_end_matches('/')
                .to_string(),
        })
    };

    let env = parse_environment(&or_default("SOCIALPULSE_ENV", "development"))?;

    let bind_addr = or_default("SOCIALPULSE_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("SOCIALPULSE_BIND_ADDR", e))?;
    let log_level = or_default("SOCIALPULSE_LOG_LEVEL", "info");
    let instruments_path = PathBuf::from(or_default(
        "SOCIALPULSE_INSTRUMENTS_PATH",
        "./config/instruments.yaml",
    ));

    let reddit = source_settings("REDDIT", "0.5", "https://www.reddit.com")?;
    let stocktwits = source_settings("STOCKTWITS", "0.33", "https://api.stocktwits.com")?;
    let x = source_settings("X", "0.5", "https://api.twitter.com")?;
    let x_bearer_token = optional("X_BEARER_TOKEN");

    let fanout_deadline_secs = parse_u64("SOCIALPULSE_FANOUT_DEADLINE_SECS", "45")?;
    let max_concurrent_sources = parse_usize("SOCIALPULSE_MAX_CONCURRENT_SOURCES", "3")?;
    if max_concurrent_sources == 0 {
        return Err(invalid(
            "SOCIALPULSE_MAX_CONCURRENT_SOURCES",
            "must be at least 1",
        ));
    }
    let retry_max_attempts = parse_u32("SOCIALPULSE_RETRY_MAX_ATTEMPTS", "3")?;
    if retry_max_attempts == 0 {
        return Err(invalid("SOCIALPULSE_RETRY_MAX_ATTEMPTS", "must be at least 1"));
    }
    let retry_backoff_base_ms = parse_u64("SOCIALPULSE_RETRY_BACKOFF_BASE_MS", "1000")?;
    let request_timeout_secs = parse_u64("SOCIALPULSE_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("SOCIALPULSE_USER_AGENT", "socialpulse/0.1 (social-sentiment)");

    let bot_threshold = parse_f64("SOCIALPULSE_BOT_THRESHOLD", "0.7")?;
    if !(0.0..=1.0).contains(&bot_threshold) {
        return Err(invalid("SOCIALPULSE_BOT_THRESHOLD", "must be within [0, 1]"));
    }
    let resolver_cache_ttl_secs = parse_u64("SOCIALPULSE_RESOLVER_CACHE_TTL_SECS", "3600")?;

    let trends_enabled = parse_bool("SOCIALPULSE_TRENDS_ENABLED", true)?;
    let trends_url = optional("SOCIALPULSE_TRENDS_URL");
    let sentiment_url = optional("SOCIALPULSE_SENTIMENT_URL");
    let embedding_url = optional("SOCIALPULSE_EMBEDDING_URL");
    let embedding_dim = parse_usize("SOCIALPULSE_EMBEDDING_DIM", "384")?;
    if embedding_dim == 0 {
        return Err(invalid("SOCIALPULSE_EMBEDDING_DIM", "must be at least 1"));
    }
    let qdrant_url = optional("SOCIALPULSE_QDRANT_URL");
    let qdrant_collection = or_default("SOCIALPULSE_QDRANT_COLLECTION", "social_posts");
    let enrichment_log_path = PathBuf::from(or_default(
        "SOCIALPULSE_ENRICHMENT_LOG_PATH",
        "./data/enrichment.jsonl",
    ));

    let dry_run = parse_bool("SOCIALPULSE_DRY_RUN", false)?;
    let strict_persistence = parse_bool("SOCIALPULSE_STRICT_PERSISTENCE", false)?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        instruments_path,
        reddit,
        stocktwits,
        x,
        x_bearer_token,
        fanout_deadline_secs,
        max_concurrent_sources,
        retry_max_attempts,
        retry_backoff_base_ms,
        request_timeout_secs,
        user_agent,
        bot_threshold,
        resolver_cache_ttl_secs,
        trends_enabled,
        trends_url,
        sentiment_url,
        embedding_url,
        embedding_dim,
        qdrant_url,
        qdrant_collection,
        enrichment_log_path,
        dry_run,
        strict_persistence,
    })
}

fn parse_bool_value(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "production" => Ok(Environment::Production),
        "test" => Ok(Environment::Test),
        other => Err(invalid(
            "SOCIALPULSE_ENV",
            format!("unknown environment '{other}'"),
        )),
    }
}
