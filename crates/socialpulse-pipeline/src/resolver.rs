//! Symbol resolution: free-form query to canonical [`Instrument`], cached.
//!
//! [`SymbolResolver`] owns the cache; the matching logic itself is an
//! [`InstrumentLookup`] capability so it can be replaced by a remote service
//! or a test fake. The cache is shared across queries and tolerates racing
//! writers: two concurrent misses both resolve and the last write wins.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use socialpulse_core::Instrument;
use tokio::time::Instant;

use crate::error::ResolutionError;

static CASHTAG_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$([A-Za-z]{1,5}(?:\.[A-Za-z])?)$").expect("valid cashtag query regex")
});

static BARE_TICKER_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]{1,5}(?:\.[A-Za-z])?$").expect("valid ticker query regex")
});

/// Corporate suffixes ignored when comparing company names.
const CORPORATE_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "corp",
    "corporation",
    "co",
    "company",
    "ltd",
    "plc",
];

/// Shortest query that may match a company name by prefix.
const MIN_PREFIX_LEN: usize = 4;

/// Upper bound on cached queries; the oldest entry is evicted past it.
const MAX_CACHE_ENTRIES: usize = 10_000;

/// Maps a query to an instrument, or `None` when nothing matches.
///
/// [`SymbolResolver`] always passes the output of [`normalize_query`], so an
/// implementation must not depend on letter case.
#[async_trait]
pub trait InstrumentLookup: Send + Sync {
    async fn lookup(&self, query: &str) -> Option<Instrument>;
}

/// Cache key: trimmed, whitespace-collapsed, lowercase.
#[must_use]
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lowercase, punctuation-free company name without corporate suffixes.
///
/// `"Tesla, Inc."` and `"tesla"` both normalize to `"tesla"`.
#[must_use]
pub fn normalize_company_name(name: &str) -> String {
    let lowered: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    lowered
        .split_whitespace()
        .filter(|word| !CORPORATE_SUFFIXES.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

struct RegistryEntry {
    instrument: Instrument,
    names: Vec<String>,
}

/// Lookup over the instrument registry.
///
/// Match order:
/// 1. registry symbol, case-insensitive, with an optional leading `$`
/// 2. normalized company name or alias
/// 3. company name prefix of at least four characters, first in registry order
/// 4. an unregistered 1-5 letter ticker, with or without a leading `$`
pub struct RegistryLookup {
    entries: Vec<RegistryEntry>,
}

impl RegistryLookup {
    #[must_use]
    pub fn new(instruments: Vec<Instrument>) -> Self {
        let entries = instruments
            .into_iter()
            .map(|instrument| {
                let names = instrument
                    .name_variants()
                    .map(normalize_company_name)
                    .filter(|n| !n.is_empty())
                    .collect();
                RegistryEntry { instrument, names }
            })
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn by_symbol(&self, symbol: &str) -> Option<&Instrument> {
        self.entries
            .iter()
            .map(|e| &e.instrument)
            .find(|i| i.symbol.eq_ignore_ascii_case(symbol))
    }

    fn by_name(&self, normalized: &str) -> Option<&Instrument> {
        self.entries
            .iter()
            .find(|e| e.names.iter().any(|n| n == normalized))
            .map(|e| &e.instrument)
    }

    fn by_prefix(&self, normalized: &str) -> Option<&Instrument> {
        if normalized.chars().count() < MIN_PREFIX_LEN {
            return None;
        }
        self.entries
            .iter()
            .find(|e| e.names.iter().any(|n| n.starts_with(normalized)))
            .map(|e| &e.instrument)
    }

    fn resolve_sync(&self, query: &str) -> Option<Instrument> {
        let trimmed = query.trim();
        let symbol = trimmed.strip_prefix('$').unwrap_or(trimmed);

        if let Some(found) = self.by_symbol(symbol) {
            return Some(found.clone());
        }

        let normalized = normalize_company_name(trimmed);
        if !normalized.is_empty() {
            if let Some(found) = self
                .by_name(&normalized)
                .or_else(|| self.by_prefix(&normalized))
            {
                return Some(found.clone());
            }
        }

        if let Some(caps) = CASHTAG_QUERY.captures(trimmed) {
            return Some(Instrument::unlisted(&caps[1]));
        }
        if BARE_TICKER_QUERY.is_match(trimmed) {
            return Some(Instrument::unlisted(trimmed));
        }
        None
    }
}

#[async_trait]
impl InstrumentLookup for RegistryLookup {
    async fn lookup(&self, query: &str) -> Option<Instrument> {
        self.resolve_sync(query)
    }
}

struct CacheEntry {
    instrument: Instrument,
    inserted_at: Instant,
}

/// Read-through cache in front of an [`InstrumentLookup`].
pub struct SymbolResolver {
    lookup: Arc<dyn InstrumentLookup>,
    ttl: Duration,
    cache: RwLock<HashMap<String, CacheEntry>>,
    max_entries: usize,
}

impl SymbolResolver {
    /// `ttl` of zero disables caching.
    #[must_use]
    pub fn new(lookup: Arc<dyn InstrumentLookup>, ttl: Duration) -> Self {
        Self {
            lookup,
            ttl,
            cache: RwLock::new(HashMap::new()),
            max_entries: MAX_CACHE_ENTRIES,
        }
    }

    /// Resolves `query`, consulting the cache first.
    ///
    /// # Errors
    ///
    /// - [`ResolutionError::EmptyQuery`] for blank input.
    /// - [`ResolutionError::Unresolvable`] when the lookup finds nothing.
    ///   Misses are not cached.
    pub async fn resolve(&self, query: &str) -> Result<Instrument, ResolutionError> {
        let key = normalize_query(query);
        if key.is_empty() {
            return Err(ResolutionError::EmptyQuery);
        }

        if let Some(hit) = self.cached(&key) {
            tracing::debug!(query = %key, symbol = %hit.symbol, "resolver cache hit");
            return Ok(hit);
        }
        tracing::debug!(query = %key, "resolver cache miss");

        let Some(instrument) = self.lookup.lookup(&key).await else {
            return Err(ResolutionError::Unresolvable {
                query: query.trim().to_string(),
            });
        };

        if !self.ttl.is_zero() {
            self.store(key, &instrument);
        }
        Ok(instrument)
    }

    /// Inserts after dropping expired entries and, when still full, the oldest one.
    fn store(&self, key: String, instrument: &Instrument) {
        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        cache.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        if cache.len() >= self.max_entries && !cache.contains_key(&key) {
            let oldest = cache
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                cache.remove(&oldest);
            }
        }
        cache.insert(
            key,
            CacheEntry {
                instrument: instrument.clone(),
                inserted_at: Instant::now(),
            },
        );
    }

    fn cached(&self, key: &str) -> Option<Instrument> {
        if self.ttl.is_zero() {
            return None;
        }
        let cache = self
            .cache
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        cache
            .get(key)
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| entry.instrument.clone())
    }
}
