use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fetch::FetchError;
use crate::instrument::Instrument;
use crate::types::{Source, Window};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Search-interest signal for an instrument, independent of any post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    /// Ordered by timestamp, oldest first.
    #[serde(default)]
    pub interest_over_time: Vec<InterestPoint>,
    #[serde(default)]
    pub related_queries: Vec<String>,
    #[serde(default)]
    pub interest_by_region: BTreeMap<String, f64>,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Where posts were lost between collection and scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    pub total_input: usize,
    pub duplicates: usize,
    pub no_symbols: usize,
    pub probable_bots: usize,
    pub processed: usize,
}

/// One aggregated view per query.
///
/// Averages are `None` when no post survived filtering, which distinguishes
/// "no signal" from a neutral signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub symbol: String,
    pub window: Window,
    pub resolved_instrument: Instrument,
    /// Raw posts across all successful sources, before dedup and filtering.
    pub posts_found: usize,
    /// Posts that survived dedup, cleaning, and filtering.
    pub posts_processed: usize,
    /// Processed (post-filter) count per configured source.
    pub sources: BTreeMap<Source, usize>,
    pub source_errors: BTreeMap<Source, FetchError>,
    pub avg_polarity: Option<f64>,
    pub avg_subjectivity: Option<f64>,
    pub avg_confidence: Option<f64>,
    pub avg_sarcasm_prob: Option<f64>,
    /// Posts scored with the neutral fallback.
    pub degraded_scores: usize,
    pub filter_stats: FilterStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_interest: Option<EnrichmentResult>,
}
