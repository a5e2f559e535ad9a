//! Aggregator: a pure reduction from processed posts to one response.
//!
//! No clock is read and posts are summed in `(source, platform_id)` order, so
//! identical inputs give bit-identical output whatever order the fan-out
//! completed in.

use std::collections::BTreeMap;

use socialpulse_core::{
    AggregateResult, EnrichmentResult, FetchError, FilterStats, Instrument, ScoredPost, Source,
    Window,
};

/// Everything the aggregator reduces.
#[derive(Debug, Clone, Copy)]
pub struct AggregateInput<'a> {
    pub instrument: &'a Instrument,
    pub window: Window,
    /// Raw post count per source that answered.
    pub raw_counts: &'a BTreeMap<Source, usize>,
    pub errors: &'a BTreeMap<Source, FetchError>,
    pub scored: &'a [ScoredPost],
    pub filter_stats: &'a FilterStats,
    pub enrichment: Option<&'a EnrichmentResult>,
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[must_use]
pub fn aggregate(input: AggregateInput<'_>) -> AggregateResult {
    let mut ordered: Vec<&ScoredPost> = input.scored.iter().collect();
    ordered.sort_by(|a, b| {
        (a.source(), a.post.raw.platform_id.as_str())
            .cmp(&(b.source(), b.post.raw.platform_id.as_str()))
    });

    let mut sources: BTreeMap<Source, usize> = input
        .raw_counts
        .keys()
        .chain(input.errors.keys())
        .map(|source| (*source, 0))
        .collect();
    for post in &ordered {
        *sources.entry(post.source()).or_insert(0) += 1;
    }

    let field = |f: fn(&ScoredPost) -> f64| ordered.iter().map(|p| f(p)).collect::<Vec<_>>();

    AggregateResult {
        symbol: input.instrument.symbol.clone(),
        window: input.window,
        resolved_instrument: input.instrument.clone(),
        posts_found: input.raw_counts.values().sum(),
        posts_processed: ordered.len(),
        sources,
        source_errors: input.errors.clone(),
        avg_polarity: mean(&field(|p| p.sentiment.polarity)),
        avg_subjectivity: mean(&field(|p| p.sentiment.subjectivity)),
        avg_confidence: mean(&field(|p| p.sentiment.confidence)),
        avg_sarcasm_prob: mean(&field(|p| p.sentiment.sarcasm_prob)),
        degraded_scores: ordered.iter().filter(|p| p.sentiment.is_degraded()).count(),
        filter_stats: input.filter_stats.clone(),
        search_interest: input.enrichment.cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use socialpulse_core::{FetchErrorReason, NormalizedPost, RawPost, SentimentScore};

    fn scored(source: Source, id: &str, polarity: f64, model: &str) -> ScoredPost {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        ScoredPost {
            post: NormalizedPost {
                raw: RawPost::new(source, id, "u", created, "$AAPL"),
                clean_text: "$AAPL".to_string(),
                symbols: ["AAPL".to_string()].into_iter().collect(),
                bot_score: 0.0,
            },
            sentiment: SentimentScore {
                polarity,
                subjectivity: polarity.abs(),
                sarcasm_prob: 0.05,
                confidence: 0.5,
                model: model.to_string(),
            },
            embedding: vec![1.0, 0.0],
        }
    }

    #[test]
    fn empty_input_reports_absent_averages() {
        let instrument = Instrument::unlisted("AAPL");
        let raw_counts = BTreeMap::from([(Source::Reddit, 3)]);
        let errors = BTreeMap::new();
        let result = aggregate(AggregateInput {
            instrument: &instrument,
            window: Window::Hours24,
            raw_counts: &raw_counts,
            errors: &errors,
            scored: &[],
            filter_stats: &FilterStats::default(),
            enrichment: None,
        });
        assert_eq!(result.posts_found, 3);
        assert_eq!(result.posts_processed, 0);
        assert_eq!(result.avg_polarity, None);
        assert_eq!(result.avg_confidence, None);
        assert_eq!(result.sources[&Source::Reddit], 0);
    }

    #[test]
    fn averages_and_per_source_counts() {
        let instrument = Instrument::unlisted("AAPL");
        let raw_counts = BTreeMap::from([(Source::Reddit, 4), (Source::X, 2)]);
        let errors = BTreeMap::from([(
            Source::Stocktwits,
            FetchError::new(Source::Stocktwits, FetchErrorReason::Timeout, "slow"),
        )]);
        let posts = vec![
            scored(Source::X, "1", -0.5, "heuristic"),
            scored(Source::Reddit, "2", 1.0, "heuristic"),
            scored(Source::Reddit, "1", 0.0, "fallback"),
        ];
        let result = aggregate(AggregateInput {
            instrument: &instrument,
            window: Window::Days7,
            raw_counts: &raw_counts,
            errors: &errors,
            scored: &posts,
            filter_stats: &FilterStats::default(),
            enrichment: None,
        });
        assert_eq!(result.posts_found, 6);
        assert_eq!(result.posts_processed, 3);
        assert_eq!(result.sources[&Source::Reddit], 2);
        assert_eq!(result.sources[&Source::X], 1);
        assert_eq!(result.sources[&Source::Stocktwits], 0);
        assert_eq!(result.degraded_scores, 1);
        assert!((result.avg_polarity.unwrap() - 0.5 / 3.0).abs() < 1e-12);
        assert!((result.avg_confidence.unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(
            result.source_errors[&Source::Stocktwits].reason,
            FetchErrorReason::Timeout
        );
    }

    #[test]
    fn input_order_does_not_change_output() {
        let instrument = Instrument::unlisted("AAPL");
        let raw_counts = BTreeMap::from([(Source::Reddit, 3), (Source::X, 1)]);
        let errors = BTreeMap::new();
        let mut posts = vec![
            scored(Source::Reddit, "a", 0.1, "heuristic"),
            scored(Source::Reddit, "b", 0.7, "heuristic"),
            scored(Source::X, "c", -0.3, "heuristic"),
            scored(Source::Reddit, "d", 0.2, "heuristic"),
        ];
        let input = |posts: &[ScoredPost]| {
            serde_json::to_string(&aggregate(AggregateInput {
                instrument: &instrument,
                window: Window::Hours24,
                raw_counts: &raw_counts,
                errors: &errors,
                scored: posts,
                filter_stats: &FilterStats::default(),
                enrichment: None,
            }))
            .unwrap()
        };
        let forward = input(&posts);
        posts.reverse();
        let reversed = input(&posts);
        assert_eq!(forward, reversed);
        assert_eq!(forward, input(&posts));
    }

    #[test]
    fn enrichment_is_carried_through() {
        let instrument = Instrument::unlisted("AAPL");
        let enrichment = EnrichmentResult {
            interest_over_time: vec![],
            related_queries: vec!["aapl".to_string()],
            interest_by_region: BTreeMap::new(),
            fetched_at: None,
        };
        let result = aggregate(AggregateInput {
            instrument: &instrument,
            window: Window::Hours24,
            raw_counts: &BTreeMap::new(),
            errors: &BTreeMap::new(),
            scored: &[],
            filter_stats: &FilterStats::default(),
            enrichment: Some(&enrichment),
        });
        assert_eq!(result.search_interest, Some(enrichment));
    }
}
