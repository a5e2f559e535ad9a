//! Financial-lexicon sentiment heuristics and the binary-classifier mapping.

use socialpulse_core::SentimentScore;

/// Model tag for the lexicon heuristic.
pub const HEURISTIC_MODEL: &str = "heuristic";

/// Model tag for the binary NEGATIVE/POSITIVE classifier.
pub const CLASSIFIER_MODEL: &str = "distilbert";

/// Below this classifier confidence, polarity is dampened toward neutral.
pub const NEUTRAL_CONFIDENCE: f64 = 0.6;

pub(crate) const POSITIVE_WORDS: &[&str] = &[
    "bullish",
    "moon",
    "buy",
    "long",
    "growth",
    "profit",
    "gain",
    "up",
    "surge",
    "boom",
    "excellent",
    "great",
    "strong",
    "rocket",
    "soar",
    "rally",
    "breakout",
    "undervalued",
];

pub(crate) const NEGATIVE_WORDS: &[&str] = &[
    "bearish",
    "crash",
    "sell",
    "short",
    "loss",
    "down",
    "dump",
    "fall",
    "decline",
    "terrible",
    "bad",
    "weak",
    "tank",
    "plunge",
    "overvalued",
    "bubble",
    "scam",
];

/// Phrase weights for sarcasm; the strongest indicator present wins.
const SARCASM_INDICATORS: &[(&str, f64)] = &[
    ("yeah right", 0.8),
    ("sure thing", 0.7),
    ("totally", 0.4),
    ("/s", 0.95),
    ("\u{1f644}", 0.9),
    ("lol", 0.3),
    ("obviously", 0.6),
    ("brilliant", 0.5),
    ("genius", 0.6),
    ("great job", 0.5),
    ("what could go wrong", 0.9),
    ("to the moon", 0.4),
];

const DEFAULT_SARCASM: f64 = 0.05;

/// Sarcasm probability in `[0.0, 1.0]` from indicator phrases.
#[must_use]
pub fn detect_sarcasm(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    let mut max = SARCASM_INDICATORS
        .iter()
        .filter(|(indicator, _)| lowered.contains(indicator))
        .map(|&(_, weight)| weight)
        .fold(0.0_f64, f64::max);

    if text.contains("?!") || text.contains("!!!") {
        max = max.max(0.5);
    }

    if max > 0.0 {
        max
    } else {
        DEFAULT_SARCASM
    }
}

/// Counts positive and negative lexicon words in `text`.
fn opinion_counts(text: &str) -> (usize, usize) {
    let mut positive = 0;
    let mut negative = 0;
    for word in text.split_whitespace() {
        let w = word
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();
        if POSITIVE_WORDS.contains(&w.as_str()) {
            positive += 1;
        } else if NEGATIVE_WORDS.contains(&w.as_str()) {
            negative += 1;
        }
    }
    (positive, negative)
}

/// Scores `text` with the financial lexicon.
///
/// Polarity is `(pos - neg) / (pos + neg)`. With no opinion words the score is
/// neutral with confidence `0.3` and subjectivity `0.2`; otherwise confidence
/// is `min(0.7, hits / 5)` and subjectivity `min(1.0, hits / 3)`.
#[must_use]
pub fn heuristic_score(text: &str) -> SentimentScore {
    let (positive, negative) = opinion_counts(text);
    let hits = positive + negative;

    #[allow(clippy::cast_precision_loss)]
    let (polarity, confidence, subjectivity) = if hits == 0 {
        (0.0, 0.3, 0.2)
    } else {
        let total = hits as f64;
        (
            (positive as f64 - negative as f64) / total,
            f64::min(0.7, total / 5.0),
            f64::min(1.0, total / 3.0),
        )
    };

    SentimentScore {
        polarity: polarity.clamp(-1.0, 1.0),
        subjectivity,
        sarcasm_prob: detect_sarcasm(text),
        confidence,
        model: HEURISTIC_MODEL.to_string(),
    }
}

/// Maps binary classifier probabilities onto a sentiment score.
///
/// The classifier has no neutral class: polarity is `pos - neg`, confidence is
/// the larger probability, and when confidence falls under
/// [`NEUTRAL_CONFIDENCE`] polarity is multiplied by it. Subjectivity is `|polarity|`.
#[must_use]
pub fn binary_classifier_score(negative: f64, positive: f64, text: &str) -> SentimentScore {
    let mut polarity = positive - negative;
    let confidence = negative.max(positive);
    if confidence < NEUTRAL_CONFIDENCE {
        polarity *= confidence;
    }
    let polarity = polarity.clamp(-1.0, 1.0);

    SentimentScore {
        polarity,
        subjectivity: polarity.abs(),
        sarcasm_prob: detect_sarcasm(text),
        confidence,
        model: CLASSIFIER_MODEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn no_opinion_words_is_neutral_low_confidence() {
        let s = heuristic_score("$AAPL reports on thursday");
        assert!(approx(s.polarity, 0.0));
        assert!(approx(s.confidence, 0.3));
        assert!(approx(s.subjectivity, 0.2));
        assert_eq!(s.model, HEURISTIC_MODEL);
    }

    #[test]
    fn positive_words_give_positive_polarity() {
        let s = heuristic_score("Very bullish, expecting a breakout and a rally!");
        assert!(approx(s.polarity, 1.0));
        assert!(approx(s.confidence, 0.6));
        assert!(approx(s.subjectivity, 1.0));
    }

    #[test]
    fn mixed_words_balance_out() {
        let s = heuristic_score("bullish long term but short term crash incoming");
        // pos: bullish, long  neg: short, crash
        assert!(approx(s.polarity, 0.0));
        assert!(approx(s.confidence, 0.7));
        assert!(approx(s.subjectivity, 1.0));
    }

    #[test]
    fn words_match_whole_words_only() {
        let s = heuristic_score("supper was upbeat");
        assert!(approx(s.polarity, 0.0));
        assert!(approx(s.confidence, 0.3));
    }

    #[test]
    fn sarcasm_takes_the_strongest_indicator() {
        assert!(approx(detect_sarcasm("great job lol /s"), 0.95));
        assert!(approx(detect_sarcasm("what could go wrong"), 0.9));
        assert!(approx(detect_sarcasm("really?!"), 0.5));
        assert!(approx(detect_sarcasm("earnings on thursday"), DEFAULT_SARCASM));
        assert!(approx(detect_sarcasm("sure \u{1f644}"), 0.9));
    }

    #[test]
    fn confident_classifier_keeps_full_polarity() {
        let s = binary_classifier_score(0.1, 0.9, "good");
        assert!(approx(s.polarity, 0.8));
        assert!(approx(s.confidence, 0.9));
        assert!(approx(s.subjectivity, 0.8));
        assert_eq!(s.model, CLASSIFIER_MODEL);
    }

    #[test]
    fn unsure_classifier_is_dampened_toward_neutral() {
        let s = binary_classifier_score(0.45, 0.55, "meh");
        assert!(approx(s.polarity, 0.1 * 0.55));
        assert!(approx(s.confidence, 0.55));
        assert!(approx(s.subjectivity, 0.055));
    }

    #[test]
    fn negative_classifier_output() {
        let s = binary_classifier_score(0.95, 0.05, "awful");
        assert!(approx(s.polarity, -0.9));
        assert!(approx(s.subjectivity, 0.9));
    }
}
