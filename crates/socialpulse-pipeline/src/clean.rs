//! Cleaning and filtering: dedup, text normalization, symbol extraction, and
//! the bot-likelihood filter.
//!
//! Every step is a pure function of its input. Deduplication runs first over
//! the merged fan-out output and keeps the first-seen copy of each
//! `(source, platform_id)`.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use socialpulse_core::{FilterStats, Instrument, NormalizedPost, RawPost};

use crate::resolver::normalize_company_name;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid URL regex"));

static CASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([A-Za-z]{1,5}(?:\.[A-Za-z])?)\b").expect("valid cashtag regex")
});

/// Phrases typical of pump groups and spam accounts.
const PROMO_PHRASES: &[&str] = &[
    "discord",
    "telegram",
    "whatsapp",
    "dm me",
    "free signals",
    "join my",
    "guaranteed",
    "100x",
    "1000x",
    "link in bio",
    "airdrop",
    "giveaway",
    "not financial advice but",
];

/// Strips URLs and collapses whitespace.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    URL_RE
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Distinct cashtag symbols, uppercased.
#[must_use]
pub fn extract_cashtags(text: &str) -> BTreeSet<String> {
    CASHTAG_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_uppercase())
        .collect()
}

/// Heuristic bot likelihood in `[0.0, 1.0]`.
///
/// | Signal                                            | Weight        |
/// |---------------------------------------------------|---------------|
/// | five or more distinct cashtags                    | 0.35          |
/// | promotional phrase                                | 0.25 each, ≤ 0.5 |
/// | two or more links                                 | 0.15          |
/// | mostly uppercase (≥ 20 letters, > 70 %)           | 0.15          |
/// | repetitive wording (≥ 6 words, < 40 % unique)     | 0.2           |
/// | every reported engagement counter is zero         | 0.1           |
/// | author has zero followers                         | 0.15          |
/// | cleaned text under 10 characters                  | 0.1           |
#[must_use]
pub fn bot_likelihood(raw: &RawPost, clean_text: &str, cashtag_count: usize) -> f64 {
    let mut score = 0.0;

    if cashtag_count >= 5 {
        score += 0.35;
    }

    let lowered = raw.text.to_lowercase();
    let promo_hits = PROMO_PHRASES.iter().filter(|p| lowered.contains(*p)).count();
    #[allow(clippy::cast_precision_loss)]
    let promo = (promo_hits as f64 * 0.25).min(0.5);
    score += promo;

    if URL_RE.find_iter(&raw.text).count() >= 2 {
        score += 0.15;
    }

    let letters = clean_text.chars().filter(|c| c.is_alphabetic()).count();
    let upper = clean_text.chars().filter(|c| c.is_uppercase()).count();
    #[allow(clippy::cast_precision_loss)]
    let shouting = letters >= 20 && upper as f64 / letters as f64 > 0.7;
    if shouting {
        score += 0.15;
    }

    let words: Vec<String> = clean_text
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    if words.len() >= 6 {
        let unique = words.iter().collect::<HashSet<_>>().len();
        #[allow(clippy::cast_precision_loss)]
        let ratio = unique as f64 / words.len() as f64;
        if ratio < 0.4 {
            score += 0.2;
        }
    }

    let counters: Vec<u64> = [raw.like_count, raw.reply_count, raw.repost_count]
        .into_iter()
        .flatten()
        .collect();
    if !counters.is_empty() && counters.iter().all(|&c| c == 0) {
        score += 0.1;
    }

    if raw.author_followers == Some(0) {
        score += 0.15;
    }

    if clean_text.chars().count() < 10 {
        score += 0.1;
    }

    f64::min(score, 1.0)
}

/// Keeps the first-seen post for each `(source, platform_id)`.
///
/// Returns the survivors in input order and the number of duplicates dropped.
#[must_use]
pub fn dedup_first_seen(posts: Vec<RawPost>) -> (Vec<RawPost>, usize) {
    let total = posts.len();
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(total);
    for post in posts {
        let (source, platform_id) = post.dedup_key();
        if seen.insert((source, platform_id.to_string())) {
            unique.push(post);
        }
    }
    let duplicates = total - unique.len();
    (unique, duplicates)
}

/// What happened to one post in [`PostCleaner::clean`].
#[derive(Debug, Clone, PartialEq)]
pub enum CleanOutcome {
    Kept(NormalizedPost),
    /// No reference to the target instrument.
    NoSymbols,
    ProbableBot { score: f64 },
}

/// Per-instrument cleaner with its matching regexes compiled once.
#[derive(Debug)]
pub struct PostCleaner {
    symbol: String,
    bare_symbol: Option<Regex>,
    names: Option<Regex>,
    bot_threshold: f64,
}

impl PostCleaner {
    #[must_use]
    pub fn new(instrument: &Instrument, bot_threshold: f64) -> Self {
        let symbol = instrument.symbol.to_uppercase();

        // Single letters are too ambiguous to match without a `$`.
        let bare_symbol = (symbol.chars().count() >= 2)
            .then(|| {
                Regex::new(&format!(
                    r"(?:^|[^A-Za-z0-9$]){}(?:$|[^A-Za-z0-9])",
                    regex::escape(&symbol)
                ))
                .ok()
            })
            .flatten();

        let mut variants: BTreeSet<String> = BTreeSet::new();
        for variant in instrument.name_variants() {
            let variant = variant.trim();
            if !variant.eq_ignore_ascii_case(&symbol) {
                variants.insert(variant.to_lowercase());
            }
            let normalized = normalize_company_name(variant);
            if normalized.chars().count() >= 3 && !normalized.eq_ignore_ascii_case(&symbol) {
                variants.insert(normalized);
            }
        }
        let names = (!variants.is_empty())
            .then(|| {
                let alternation = variants
                    .iter()
                    .map(|v| regex::escape(v))
                    .collect::<Vec<_>>()
                    .join("|");
                Regex::new(&format!(r"(?i)(?:^|\W)(?:{alternation})(?:$|\W)")).ok()
            })
            .flatten();

        Self {
            symbol,
            bare_symbol,
            names,
            bot_threshold,
        }
    }

    /// Symbols referenced by `clean_text`: every cashtag, plus the target
    /// symbol when the text names it bare or by company name.
    #[must_use]
    pub fn extract_symbols(&self, clean_text: &str) -> BTreeSet<String> {
        let mut symbols = extract_cashtags(clean_text);
        let named = self
            .bare_symbol
            .as_ref()
            .is_some_and(|re| re.is_match(clean_text))
            || self.names.as_ref().is_some_and(|re| re.is_match(clean_text));
        if named {
            symbols.insert(self.symbol.clone());
        }
        symbols
    }

    #[must_use]
    pub fn clean(&self, raw: RawPost) -> CleanOutcome {
        let clean_text = normalize_text(&raw.text);
        let symbols = self.extract_symbols(&clean_text);
        if !symbols.contains(&self.symbol) {
            return CleanOutcome::NoSymbols;
        }

        let cashtags = extract_cashtags(&clean_text).len();
        let bot_score = bot_likelihood(&raw, &clean_text, cashtags);
        if bot_score > self.bot_threshold {
            return CleanOutcome::ProbableBot { score: bot_score };
        }

        CleanOutcome::Kept(NormalizedPost {
            raw,
            clean_text,
            symbols,
            bot_score,
        })
    }

    /// Dedups and cleans the merged fan-out output.
    #[must_use]
    pub fn clean_all(&self, posts: Vec<RawPost>) -> (Vec<NormalizedPost>, FilterStats) {
        let mut stats = FilterStats {
            total_input: posts.len(),
            ..FilterStats::default()
        };
        let (unique, duplicates) = dedup_first_seen(posts);
        stats.duplicates = duplicates;

        let mut kept = Vec::with_capacity(unique.len());
        for raw in unique {
            match self.clean(raw) {
                CleanOutcome::Kept(post) => kept.push(post),
                CleanOutcome::NoSymbols => stats.no_symbols += 1,
                CleanOutcome::ProbableBot { score } => {
                    tracing::debug!(score, "dropping probable bot post");
                    stats.probable_bots += 1;
                }
            }
        }
        stats.processed = kept.len();

        tracing::info!(
            symbol = %self.symbol,
            total = stats.total_input,
            duplicates = stats.duplicates,
            no_symbols = stats.no_symbols,
            bots = stats.probable_bots,
            processed = stats.processed,
            "filter stats"
        );
        (kept, stats)
    }
}
