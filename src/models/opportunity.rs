use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::quote::OddsFormat;
use crate::matching::IndexedQuote;

/// Probability view of one quote for the current run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanonicalProbability {
    /// Raw conversion of the quoted price, margin included
    pub implied: f64,

    /// Probability after margin removal
    pub fair: f64,

    /// Staleness x liquidity weight in [0, 1]
    pub confidence_weight: f64,
}

/// How a pair was produced by the matcher
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Market keys agreed exactly
    Exact,
    /// Paired by the fuzzy fallback
    Fuzzy,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Fuzzy => "fuzzy",
        }
    }
}

/// A sportsbook quote and an exchange quote for the same outcome
#[derive(Debug, Clone)]
pub struct MatchedPair {
    pub sportsbook: IndexedQuote,
    pub exchange: IndexedQuote,
    /// 1.0 for exact matches, the similarity score for fuzzy ones
    pub match_confidence: f64,
    pub kind: MatchKind,
}

/// Which venue offers the better side of the discrepancy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FavoredSide {
    /// Exchange rates the outcome likelier than the book: back it at the book
    Sportsbook,
    /// Exchange rates the outcome less likely than the book: buy it on the exchange
    Exchange,
}

impl FavoredSide {
    pub fn from_delta(delta: f64) -> Self {
        if delta > 0.0 {
            FavoredSide::Sportsbook
        } else {
            FavoredSide::Exchange
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FavoredSide::Sportsbook => "sportsbook",
            FavoredSide::Exchange => "exchange",
        }
    }
}

/// Strength classification of a probability delta
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    /// Delta < 3%
    Weak,
    /// Delta 3-7%
    Moderate,
    /// Delta 7-12%
    Strong,
    /// Delta > 12%
    VeryStrong,
}

impl Strength {
    pub fn from_delta(delta: f64) -> Self {
        let abs_delta = delta.abs();
        if abs_delta < 0.03 {
            Strength::Weak
        } else if abs_delta < 0.07 {
            Strength::Moderate
        } else if abs_delta < 0.12 {
            Strength::Strong
        } else {
            Strength::VeryStrong
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strength::Weak => "weak",
            Strength::Moderate => "moderate",
            Strength::Strong => "strong",
            Strength::VeryStrong => "very_strong",
        }
    }
}

/// A material discrepancy between the two sources
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub matched_pair: MatchedPair,

    pub sportsbook_probability: CanonicalProbability,

    pub exchange_probability: CanonicalProbability,

    /// exchange fair - sportsbook fair
    pub probability_delta: f64,

    /// Sum of the sportsbook side-set's implied probabilities minus one
    pub sportsbook_overround: f64,

    pub favored_side: FavoredSide,

    /// |delta| x match confidence, the ranking key
    pub materiality_score: f64,

    pub strength: Strength,
}

/// Flat view of an opportunity for rendering and storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityRecord {
    /// Sportsbook matchup label, e.g. "Chelsea vs Arsenal"
    pub matchup: String,

    /// Normalized market label, e.g. "spread chelsea -1.5"
    pub market: String,

    pub start_time: DateTime<Utc>,

    /// Bookmaker that posted the sportsbook price, when the feed names one
    #[serde(default)]
    pub bookmaker: Option<String>,

    pub sportsbook_market_id: String,
    pub sportsbook_odds: f64,
    pub sportsbook_format: OddsFormat,
    pub sportsbook_implied: f64,
    pub sportsbook_fair: f64,
    pub sportsbook_overround: f64,

    pub exchange_ticker: String,
    pub exchange_price: f64,
    pub exchange_fair: f64,

    pub probability_delta: f64,
    pub materiality_score: f64,
    pub match_confidence: f64,
    pub match_kind: MatchKind,
    pub favored_side: FavoredSide,
    pub strength: Strength,
}

impl From<&Opportunity> for OpportunityRecord {
    fn from(opportunity: &Opportunity) -> Self {
        let pair = &opportunity.matched_pair;
        let book = &pair.sportsbook.quote;
        let exchange = &pair.exchange.quote;

        Self {
            matchup: book.matchup(),
            market: pair.sportsbook.key.label(),
            start_time: book.start_time,
            bookmaker: book.bookmaker.clone(),
            sportsbook_market_id: book.market_id.clone(),
            sportsbook_odds: book.raw_value,
            sportsbook_format: book.format,
            sportsbook_implied: opportunity.sportsbook_probability.implied,
            sportsbook_fair: opportunity.sportsbook_probability.fair,
            sportsbook_overround: opportunity.sportsbook_overround,
            exchange_ticker: exchange.market_id.clone(),
            exchange_price: exchange.raw_value,
            exchange_fair: opportunity.exchange_probability.fair,
            probability_delta: opportunity.probability_delta,
            materiality_score: opportunity.materiality_score,
            match_confidence: pair.match_confidence,
            match_kind: pair.kind,
            favored_side: opportunity.favored_side,
            strength: opportunity.strength,
        }
    }
}

/// Per-run audit counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_sportsbook_quotes: usize,
    pub total_exchange_quotes: usize,
    /// Quotes whose raw value failed validation, both sources
    pub rejected_invalid: usize,
    /// Quotes dropped because their market type or side is not in the mapping table
    pub unmapped_vocabulary: usize,
    /// Quotes superseded by a newer quote for the same key
    pub duplicate_keys: usize,
    pub unmatched_sportsbook: usize,
    pub unmatched_exchange: usize,
    pub matched_exact: usize,
    pub matched_fuzzy: usize,
    /// Pairs skipped because a side-set was too small to de-vig
    pub incomplete_markets: usize,
    /// Pairs that failed the materiality or confidence filter
    pub filtered_pairs: usize,
    pub opportunities_emitted: usize,
}

/// Output of one comparison run
#[derive(Debug, Clone, Default)]
pub struct ComparisonReport {
    /// Sorted by materiality score, descending
    pub opportunities: Vec<Opportunity>,
    pub stats: RunStats,
}
