use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::ComparisonConfig;
use crate::error::{OddsError, OddsResult};
use crate::matching::{IndexedQuote, MarketIndex};
use crate::models::{CanonicalProbability, FavoredSide, MatchedPair, Opportunity, Strength};
use crate::odds::{overround, remove_margin};

/// Opportunities and counters from comparing a batch of pairs
#[derive(Debug, Clone, Default)]
pub struct ComparisonOutcome {
    /// Sorted by materiality score, descending
    pub opportunities: Vec<Opportunity>,
    pub incomplete_markets: usize,
    pub filtered_pairs: usize,
}

/// Turns matched pairs into ranked opportunities
#[derive(Debug, Clone)]
pub struct Comparator {
    config: ComparisonConfig,
}

impl Comparator {
    pub fn new(config: ComparisonConfig) -> Self {
        Self { config }
    }

    /// Compare every pair once. Pairs whose side-set cannot be de-vigged are
    /// skipped and counted; pairs under either filter are counted.
    pub fn compare(
        &self,
        pairs: Vec<MatchedPair>,
        sportsbook: &MarketIndex,
        exchange: &MarketIndex,
        as_of: DateTime<Utc>,
    ) -> ComparisonOutcome {
        let mut outcome = ComparisonOutcome::default();

        for pair in pairs {
            match self.evaluate(pair, sportsbook, exchange, as_of) {
                Ok(Some(opportunity)) => outcome.opportunities.push(opportunity),
                Ok(None) => outcome.filtered_pairs += 1,
                Err(e) => {
                    debug!("Skipping pair: {}", e);
                    outcome.incomplete_markets += 1;
                }
            }
        }

        // Vec::sort_by is stable: equal scores keep matcher order
        outcome
            .opportunities
            .sort_by(|a, b| b.materiality_score.total_cmp(&a.materiality_score));

        outcome
    }

    fn evaluate(
        &self,
        pair: MatchedPair,
        sportsbook: &MarketIndex,
        exchange: &MarketIndex,
        as_of: DateTime<Utc>,
    ) -> OddsResult<Option<Opportunity>> {
        let sportsbook_fair = fair_probability(sportsbook, &pair.sportsbook)?;
        let sportsbook_overround = side_set_overround(sportsbook, &pair.sportsbook);
        let exchange_fair = if self.config.devig_exchange {
            fair_probability(exchange, &pair.exchange)?
        } else {
            pair.exchange.implied
        };

        let probability_delta = exchange_fair - sportsbook_fair;

        if probability_delta.abs() < self.config.materiality_threshold
            || pair.match_confidence < self.config.min_match_confidence
        {
            debug!(
                "Filtered {} (delta {:+.4}, confidence {:.3})",
                pair.exchange.key.label(),
                probability_delta,
                pair.match_confidence
            );
            return Ok(None);
        }

        let sportsbook_probability = CanonicalProbability {
            implied: pair.sportsbook.implied,
            fair: sportsbook_fair,
            confidence_weight: self.confidence_weight(&pair.sportsbook, as_of),
        };
        let exchange_probability = CanonicalProbability {
            implied: pair.exchange.implied,
            fair: exchange_fair,
            confidence_weight: self.confidence_weight(&pair.exchange, as_of),
        };

        Ok(Some(Opportunity {
            materiality_score: probability_delta.abs() * pair.match_confidence,
            favored_side: FavoredSide::from_delta(probability_delta),
            strength: Strength::from_delta(probability_delta),
            probability_delta,
            sportsbook_overround,
            sportsbook_probability,
            exchange_probability,
            matched_pair: pair,
        }))
    }

    /// Staleness x liquidity weight in [0, 1]
    pub fn confidence_weight(&self, entry: &IndexedQuote, as_of: DateTime<Utc>) -> f64 {
        let age_secs = (as_of - entry.quote.timestamp).num_seconds().max(0) as f64;
        let staleness = (1.0 - age_secs / self.config.max_quote_age_secs as f64).clamp(0.0, 1.0);

        let liquidity = entry
            .quote
            .liquidity
            .map(|l| (l / self.config.liquidity_reference).clamp(0.0, 1.0))
            .unwrap_or(1.0);

        staleness * liquidity
    }
}

/// Margin of the side-set an entry belongs to
pub fn side_set_overround(index: &MarketIndex, entry: &IndexedQuote) -> f64 {
    let implied: Vec<f64> = index.side_set(&entry.key).iter().map(|e| e.implied).collect();
    overround(&implied)
}

/// Fair probability of an entry, de-vigged over its side-set in `index`
pub fn fair_probability(index: &MarketIndex, entry: &IndexedQuote) -> OddsResult<f64> {
    let side_set = index.side_set(&entry.key);
    if side_set.len() < 2 {
        return Err(OddsError::IncompleteMarket(format!(
            "{} {} has {} side(s) in the {} catalog",
            entry.quote.matchup(),
            entry.key.label(),
            side_set.len(),
            index.source()
        )));
    }

    let implied: Vec<f64> = side_set.iter().map(|e| e.implied).collect();
    let fair = remove_margin(&implied)?;

    side_set
        .iter()
        .position(|e| e.key == entry.key)
        .map(|position| fair[position])
        .ok_or_else(|| {
            OddsError::IncompleteMarket(format!(
                "{} missing from its own side-set",
                entry.key.label()
            ))
        })
}
