use std::collections::HashMap;

use tracing::{debug, info};

use super::market_key::{MarketKey, Side};
use super::team_resolver::TeamResolver;
use crate::models::{OddsQuote, Source};
use crate::odds::to_implied;

/// A validated quote together with its normalized key
#[derive(Debug, Clone)]
pub struct IndexedQuote {
    pub quote: OddsQuote,
    pub key: MarketKey,
    /// Mapped side from the internal vocabulary
    pub side: Side,
    /// Implied probability of the raw value, margin included
    pub implied: f64,
}

/// Counters collected while building an index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub total: usize,
    pub rejected_invalid: usize,
    pub unmapped_vocabulary: usize,
    pub duplicate_keys: usize,
}

/// Normalized catalog of one source, one quote per market key
#[derive(Debug, Clone)]
pub struct MarketIndex {
    source: Source,
    /// Entries in first-seen order
    entries: Vec<IndexedQuote>,
    by_key: HashMap<MarketKey, usize>,
    stats: IndexStats,
}

impl MarketIndex {
    /// Build an index from a source's raw quotes.
    ///
    /// Quotes with unmapped vocabulary or invalid prices are dropped and
    /// counted. When two quotes share a key the newer one wins and keeps the
    /// position of the first.
    pub fn build(source: Source, quotes: &[OddsQuote], resolver: &TeamResolver) -> Self {
        let mut index = Self {
            source,
            entries: Vec::with_capacity(quotes.len()),
            by_key: HashMap::with_capacity(quotes.len()),
            stats: IndexStats {
                total: quotes.len(),
                ..Default::default()
            },
        };

        for quote in quotes {
            let (key, side) = match MarketKey::from_quote(quote, resolver) {
                Ok(keyed) => keyed,
                Err(reason) => {
                    debug!(
                        "Dropping {} quote {} ({} / {}): {}",
                        source,
                        quote.market_id,
                        quote.market_type,
                        quote.side,
                        reason.as_str()
                    );
                    index.stats.unmapped_vocabulary += 1;
                    continue;
                }
            };

            let implied = match to_implied(quote.format, quote.raw_value) {
                Ok(p) => p,
                Err(e) => {
                    debug!("Rejecting {} quote {}: {}", source, quote.market_id, e);
                    index.stats.rejected_invalid += 1;
                    continue;
                }
            };

            index.insert(IndexedQuote {
                quote: quote.clone(),
                key,
                side,
                implied,
            });
        }

        info!(
            "Indexed {} {} quotes ({} invalid, {} unmapped, {} duplicate)",
            index.entries.len(),
            source,
            index.stats.rejected_invalid,
            index.stats.unmapped_vocabulary,
            index.stats.duplicate_keys
        );

        index
    }

    fn insert(&mut self, entry: IndexedQuote) {
        if let Some(&position) = self.by_key.get(&entry.key) {
            self.stats.duplicate_keys += 1;
            let existing = &mut self.entries[position];
            if entry.quote.timestamp > existing.quote.timestamp {
                *existing = entry;
            }
            return;
        }

        self.by_key.insert(entry.key.clone(), self.entries.len());
        self.entries.push(entry);
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn get(&self, key: &MarketKey) -> Option<&IndexedQuote> {
        self.by_key.get(key).map(|&position| &self.entries[position])
    }

    pub fn contains(&self, key: &MarketKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// Entries in first-seen order
    pub fn entries(&self) -> &[IndexedQuote] {
        &self.entries
    }

    pub fn position(&self, key: &MarketKey) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    /// Indexed quotes of every side of `key`'s market, in canonical order.
    /// Sides missing from the catalog are absent from the result.
    pub fn side_set(&self, key: &MarketKey) -> Vec<&IndexedQuote> {
        key.side_set_keys()
            .iter()
            .filter_map(|sibling| self.get(sibling))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::matching::market_key::Selection;
    use crate::models::OddsFormat;

    fn kickoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 15, 0, 0).unwrap()
    }

    fn american(side: &str, value: f64) -> OddsQuote {
        OddsQuote {
            source: Source::Sportsbook,
            event_id: "evt-1".to_string(),
            market_id: format!("ml-{}", side),
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            start_time: kickoff(),
            market_type: "moneyline".to_string(),
            side: side.to_string(),
            line_value: None,
            raw_value: value,
            format: OddsFormat::American,
            timestamp: kickoff() - Duration::minutes(5),
            liquidity: None,
            bookmaker: None,
        }
    }

    #[test]
    fn test_build_index() {
        let quotes = vec![american("home", -150.0), american("away", 130.0)];
        let index = MarketIndex::build(Source::Sportsbook, &quotes, &TeamResolver::new());

        assert_eq!(index.len(), 2);
        assert_eq!(index.source(), Source::Sportsbook);
        assert_eq!(
            index.stats(),
            IndexStats {
                total: 2,
                ..Default::default()
            }
        );

        let home = &index.entries()[0];
        assert_eq!(home.side, Side::Home);
        assert_eq!(home.key.selection, Selection::Team("arsenal".to_string()));
        assert!((home.implied - 0.6).abs() < 1e-12);
        assert!(index.contains(&home.key));
        assert_eq!(index.position(&home.key), Some(0));
    }

    #[test]
    fn test_zero_american_rejected_and_counted() {
        let quotes = vec![american("home", 0.0), american("away", 130.0)];
        let index = MarketIndex::build(Source::Sportsbook, &quotes, &TeamResolver::new());

        assert_eq!(index.len(), 1);
        assert_eq!(index.stats().rejected_invalid, 1);
        assert!(index
            .entries()
            .iter()
            .all(|e| e.quote.raw_value != 0.0));
    }

    #[test]
    fn test_unmapped_vocabulary_counted() {
        let mut prop = american("home", -110.0);
        prop.market_type = "first_goalscorer".to_string();
        let mut weird_side = american("home", -110.0);
        weird_side.side = "favourite".to_string();

        let quotes = vec![prop, weird_side, american("away", 130.0)];
        let index = MarketIndex::build(Source::Sportsbook, &quotes, &TeamResolver::new());

        assert_eq!(index.len(), 1);
        assert_eq!(index.stats().unmapped_vocabulary, 2);
        assert_eq!(index.stats().rejected_invalid, 0);
    }

    #[test]
    fn test_duplicate_key_keeps_newest() {
        let stale = american("home", -150.0);
        let mut fresh = american("home", -140.0);
        fresh.timestamp = kickoff();
        // Same market listed with the teams swapped
        let mut older = american("away", -160.0);
        older.home_team = "Chelsea".to_string();
        older.away_team = "Arsenal".to_string();
        older.timestamp = kickoff() - Duration::hours(1);

        let quotes = vec![stale, fresh, older];
        let index = MarketIndex::build(Source::Sportsbook, &quotes, &TeamResolver::new());

        assert_eq!(index.len(), 1);
        assert_eq!(index.stats().duplicate_keys, 2);
        assert_eq!(index.entries()[0].quote.raw_value, -140.0);
    }

    #[test]
    fn test_side_set() {
        let mut draw = american("draw", 240.0);
        draw.market_id = "ml-draw".to_string();
        let quotes = vec![american("away", 130.0), draw, american("home", -150.0)];
        let index = MarketIndex::build(Source::Sportsbook, &quotes, &TeamResolver::new());

        let key = index.entries()[0].key.clone();
        let set = index.side_set(&key);
        let sides: Vec<Side> = set.iter().map(|e| e.side).collect();
        assert_eq!(sides, vec![Side::Home, Side::Away, Side::Draw]);
    }

    #[test]
    fn test_side_set_missing_sides() {
        let quotes = vec![american("home", -150.0)];
        let index = MarketIndex::build(Source::Sportsbook, &quotes, &TeamResolver::new());

        let key = index.entries()[0].key.clone();
        assert_eq!(index.side_set(&key).len(), 1);
    }
}
