use chrono::{DateTime, Utc};
use tracing::info;

use super::comparator::Comparator;
use crate::config::ComparisonConfig;
use crate::error::OddsResult;
use crate::matching::{MarketIndex, MarketMatcher, TeamResolver};
use crate::models::{ComparisonReport, OddsQuote, RunStats, Source};

/// One comparison run: index both catalogs, match, compare, count.
///
/// Holds only immutable settings, so a single engine can serve several
/// leagues from different threads.
#[derive(Debug, Clone)]
pub struct ComparisonEngine {
    config: ComparisonConfig,
    resolver: TeamResolver,
}

impl ComparisonEngine {
    /// Validate the configuration up front; a bad config fails here, before
    /// any quote is looked at.
    pub fn new(config: ComparisonConfig, resolver: TeamResolver) -> OddsResult<Self> {
        config.validate()?;
        Ok(Self { config, resolver })
    }

    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    /// Run a comparison over two snapshots. `as_of` is the reference time for
    /// quote staleness.
    pub fn run(
        &self,
        sportsbook_quotes: &[OddsQuote],
        exchange_quotes: &[OddsQuote],
        as_of: DateTime<Utc>,
    ) -> ComparisonReport {
        let sportsbook = MarketIndex::build(Source::Sportsbook, sportsbook_quotes, &self.resolver);
        let exchange = MarketIndex::build(Source::Exchange, exchange_quotes, &self.resolver);

        let matched = MarketMatcher::new(self.config.min_match_confidence)
            .match_indexes(&sportsbook, &exchange);

        let mut stats = RunStats {
            total_sportsbook_quotes: sportsbook_quotes.len(),
            total_exchange_quotes: exchange_quotes.len(),
            rejected_invalid: sportsbook.stats().rejected_invalid
                + exchange.stats().rejected_invalid,
            unmapped_vocabulary: sportsbook.stats().unmapped_vocabulary
                + exchange.stats().unmapped_vocabulary,
            duplicate_keys: sportsbook.stats().duplicate_keys + exchange.stats().duplicate_keys,
            unmatched_sportsbook: matched.unmatched_sportsbook,
            unmatched_exchange: matched.unmatched_exchange,
            matched_exact: matched.matched_exact,
            matched_fuzzy: matched.matched_fuzzy,
            ..Default::default()
        };

        let compared = Comparator::new(self.config.clone()).compare(
            matched.pairs,
            &sportsbook,
            &exchange,
            as_of,
        );

        stats.incomplete_markets = compared.incomplete_markets;
        stats.filtered_pairs = compared.filtered_pairs;
        stats.opportunities_emitted = compared.opportunities.len();

        info!(
            "Comparison complete: {} opportunities from {} pairs ({} filtered, {} incomplete)",
            stats.opportunities_emitted,
            stats.matched_exact + stats.matched_fuzzy,
            stats.filtered_pairs,
            stats.incomplete_markets
        );

        ComparisonReport {
            opportunities: compared.opportunities,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::error::OddsError;
    use crate::models::OddsFormat;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 0, 0).unwrap()
    }

    fn quote(source: Source, side: &str, raw_value: f64) -> OddsQuote {
        let format = match source {
            Source::Sportsbook => OddsFormat::American,
            Source::Exchange => OddsFormat::ExchangePrice,
        };

        OddsQuote {
            source,
            event_id: "evt".to_string(),
            market_id: format!("{}-{}", source, side),
            home_team: "Liverpool".to_string(),
            away_team: "Everton".to_string(),
            start_time: Utc.with_ymd_and_hms(2024, 3, 9, 15, 0, 0).unwrap(),
            market_type: "ml".to_string(),
            side: side.to_string(),
            line_value: None,
            raw_value,
            format,
            timestamp: now(),
            liquidity: None,
            bookmaker: None,
        }
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let result = ComparisonEngine::new(
            ComparisonConfig::default().with_materiality_threshold(2.0),
            TeamResolver::new(),
        );
        assert!(matches!(result, Err(OddsError::Configuration(_))));
    }

    #[test]
    fn test_run_stats() {
        let engine =
            ComparisonEngine::new(ComparisonConfig::default(), TeamResolver::new()).unwrap();

        let sportsbook = vec![
            quote(Source::Sportsbook, "home", -150.0),
            quote(Source::Sportsbook, "away", 130.0),
            quote(Source::Sportsbook, "draw", 0.0),
        ];
        let exchange = vec![
            quote(Source::Exchange, "home", 0.50),
            quote(Source::Exchange, "away", 0.43),
            quote(Source::Exchange, "draw", 1.0),
        ];

        let report = engine.run(&sportsbook, &exchange, now());

        assert_eq!(
            report.stats,
            RunStats {
                total_sportsbook_quotes: 3,
                total_exchange_quotes: 3,
                rejected_invalid: 2,
                unmapped_vocabulary: 0,
                duplicate_keys: 0,
                unmatched_sportsbook: 0,
                unmatched_exchange: 0,
                matched_exact: 2,
                matched_fuzzy: 0,
                incomplete_markets: 0,
                filtered_pairs: 1,
                opportunities_emitted: 1,
            }
        );
        assert_eq!(report.opportunities[0].matched_pair.exchange.quote.side, "home");
    }

    #[test]
    fn test_no_matches_is_not_an_error() {
        let engine =
            ComparisonEngine::new(ComparisonConfig::default(), TeamResolver::new()).unwrap();
        let report = engine.run(&[quote(Source::Sportsbook, "home", -150.0)], &[], now());

        assert!(report.opportunities.is_empty());
        assert_eq!(report.stats.unmatched_sportsbook, 1);
        assert_eq!(report.stats.opportunities_emitted, 0);
    }

    #[test]
    fn test_engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ComparisonEngine>();
    }
}
