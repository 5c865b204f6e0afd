//! Pairs sportsbook and exchange quotes that price the same outcome.
//!
//! Exact key agreement first; exchange entries left over get a fuzzy pass on
//! team names. Start minute and line value are never fuzzy: a half-point
//! difference is a different market.

use tracing::{debug, info};

use super::index::{IndexedQuote, MarketIndex};
use super::market_key::Selection;
use super::similarity::team_pair_similarity;
use crate::models::{MatchKind, MatchedPair};

/// Default similarity a fuzzy candidate must reach
pub const DEFAULT_MIN_MATCH_CONFIDENCE: f64 = 0.85;

/// Pairs and counters from one matching pass
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Exact pairs in exchange order, then fuzzy pairs in exchange order
    pub pairs: Vec<MatchedPair>,
    pub matched_exact: usize,
    pub matched_fuzzy: usize,
    pub unmatched_sportsbook: usize,
    pub unmatched_exchange: usize,
}

/// Matches entries of a sportsbook index against an exchange index
#[derive(Debug, Clone)]
pub struct MarketMatcher {
    min_confidence: f64,
}

impl MarketMatcher {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Match the two catalogs. Each entry is used in at most one pair.
    pub fn match_indexes(&self, sportsbook: &MarketIndex, exchange: &MarketIndex) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();
        let mut sportsbook_used = vec![false; sportsbook.len()];
        let mut exchange_unmatched = Vec::new();

        // Exact pass
        for (ex_pos, ex_entry) in exchange.entries().iter().enumerate() {
            match sportsbook.position(&ex_entry.key) {
                Some(sb_pos) => {
                    sportsbook_used[sb_pos] = true;
                    outcome.pairs.push(MatchedPair {
                        sportsbook: sportsbook.entries()[sb_pos].clone(),
                        exchange: ex_entry.clone(),
                        match_confidence: 1.0,
                        kind: MatchKind::Exact,
                    });
                    outcome.matched_exact += 1;
                }
                None => exchange_unmatched.push(ex_pos),
            }
        }

        // Fuzzy pass
        for ex_pos in exchange_unmatched {
            let ex_entry = &exchange.entries()[ex_pos];

            match self.best_candidate(ex_entry, sportsbook, &sportsbook_used) {
                Some((sb_pos, similarity)) => {
                    sportsbook_used[sb_pos] = true;
                    let sb_entry = &sportsbook.entries()[sb_pos];
                    debug!(
                        "Fuzzy match {:.3}: {} ~ {}",
                        similarity,
                        ex_entry.quote.matchup(),
                        sb_entry.quote.matchup()
                    );
                    outcome.pairs.push(MatchedPair {
                        sportsbook: sb_entry.clone(),
                        exchange: ex_entry.clone(),
                        match_confidence: similarity,
                        kind: MatchKind::Fuzzy,
                    });
                    outcome.matched_fuzzy += 1;
                }
                None => {
                    debug!(
                        "No match for exchange {} ({})",
                        ex_entry.quote.market_id,
                        ex_entry.key.label()
                    );
                    outcome.unmatched_exchange += 1;
                }
            }
        }

        outcome.unmatched_sportsbook = sportsbook_used.iter().filter(|used| !**used).count();

        info!(
            "Matched {} exact + {} fuzzy ({} sportsbook / {} exchange unmatched)",
            outcome.matched_exact,
            outcome.matched_fuzzy,
            outcome.unmatched_sportsbook,
            outcome.unmatched_exchange
        );

        outcome
    }

    /// Highest-similarity unused sportsbook entry at or above the threshold.
    /// Ties go to the newest sportsbook quote, then to index order.
    fn best_candidate(
        &self,
        ex_entry: &IndexedQuote,
        sportsbook: &MarketIndex,
        used: &[bool],
    ) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;

        for (sb_pos, sb_entry) in sportsbook.entries().iter().enumerate() {
            if used[sb_pos] {
                continue;
            }

            let Some(similarity) = fuzzy_similarity(ex_entry, sb_entry) else {
                continue;
            };
            if similarity < self.min_confidence {
                continue;
            }

            let better = match best {
                None => true,
                Some((best_pos, best_similarity)) => {
                    similarity > best_similarity
                        || (similarity == best_similarity
                            && sb_entry.quote.timestamp
                                > sportsbook.entries()[best_pos].quote.timestamp)
                }
            };

            if better {
                best = Some((sb_pos, similarity));
            }
        }

        best
    }
}

impl Default for MarketMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_MATCH_CONFIDENCE)
    }
}

/// Similarity of two entries, or None when they cannot be the same market.
///
/// Market type, selection kind, start minute and line must agree exactly,
/// and each team must share at least one token with its counterpart.
/// For team selections the backed teams must line up under the best team
/// alignment.
pub fn fuzzy_similarity(exchange: &IndexedQuote, sportsbook: &IndexedQuote) -> Option<f64> {
    let (ex_key, sb_key) = (&exchange.key, &sportsbook.key);

    if ex_key.market_type != sb_key.market_type
        || !ex_key.selection.same_kind(&sb_key.selection)
        || ex_key.event.start != sb_key.event.start
        || ex_key.line != sb_key.line
    {
        return None;
    }

    let alignment = team_pair_similarity(
        (&ex_key.event.teams.0, &ex_key.event.teams.1),
        (&sb_key.event.teams.0, &sb_key.event.teams.1),
    );

    // A team with no shared token is a different event at any threshold
    if !alignment.all_teams_overlap() {
        return None;
    }

    if let (Selection::Team(ex_team), Selection::Team(sb_team)) =
        (&ex_key.selection, &sb_key.selection)
    {
        let ex_slot = ex_key.event.slot_of(ex_team)?;
        let sb_slot = sb_key.event.slot_of(sb_team)?;
        if alignment.counterpart(ex_slot) != sb_slot {
            return None;
        }
    }

    Some(alignment.score)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::matching::TeamResolver;
    use crate::models::{OddsFormat, OddsQuote, Source};

    fn kickoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 14, 18, 0, 0).unwrap()
    }

    fn quote(
        source: Source,
        home: &str,
        away: &str,
        market_type: &str,
        side: &str,
        line: Option<f64>,
    ) -> OddsQuote {
        let (raw_value, format) = match source {
            Source::Sportsbook => (-110.0, OddsFormat::American),
            Source::Exchange => (0.5, OddsFormat::ExchangePrice),
        };

        OddsQuote {
            source,
            event_id: format!("{}-evt", source),
            market_id: format!("{}-{}-{}", source, market_type, side),
            home_team: home.to_string(),
            away_team: away.to_string(),
            start_time: kickoff(),
            market_type: market_type.to_string(),
            side: side.to_string(),
            line_value: line,
            raw_value,
            format,
            timestamp: kickoff() - Duration::minutes(10),
            liquidity: None,
            bookmaker: None,
        }
    }

    fn run(sb: Vec<OddsQuote>, ex: Vec<OddsQuote>) -> MatchOutcome {
        let resolver = TeamResolver::new();
        let sportsbook = MarketIndex::build(Source::Sportsbook, &sb, &resolver);
        let exchange = MarketIndex::build(Source::Exchange, &ex, &resolver);
        MarketMatcher::default().match_indexes(&sportsbook, &exchange)
    }

    #[test]
    fn test_exact_match() {
        let outcome = run(
            vec![
                quote(Source::Sportsbook, "Buffalo Bills", "Kansas City Chiefs", "ml", "home", None),
                quote(Source::Sportsbook, "Buffalo Bills", "Kansas City Chiefs", "ml", "away", None),
            ],
            vec![quote(
                Source::Exchange,
                "Kansas City Chiefs",
                "Buffalo Bills",
                "moneyline",
                "away",
                None,
            )],
        );

        assert_eq!(outcome.matched_exact, 1);
        assert_eq!(outcome.matched_fuzzy, 0);
        assert_eq!(outcome.unmatched_sportsbook, 1);
        assert_eq!(outcome.unmatched_exchange, 0);

        let pair = &outcome.pairs[0];
        assert_eq!(pair.kind, MatchKind::Exact);
        assert_eq!(pair.match_confidence, 1.0);
        assert_eq!(pair.sportsbook.quote.side, "home");
    }

    #[test]
    fn test_fuzzy_match_on_team_names() {
        let outcome = run(
            vec![
                quote(Source::Sportsbook, "Buffalo Bills", "Kansas City Chiefs", "spread", "home", Some(-2.5)),
                quote(Source::Sportsbook, "Buffalo Bills", "Kansas City Chiefs", "spread", "away", Some(2.5)),
            ],
            vec![quote(Source::Exchange, "Buffalo", "Kansas City", "spread", "home", Some(-2.5))],
        );

        assert_eq!(outcome.matched_fuzzy, 1);
        let pair = &outcome.pairs[0];
        assert_eq!(pair.kind, MatchKind::Fuzzy);
        assert_eq!(pair.match_confidence, 1.0);
        assert_eq!(pair.sportsbook.quote.side, "home");
        assert_eq!(outcome.unmatched_sportsbook, 1);
    }

    #[test]
    fn test_fuzzy_match_respects_backed_team() {
        // Exchange lists the teams the other way round and backs Kansas City
        let outcome = run(
            vec![
                quote(Source::Sportsbook, "Buffalo Bills", "Kansas City Chiefs", "ml", "home", None),
                quote(Source::Sportsbook, "Buffalo Bills", "Kansas City Chiefs", "ml", "away", None),
            ],
            vec![quote(Source::Exchange, "Kansas City", "Buffalo", "ml", "home", None)],
        );

        assert_eq!(outcome.matched_fuzzy, 1);
        assert_eq!(outcome.pairs[0].sportsbook.quote.side, "away");
    }

    #[test]
    fn test_half_point_line_never_matches() {
        for (sb_line, ex_line) in [(-2.5, -3.0), (-2.5, -2.0), (44.5, 45.0), (44.5, 45.5)] {
            let market = if sb_line > 10.0 { "total" } else { "spread" };
            let side = if market == "total" { "over" } else { "home" };
            let outcome = run(
                vec![quote(Source::Sportsbook, "Buffalo Bills", "Kansas City Chiefs", market, side, Some(sb_line))],
                vec![
                    quote(Source::Exchange, "Buffalo Bills", "Kansas City Chiefs", market, side, Some(ex_line)),
                    quote(Source::Exchange, "Buffalo", "Kansas City", market, side, Some(ex_line)),
                ],
            );

            assert!(outcome.pairs.is_empty(), "{} vs {} matched", sb_line, ex_line);
            assert_eq!(outcome.unmatched_sportsbook, 1);
            assert_eq!(outcome.unmatched_exchange, 2);
        }
    }

    #[test]
    fn test_start_minute_must_agree() {
        let mut ex = quote(Source::Exchange, "Buffalo", "Kansas City", "ml", "home", None);
        ex.start_time = kickoff() + Duration::minutes(1);

        let outcome = run(
            vec![quote(Source::Sportsbook, "Buffalo Bills", "Kansas City Chiefs", "ml", "home", None)],
            vec![ex],
        );

        assert!(outcome.pairs.is_empty());
        assert_eq!(outcome.unmatched_exchange, 1);
    }

    #[test]
    fn test_fuzzy_below_threshold_rejected() {
        let outcome = run(
            vec![quote(Source::Sportsbook, "Dallas Cowboys", "New York Jets", "ml", "home", None)],
            vec![quote(Source::Exchange, "Dallas Cowboys", "New York Giants", "ml", "home", None)],
        );

        assert!(outcome.pairs.is_empty());
        assert_eq!(outcome.unmatched_sportsbook, 1);
        assert_eq!(outcome.unmatched_exchange, 1);
    }

    #[test]
    fn test_unrelated_events_never_pair_at_zero_threshold() {
        let resolver = TeamResolver::new();
        let sportsbook = MarketIndex::build(
            Source::Sportsbook,
            &[quote(Source::Sportsbook, "Arsenal", "Chelsea", "total", "over", Some(2.5))],
            &resolver,
        );
        let exchange = MarketIndex::build(
            Source::Exchange,
            &[
                quote(Source::Exchange, "Burnley", "Fulham", "total", "over", Some(2.5)),
                quote(Source::Exchange, "Arsenal", "Fulham", "total", "over", Some(2.5)),
            ],
            &resolver,
        );

        let outcome = MarketMatcher::new(0.0).match_indexes(&sportsbook, &exchange);

        assert!(outcome.pairs.is_empty());
        assert_eq!(outcome.unmatched_exchange, 2);
        assert_eq!(outcome.unmatched_sportsbook, 1);
    }

    #[test]
    fn test_fuzzy_tie_prefers_newest_sportsbook_quote() {
        let older = quote(Source::Sportsbook, "Buffalo Bills", "Kansas City Chiefs", "total", "over", Some(47.5));
        let mut newer = quote(Source::Sportsbook, "Buffalo Bills NFL", "Kansas City Chiefs", "total", "over", Some(47.5));
        newer.timestamp = kickoff() - Duration::minutes(1);

        let outcome = run(
            vec![older, newer],
            vec![quote(Source::Exchange, "Buffalo", "Kansas City", "total", "over", Some(47.5))],
        );

        assert_eq!(outcome.matched_fuzzy, 1);
        assert_eq!(outcome.pairs[0].sportsbook.quote.home_team, "Buffalo Bills NFL");
    }

    #[test]
    fn test_sportsbook_entry_paired_once() {
        let outcome = run(
            vec![quote(Source::Sportsbook, "Buffalo Bills", "Kansas City Chiefs", "ml", "home", None)],
            vec![
                quote(Source::Exchange, "Buffalo", "Kansas City", "ml", "home", None),
                quote(Source::Exchange, "Buffalo Bills", "Kansas City", "ml", "home", None),
            ],
        );

        assert_eq!(outcome.pairs.len(), 1);
        assert_eq!(outcome.unmatched_exchange, 1);
    }

    #[test]
    fn test_exact_pairs_emitted_before_fuzzy() {
        let outcome = run(
            vec![
                quote(Source::Sportsbook, "Buffalo Bills", "Kansas City Chiefs", "ml", "home", None),
                quote(Source::Sportsbook, "Buffalo Bills", "Kansas City Chiefs", "ml", "away", None),
            ],
            vec![
                quote(Source::Exchange, "Buffalo", "Kansas City", "ml", "home", None),
                quote(Source::Exchange, "Buffalo Bills", "Kansas City Chiefs", "ml", "away", None),
            ],
        );

        let kinds: Vec<MatchKind> = outcome.pairs.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![MatchKind::Exact, MatchKind::Fuzzy]);
    }

    #[test]
    fn test_empty_inputs() {
        let outcome = run(vec![], vec![]);
        assert!(outcome.pairs.is_empty());
        assert_eq!(outcome.unmatched_sportsbook, 0);
        assert_eq!(outcome.unmatched_exchange, 0);
    }
}
