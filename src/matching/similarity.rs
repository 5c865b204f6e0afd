//! Token-set similarity for team names that survived normalization but still
//! differ between catalogs ("kansas city" vs "kansas city chiefs").

use std::collections::BTreeSet;

fn tokens(name: &str) -> BTreeSet<&str> {
    name.split_whitespace().collect()
}

/// Token-set overlap ratio: shared tokens over the smaller token set.
///
/// 1.0 when one name's tokens are contained in the other's, 0.0 when either
/// name is empty or nothing is shared.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let a = tokens(a);
    let b = tokens(b);

    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }

    let shared = a.intersection(&b).count();
    shared as f64 / smaller as f64
}

/// Best alignment of two team pairs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairAlignment {
    /// Mean per-team ratio under the chosen alignment
    pub score: f64,
    /// true when pair A's first team lines up with pair B's second team
    pub crossed: bool,
    /// Lower of the two per-team ratios under the chosen alignment
    pub weakest: f64,
}

impl PairAlignment {
    /// Every aligned team shares at least one token with its counterpart
    pub fn all_teams_overlap(&self) -> bool {
        self.weakest > 0.0
    }

    /// Slot in pair B that corresponds to `slot` in pair A
    pub fn counterpart(&self, slot: usize) -> usize {
        if self.crossed {
            1 - slot
        } else {
            slot
        }
    }
}

/// Score both ways of lining up two team pairs and keep the better one.
/// Straight alignment wins ties.
pub fn team_pair_similarity(a: (&str, &str), b: (&str, &str)) -> PairAlignment {
    let align = |first: f64, second: f64, crossed: bool| PairAlignment {
        score: (first + second) / 2.0,
        crossed,
        weakest: first.min(second),
    };

    let straight = align(token_set_ratio(a.0, b.0), token_set_ratio(a.1, b.1), false);
    let crossed = align(token_set_ratio(a.0, b.1), token_set_ratio(a.1, b.0), true);

    if crossed.score > straight.score {
        crossed
    } else {
        straight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_set_ratio() {
        assert_eq!(token_set_ratio("kansas city", "kansas city chiefs"), 1.0);
        assert_eq!(token_set_ratio("chiefs city kansas", "kansas city chiefs"), 1.0);
        assert!((token_set_ratio("new york giants", "new york jets") - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(token_set_ratio("arsenal", "chelsea"), 0.0);
        assert_eq!(token_set_ratio("", "chelsea"), 0.0);
    }

    #[test]
    fn test_team_pair_similarity_straight() {
        let alignment =
            team_pair_similarity(("buffalo", "kansas city"), ("buffalo bills", "kansas city chiefs"));
        assert_eq!(alignment.score, 1.0);
        assert!(!alignment.crossed);
        assert_eq!(alignment.counterpart(0), 0);
    }

    #[test]
    fn test_team_pair_similarity_crossed() {
        let alignment = team_pair_similarity(
            ("manchester united", "wolves"),
            ("wolverhampton wolves", "manchester united fc"),
        );
        assert_eq!(alignment.score, 1.0);
        assert!(alignment.crossed);
        assert_eq!(alignment.counterpart(0), 1);
        assert_eq!(alignment.counterpart(1), 0);
    }

    #[test]
    fn test_similar_but_different_team_stays_below_threshold() {
        let alignment = team_pair_similarity(
            ("dallas cowboys", "new york giants"),
            ("dallas cowboys", "new york jets"),
        );
        assert!(alignment.score < 0.85);
        assert!(alignment.all_teams_overlap());
    }

    #[test]
    fn test_unrelated_pairs_do_not_overlap() {
        let alignment = team_pair_similarity(("arsenal", "chelsea"), ("burnley", "fulham"));
        assert_eq!(alignment.score, 0.0);
        assert!(!alignment.all_teams_overlap());

        let half = team_pair_similarity(("arsenal", "chelsea"), ("arsenal", "fulham"));
        assert_eq!(half.score, 0.5);
        assert_eq!(half.weakest, 0.0);
        assert!(!half.all_teams_overlap());
    }
}
