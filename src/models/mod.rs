pub mod opportunity;
pub mod quote;

pub use opportunity::{
    CanonicalProbability, ComparisonReport, FavoredSide, MatchKind, MatchedPair, Opportunity,
    OpportunityRecord, RunStats, Strength,
};
pub use quote::{OddsFormat, OddsQuote, Source};
