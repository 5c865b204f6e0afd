pub mod index;
pub mod market_key;
pub mod matcher;
pub mod similarity;
pub mod team_resolver;

pub use index::{IndexStats, IndexedQuote, MarketIndex};
pub use market_key::{MarketKey, MarketType, Selection, Side};
pub use matcher::{MarketMatcher, MatchOutcome};
pub use team_resolver::TeamResolver;
