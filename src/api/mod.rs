pub mod kalshi;
pub mod sportsgameodds;

pub use kalshi::KalshiClient;
pub use sportsgameodds::SportsGameOddsClient;
