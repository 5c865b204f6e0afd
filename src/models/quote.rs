use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a quote came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Traditional bookmaker (American / decimal odds)
    Sportsbook,
    /// Event-contract exchange (share prices in (0, 1))
    Exchange,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Sportsbook => "sportsbook",
            Source::Exchange => "exchange",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notation of a quote's raw value
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OddsFormat {
    /// Moneyline notation, e.g. -150 / +130
    American,
    /// European notation, e.g. 1.91
    Decimal,
    /// Exchange share price, e.g. 0.55
    ExchangePrice,
}

impl OddsFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OddsFormat::American => "american",
            OddsFormat::Decimal => "decimal",
            OddsFormat::ExchangePrice => "exchange_price",
        }
    }
}

impl fmt::Display for OddsFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single priced outcome as handed over by a collector.
///
/// `market_type` and `side` keep the upstream vocabulary ("ml", "h2h",
/// "home", "1", ...). They are mapped to the internal enumeration when the
/// quote is indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsQuote {
    /// Which catalog the quote belongs to
    pub source: Source,

    /// Provider event identifier (not used for matching)
    pub event_id: String,

    /// Provider market identifier or contract ticker (not used for matching)
    #[serde(default)]
    pub market_id: String,

    /// Home team as named by the provider
    pub home_team: String,

    /// Away team as named by the provider
    pub away_team: String,

    /// Scheduled start of the event
    pub start_time: DateTime<Utc>,

    /// Upstream market type string (e.g. "moneyline", "ml", "spread")
    pub market_type: String,

    /// Upstream side string (e.g. "home", "away", "over")
    pub side: String,

    /// Point spread or total threshold, if the market has one
    #[serde(default)]
    pub line_value: Option<f64>,

    /// Price in the notation given by `format`
    pub raw_value: f64,

    /// Notation of `raw_value`
    pub format: OddsFormat,

    /// When the provider last updated the price
    pub timestamp: DateTime<Utc>,

    /// Liquidity proxy in USD, when the provider reports one
    #[serde(default)]
    pub liquidity: Option<f64>,

    /// Sportsbook that posted the price; `None` for exchange contracts
    #[serde(default)]
    pub bookmaker: Option<String>,
}

impl OddsQuote {
    /// Human-readable matchup label, e.g. "Chelsea vs Arsenal"
    pub fn matchup(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }
}
