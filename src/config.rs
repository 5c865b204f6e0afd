use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::error::{OddsError, OddsResult};

/// Settings of a single comparison run
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonConfig {
    /// Minimum |exchange fair - sportsbook fair| for an opportunity
    pub materiality_threshold: f64,

    /// Minimum match confidence, also the fuzzy acceptance threshold
    pub min_match_confidence: f64,

    /// De-vig exchange prices against their own side-set
    pub devig_exchange: bool,

    /// Age at which a quote's staleness weight reaches zero
    pub max_quote_age_secs: i64,

    /// Liquidity (USD) at which a quote gets full liquidity weight
    pub liquidity_reference: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            materiality_threshold: 0.03,
            min_match_confidence: 0.85,
            devig_exchange: false,
            max_quote_age_secs: 3600,
            liquidity_reference: 1000.0,
        }
    }
}

impl ComparisonConfig {
    #[must_use]
    pub fn with_materiality_threshold(mut self, threshold: f64) -> Self {
        self.materiality_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_min_match_confidence(mut self, confidence: f64) -> Self {
        self.min_match_confidence = confidence;
        self
    }

    #[must_use]
    pub fn with_devig_exchange(mut self, devig: bool) -> Self {
        self.devig_exchange = devig;
        self
    }

    /// Reject settings that would invalidate a whole run
    pub fn validate(&self) -> OddsResult<()> {
        if !(0.0..=1.0).contains(&self.materiality_threshold) {
            return Err(OddsError::Configuration(format!(
                "materiality_threshold must be within [0, 1], got {}",
                self.materiality_threshold
            )));
        }

        if !(0.0..=1.0).contains(&self.min_match_confidence) {
            return Err(OddsError::Configuration(format!(
                "min_match_confidence must be within [0, 1], got {}",
                self.min_match_confidence
            )));
        }

        if self.max_quote_age_secs <= 0 {
            return Err(OddsError::Configuration(format!(
                "max_quote_age_secs must be positive, got {}",
                self.max_quote_age_secs
            )));
        }

        if !(self.liquidity_reference.is_finite() && self.liquidity_reference > 0.0) {
            return Err(OddsError::Configuration(format!(
                "liquidity_reference must be positive, got {}",
                self.liquidity_reference
            )));
        }

        Ok(())
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// SportsGameOdds API URL
    pub sportsgameodds_api_url: String,

    /// SportsGameOdds API key
    pub sportsgameodds_api_key: String,

    /// League ids to pull from SportsGameOdds
    pub sportsgameodds_leagues: Vec<String>,

    /// Bookmaker ids to keep from SportsGameOdds (empty keeps all)
    pub sportsgameodds_bookmakers: Vec<String>,

    /// Kalshi trade API URL
    pub kalshi_api_url: String,

    /// Optional Kalshi bearer token
    pub kalshi_api_token: Option<String>,

    /// Kalshi series tickers to scan
    pub kalshi_series_tickers: Vec<String>,

    /// Comparison thresholds
    pub comparison: ComparisonConfig,

    /// Interval in seconds between runs in watch mode
    pub comparison_interval: u64,

    /// SQLite database path
    pub database_url: String,

    /// Team alias JSON file
    pub team_aliases_path: PathBuf,

    /// Directory receiving a quote snapshot per live run
    pub snapshot_dir: Option<PathBuf>,
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .with_context(|| format!("{} has an invalid value", name))
}

fn list_var(name: &str, default: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let comparison = ComparisonConfig {
            materiality_threshold: parse_var("MATERIALITY_THRESHOLD", "0.03")?,
            min_match_confidence: parse_var("MIN_MATCH_CONFIDENCE", "0.85")?,
            devig_exchange: parse_var("DEVIG_EXCHANGE", "false")?,
            max_quote_age_secs: parse_var("MAX_QUOTE_AGE_SECS", "3600")?,
            liquidity_reference: parse_var("LIQUIDITY_REFERENCE", "1000")?,
        };

        Ok(Config {
            sportsgameodds_api_url: env::var("SPORTSGAMEODDS_API_URL")
                .unwrap_or_else(|_| "https://api.sportsgameodds.com/v2".to_string()),

            sportsgameodds_api_key: env::var("SPORTSGAMEODDS_API_KEY")
                .context("SPORTSGAMEODDS_API_KEY must be set")?,

            sportsgameodds_leagues: list_var("SPORTSGAMEODDS_LEAGUES", "EPL"),

            sportsgameodds_bookmakers: list_var("SPORTSGAMEODDS_BOOKMAKERS", ""),

            kalshi_api_url: env::var("KALSHI_API_URL").unwrap_or_else(|_| {
                "https://api.elections.kalshi.com/trade-api/v2".to_string()
            }),

            kalshi_api_token: env::var("KALSHI_API_TOKEN")
                .ok()
                .filter(|token| !token.is_empty()),

            kalshi_series_tickers: list_var("KALSHI_SERIES_TICKERS", "KXEPLGAME"),

            comparison,

            comparison_interval: parse_var("COMPARISON_INTERVAL", "300")?,

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:data/opportunities.db".to_string()),

            team_aliases_path: env::var("TEAM_ALIASES_PATH")
                .unwrap_or_else(|_| "data/team_aliases.json".to_string())
                .into(),

            snapshot_dir: env::var("SNAPSHOT_DIR")
                .ok()
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}
