use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::matching::team_resolver::normalize_text;
use crate::models::{OddsFormat, OddsQuote, Source};
use crate::odds::converter::cents_to_exchange_price;

const PAGE_LIMIT: &str = "200";
const MAX_PAGES: usize = 50;

/// Client for the Kalshi trade API (public market data)
pub struct KalshiClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

/// Paginated markets response
#[derive(Debug, Deserialize)]
struct MarketsResponse {
    #[serde(default)]
    markets: Vec<KalshiMarket>,
    #[serde(default)]
    cursor: Option<String>,
}

/// Single binary contract
#[derive(Debug, Deserialize)]
struct KalshiMarket {
    ticker: String,
    #[serde(default)]
    event_ticker: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    yes_sub_title: Option<String>,
    #[serde(default)]
    subtitle: Option<String>,
    yes_ask: Option<i64>,
    last_price: Option<i64>,
    liquidity: Option<i64>,
    volume: Option<i64>,
    occurrence_datetime: Option<String>,
    expected_expiration_time: Option<String>,
}

impl KalshiClient {
    /// Create a new Kalshi client
    pub fn new(base_url: &str, api_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    /// Fetch open contracts for each series and convert them to quotes
    pub async fn fetch_quotes(&self, series_tickers: &[String]) -> Result<Vec<OddsQuote>> {
        let mut quotes = Vec::new();

        for series in series_tickers {
            let markets = self.fetch_series_markets(series).await?;
            let total = markets.len();
            let fetched_at = Utc::now();

            let converted: Vec<OddsQuote> = markets
                .into_iter()
                .filter_map(|market| convert_market(series, market, fetched_at))
                .collect();

            info!(
                "Kalshi {}: {} quotes from {} contracts ({} skipped)",
                series,
                converted.len(),
                total,
                total - converted.len()
            );
            quotes.extend(converted);
        }

        Ok(quotes)
    }

    async fn fetch_series_markets(&self, series: &str) -> Result<Vec<KalshiMarket>> {
        let url = format!("{}/markets", self.base_url);
        let mut markets = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 0..MAX_PAGES {
            let mut query = vec![
                ("series_ticker", series.to_string()),
                ("status", "open".to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            debug!("Fetching Kalshi {} page {}", series, page);

            let mut request = self
                .client
                .get(&url)
                .header("Accept", "application/json")
                .query(&query);
            if let Some(token) = &self.api_token {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .await
                .context("Failed to fetch Kalshi markets")?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                anyhow::bail!("Kalshi API error: {} - {}", status, text);
            }

            let body: MarketsResponse = response
                .json()
                .await
                .context("Failed to parse Kalshi markets response")?;

            markets.extend(body.markets);

            match body.cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => return Ok(markets),
            }
        }

        warn!(
            "Kalshi {} still paginating after {} pages, stopping",
            series, MAX_PAGES
        );
        Ok(markets)
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> &'a str {
    let cut = text.len().saturating_sub(suffix.len());
    match text.get(cut..) {
        Some(tail) if tail.eq_ignore_ascii_case(suffix) => text[..cut].trim_end(),
        _ => text,
    }
}

/// Teams from a contract title as (home, away).
///
/// "Arsenal vs Chelsea Winner?" -> (Arsenal, Chelsea);
/// "Chelsea at Arsenal: Total Goals" -> (Arsenal, Chelsea).
fn parse_teams(title: &str) -> Option<(String, String)> {
    let title = title.split(':').next()?.trim().trim_end_matches('?').trim();
    let title = strip_suffix_ignore_case(title, " winner");

    let both = |a: &str, b: &str| {
        let (a, b) = (a.trim(), b.trim());
        (!a.is_empty() && !b.is_empty()).then(|| (a.to_string(), b.to_string()))
    };

    for separator in [" vs. ", " vs ", " VS ", " v "] {
        if let Some((home, away)) = title.split_once(separator) {
            return both(home, away);
        }
    }
    for separator in [" at ", " @ "] {
        if let Some((away, home)) = title.split_once(separator) {
            return both(home, away);
        }
    }
    None
}

fn market_type_for_series(series: &str) -> &'static str {
    let series = series.to_uppercase();
    if series.contains("SPREAD") {
        "spread"
    } else if series.contains("TOTAL") {
        "total"
    } else {
        "moneyline"
    }
}

fn first_number(text: &str) -> Option<f64> {
    text.split_whitespace().find_map(|token| {
        token
            .trim_matches(|c: char| !(c.is_ascii_digit() || c == '.'))
            .parse()
            .ok()
    })
}

/// "home"/"away" for a team name from a sub-title
fn team_side(name: &str, home: &str, away: &str) -> Option<&'static str> {
    let name = normalize_text(name);
    if name.is_empty() {
        return None;
    }
    let home = normalize_text(home);
    let away = normalize_text(away);

    if name == home {
        return Some("home");
    }
    if name == away {
        return Some("away");
    }

    let in_home = home.contains(&name) || name.contains(&home);
    let in_away = away.contains(&name) || name.contains(&away);
    match (in_home, in_away) {
        (true, false) => Some("home"),
        (false, true) => Some("away"),
        _ => None,
    }
}

/// Side and line backed by the "yes" outcome of a contract
fn parse_selection(
    market_type: &str,
    sub_title: &str,
    home: &str,
    away: &str,
) -> Option<(String, Option<f64>)> {
    let lower = sub_title.trim().to_lowercase();

    match market_type {
        "total" => {
            let side = if lower.starts_with("over") {
                "over"
            } else if lower.starts_with("under") {
                "under"
            } else {
                return None;
            };
            Some((side.to_string(), Some(first_number(&lower)?)))
        }
        "spread" => {
            let (team, margin) = lower.split_once(" wins by ")?;
            let side = team_side(team, home, away)?;
            Some((side.to_string(), Some(-first_number(margin)?)))
        }
        _ => {
            if lower == "tie" || lower == "draw" {
                return Some(("draw".to_string(), None));
            }
            let side = team_side(&lower, home, away)?;
            Some((side.to_string(), None))
        }
    }
}

fn convert_market(
    series: &str,
    market: KalshiMarket,
    fetched_at: DateTime<Utc>,
) -> Option<OddsQuote> {
    let Some((home_team, away_team)) = parse_teams(&market.title) else {
        debug!("Skipping {}: no teams in title {:?}", market.ticker, market.title);
        return None;
    };

    let market_type = market_type_for_series(series);
    let sub_title = market
        .yes_sub_title
        .as_deref()
        .or(market.subtitle.as_deref())
        .unwrap_or_default();
    let Some((side, line_value)) = parse_selection(market_type, sub_title, &home_team, &away_team)
    else {
        debug!("Skipping {}: unreadable selection {:?}", market.ticker, sub_title);
        return None;
    };

    let cents = market.yes_ask.filter(|c| *c > 0).or(market.last_price)?;
    let raw_value = match cents_to_exchange_price(cents) {
        Ok(price) => price,
        Err(e) => {
            debug!("Skipping {}: {}", market.ticker, e);
            return None;
        }
    };

    let start_time = market
        .occurrence_datetime
        .as_deref()
        .and_then(parse_time)
        .or_else(|| market.expected_expiration_time.as_deref().and_then(parse_time))?;

    let liquidity = market
        .liquidity
        .map(|cents| cents as f64 / 100.0)
        .or(market.volume.map(|v| v as f64));

    Some(OddsQuote {
        source: Source::Exchange,
        event_id: market.event_ticker,
        market_id: market.ticker,
        home_team,
        away_team,
        start_time,
        market_type: market_type.to_string(),
        side,
        line_value,
        raw_value,
        format: OddsFormat::ExchangePrice,
        timestamp: fetched_at,
        liquidity,
        bookmaker: None,
    })
}
