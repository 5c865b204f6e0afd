use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::{OddsFormat, OddsQuote, Source};

const PAGE_LIMIT: &str = "50";
const MAX_PAGES: usize = 100;

/// Client for the SportsGameOdds events API
pub struct SportsGameOddsClient {
    client: Client,
    base_url: String,
    api_key: String,
    bookmakers: Vec<String>,
}

/// Paginated events response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<Value>,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventResponse {
    #[serde(alias = "eventID")]
    id: String,
    home_team: TeamResponse,
    away_team: TeamResponse,
    start_time: String,
    #[serde(default)]
    markets: Vec<MarketResponse>,
}

#[derive(Debug, Deserialize)]
struct TeamResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketResponse {
    #[serde(default)]
    id: Option<String>,
    market_type: String,
    #[serde(default, alias = "bookmakerID")]
    bookmaker: Option<String>,
    #[serde(default)]
    outcomes: Vec<OutcomeResponse>,
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutcomeResponse {
    name: String,
    #[serde(default)]
    handicap: Option<Value>,
    #[serde(default)]
    price: Value,
}

impl SportsGameOddsClient {
    /// Create a new SportsGameOdds client
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            bookmakers: Vec::new(),
        }
    }

    /// Keep only markets posted by these bookmakers (empty keeps all)
    pub fn with_bookmakers(mut self, bookmakers: Vec<String>) -> Self {
        self.bookmakers = bookmakers;
        self
    }

    fn accepts(&self, quote: &OddsQuote) -> bool {
        if self.bookmakers.is_empty() {
            return true;
        }
        quote.bookmaker.as_deref().is_some_and(|name| {
            self.bookmakers
                .iter()
                .any(|wanted| wanted.eq_ignore_ascii_case(name))
        })
    }

    /// Fetch every quote for the given leagues, draining pagination
    pub async fn fetch_quotes(&self, leagues: &[String]) -> Result<Vec<OddsQuote>> {
        let mut quotes = Vec::new();

        for league in leagues {
            let league_quotes = self.fetch_league(league).await?;
            info!("SportsGameOdds {}: {} quotes", league, league_quotes.len());
            quotes.extend(league_quotes);
        }

        Ok(quotes)
    }

    async fn fetch_league(&self, league: &str) -> Result<Vec<OddsQuote>> {
        let url = format!("{}/events", self.base_url);
        let mut quotes = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 0..MAX_PAGES {
            let mut query = vec![
                ("leagueID", league.to_string()),
                ("oddsAvailable", "true".to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            debug!("Fetching SportsGameOdds {} page {}", league, page);

            let response = self
                .client
                .get(&url)
                .header("X-Api-Key", &self.api_key)
                .header("Accept", "application/json")
                .query(&query)
                .send()
                .await
                .context("Failed to fetch SportsGameOdds events")?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                anyhow::bail!("SportsGameOdds API error: {} - {}", status, text);
            }

            let body: EventsResponse = response
                .json()
                .await
                .context("Failed to parse SportsGameOdds events response")?;

            if !body.success {
                warn!("SportsGameOdds returned success=false for {}", league);
            }

            let fetched_at = Utc::now();
            for raw in body.data {
                match serde_json::from_value::<EventResponse>(raw) {
                    Ok(event) => quotes.extend(
                        convert_event(event, fetched_at)
                            .into_iter()
                            .filter(|quote| self.accepts(quote)),
                    ),
                    Err(e) => warn!("Skipping unparseable SportsGameOdds event: {}", e),
                }
            }

            match body.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => return Ok(quotes),
            }
        }

        warn!(
            "SportsGameOdds {} still paginating after {} pages, stopping",
            league, MAX_PAGES
        );
        Ok(quotes)
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Signed strings are American, bare numbers are decimal
fn parse_price(price: &Value) -> Option<(f64, OddsFormat)> {
    match price {
        Value::Number(n) => n.as_f64().map(|v| (v, OddsFormat::Decimal)),
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("even") || s.eq_ignore_ascii_case("ev") {
                return Some((100.0, OddsFormat::American));
            }
            let value: f64 = s.parse().ok()?;
            if s.starts_with('+') || s.starts_with('-') {
                Some((value, OddsFormat::American))
            } else {
                Some((value, OddsFormat::Decimal))
            }
        }
        _ => None,
    }
}

fn parse_handicap(handicap: &Option<Value>) -> Option<f64> {
    match handicap.as_ref()? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Flatten an event into one quote per priced outcome.
///
/// Outcome names equal to a team become "home"/"away"; everything else keeps
/// its upstream name for the index's vocabulary table to judge.
fn convert_event(event: EventResponse, fetched_at: DateTime<Utc>) -> Vec<OddsQuote> {
    let Some(start_time) = parse_time(&event.start_time) else {
        warn!(
            "Skipping SportsGameOdds event {}: bad start time {}",
            event.id, event.start_time
        );
        return Vec::new();
    };

    let home_team = event.home_team.name.trim().to_string();
    let away_team = event.away_team.name.trim().to_string();
    let mut quotes = Vec::new();

    for market in event.markets {
        let timestamp = market
            .last_updated
            .as_deref()
            .and_then(parse_time)
            .unwrap_or(fetched_at);
        let market_id = market
            .id
            .clone()
            .unwrap_or_else(|| format!("{}:{}", event.id, market.market_type));

        for outcome in market.outcomes {
            let Some((raw_value, format)) = parse_price(&outcome.price) else {
                debug!(
                    "Skipping outcome {} in {}: unreadable price {}",
                    outcome.name, market_id, outcome.price
                );
                continue;
            };

            let side = if outcome.name == home_team {
                "home".to_string()
            } else if outcome.name == away_team {
                "away".to_string()
            } else {
                outcome.name.to_lowercase()
            };

            quotes.push(OddsQuote {
                source: Source::Sportsbook,
                event_id: event.id.clone(),
                market_id: format!("{}:{}", market_id, side),
                home_team: home_team.clone(),
                away_team: away_team.clone(),
                start_time,
                market_type: market.market_type.clone(),
                side,
                line_value: parse_handicap(&outcome.handicap),
                raw_value,
                format,
                timestamp,
                liquidity: None,
                bookmaker: market.bookmaker.clone(),
            });
        }
    }

    quotes
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()
    }

    fn sample_event() -> EventResponse {
        serde_json::from_value(json!({
            "id": "evt_123",
            "homeTeam": { "name": "Arsenal" },
            "awayTeam": { "name": "Chelsea" },
            "startTime": "2024-03-09T15:00:00Z",
            "markets": [
                {
                    "marketType": "SPREAD",
                    "bookmakerID": "draftkings",
                    "lastUpdated": "2024-03-09T11:55:00Z",
                    "outcomes": [
                        { "name": "Arsenal", "handicap": -1.5, "price": "+120" },
                        { "name": "Chelsea", "handicap": "1.5", "price": "-140" }
                    ]
                },
                {
                    "id": "mkt_ml",
                    "marketType": "MONEYLINE",
                    "outcomes": [
                        { "name": "Arsenal", "price": 1.8 },
                        { "name": "Draw", "price": 3.6 },
                        { "name": "Chelsea", "price": "EVEN" },
                        { "name": "Someone" }
                    ]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price(&json!("-150")), Some((-150.0, OddsFormat::American)));
        assert_eq!(parse_price(&json!("+130")), Some((130.0, OddsFormat::American)));
        assert_eq!(parse_price(&json!("1.91")), Some((1.91, OddsFormat::Decimal)));
        assert_eq!(parse_price(&json!(2.5)), Some((2.5, OddsFormat::Decimal)));
        assert_eq!(parse_price(&json!("ev")), Some((100.0, OddsFormat::American)));
        assert_eq!(parse_price(&json!("n/a")), None);
        assert_eq!(parse_price(&json!(null)), None);
    }

    #[test]
    fn test_convert_event() {
        let quotes = convert_event(sample_event(), fetched_at());
        assert_eq!(quotes.len(), 5);

        let spread_home = &quotes[0];
        assert_eq!(spread_home.source, Source::Sportsbook);
        assert_eq!(spread_home.side, "home");
        assert_eq!(spread_home.market_type, "SPREAD");
        assert_eq!(spread_home.line_value, Some(-1.5));
        assert_eq!(spread_home.raw_value, 120.0);
        assert_eq!(spread_home.format, OddsFormat::American);
        assert_eq!(
            spread_home.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 9, 11, 55, 0).unwrap()
        );

        assert_eq!(spread_home.bookmaker.as_deref(), Some("draftkings"));

        assert_eq!(quotes[1].side, "away");
        assert_eq!(quotes[1].line_value, Some(1.5));

        let draw = &quotes[3];
        assert_eq!(draw.side, "draw");
        assert_eq!(draw.format, OddsFormat::Decimal);
        assert_eq!(draw.market_id, "mkt_ml:draw");
        assert_eq!(draw.timestamp, fetched_at());
        assert_eq!(draw.bookmaker, None);
    }

    #[test]
    fn test_bookmaker_filter() {
        let quotes = convert_event(sample_event(), fetched_at());

        let all = SportsGameOddsClient::new("http://localhost", "key");
        assert_eq!(quotes.iter().filter(|q| all.accepts(q)).count(), 5);

        let filtered = SportsGameOddsClient::new("http://localhost", "key")
            .with_bookmakers(vec!["DraftKings".to_string()]);
        let kept: Vec<_> = quotes.iter().filter(|q| filtered.accepts(q)).collect();
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|q| q.market_type == "SPREAD"));
    }

    #[test]
    fn test_convert_event_bad_start_time() {
        let mut event = sample_event();
        event.start_time = "tomorrow".to_string();
        assert!(convert_event(event, fetched_at()).is_empty());
    }

    #[test]
    fn test_events_response_cursor() {
        let body: EventsResponse = serde_json::from_value(json!({
            "success": true,
            "data": [],
            "nextCursor": "abc"
        }))
        .unwrap();

        assert!(body.success);
        assert_eq!(body.next_cursor.as_deref(), Some("abc"));
    }
}
