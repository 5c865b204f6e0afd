//! Normalized market identity shared by both catalogs.
//!
//! Upstream sources name the same concept differently ("ml" vs "moneyline",
//! "1" vs "home"). Every accepted upstream string is listed in the mapping
//! tables below; anything else is unmapped and the quote is dropped.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::team_resolver::TeamResolver;
use crate::models::OddsQuote;

/// Internal market type vocabulary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Moneyline,
    Spread,
    Total,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Moneyline => "moneyline",
            MarketType::Spread => "spread",
            MarketType::Total => "total",
        }
    }

    /// Whether quotes of this type must carry a line value
    pub fn has_line(&self) -> bool {
        !matches!(self, MarketType::Moneyline)
    }

    pub fn accepts(&self, side: Side) -> bool {
        match self {
            MarketType::Moneyline => matches!(side, Side::Home | Side::Away | Side::Draw),
            MarketType::Spread => matches!(side, Side::Home | Side::Away),
            MarketType::Total => matches!(side, Side::Over | Side::Under),
        }
    }
}

/// Internal side vocabulary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Home,
    Away,
    Draw,
    Over,
    Under,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
            Side::Draw => "draw",
            Side::Over => "over",
            Side::Under => "under",
        }
    }
}

const MARKET_TYPE_TABLE: &[(&str, MarketType)] = &[
    ("moneyline", MarketType::Moneyline),
    ("money_line", MarketType::Moneyline),
    ("ml", MarketType::Moneyline),
    ("h2h", MarketType::Moneyline),
    ("head_to_head", MarketType::Moneyline),
    ("1x2", MarketType::Moneyline),
    ("match_winner", MarketType::Moneyline),
    ("match_result", MarketType::Moneyline),
    ("game", MarketType::Moneyline),
    ("winner", MarketType::Moneyline),
    ("spread", MarketType::Spread),
    ("spreads", MarketType::Spread),
    ("point_spread", MarketType::Spread),
    ("ps", MarketType::Spread),
    ("handicap", MarketType::Spread),
    ("asian_handicap", MarketType::Spread),
    ("ah", MarketType::Spread),
    ("run_line", MarketType::Spread),
    ("runline", MarketType::Spread),
    ("puck_line", MarketType::Spread),
    ("puckline", MarketType::Spread),
    ("total", MarketType::Total),
    ("totals", MarketType::Total),
    ("ou", MarketType::Total),
    ("o_u", MarketType::Total),
    ("over_under", MarketType::Total),
    ("total_points", MarketType::Total),
    ("total_goals", MarketType::Total),
    ("total_runs", MarketType::Total),
];

const SIDE_TABLE: &[(&str, Side)] = &[
    ("home", Side::Home),
    ("home_team", Side::Home),
    ("h", Side::Home),
    ("1", Side::Home),
    ("away", Side::Away),
    ("away_team", Side::Away),
    ("a", Side::Away),
    ("2", Side::Away),
    ("visitor", Side::Away),
    ("road", Side::Away),
    ("draw", Side::Draw),
    ("tie", Side::Draw),
    ("x", Side::Draw),
    ("over", Side::Over),
    ("o", Side::Over),
    ("under", Side::Under),
    ("u", Side::Under),
];

/// Upstream token form used for table lookups: "Over/Under" -> "over_under"
fn vocabulary_token(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

pub fn map_market_type(raw: &str) -> Option<MarketType> {
    let token = vocabulary_token(raw);
    MARKET_TYPE_TABLE
        .iter()
        .find(|(name, _)| *name == token)
        .map(|(_, market_type)| *market_type)
}

pub fn map_side(raw: &str) -> Option<Side> {
    let token = vocabulary_token(raw);
    SIDE_TABLE
        .iter()
        .find(|(name, _)| *name == token)
        .map(|(_, side)| *side)
}

/// Round to the nearest minute; exactly half a minute rounds up
pub fn round_to_minute(time: DateTime<Utc>) -> DateTime<Utc> {
    let minute = (time.timestamp_millis() + 30_000).div_euclid(60_000);
    DateTime::from_timestamp(minute * 60, 0).unwrap_or(time)
}

/// Line value in hundredths so keys hash without float comparison
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineValue(i64);

impl LineValue {
    pub fn from_f64(line: f64) -> Option<Self> {
        if !line.is_finite() {
            return None;
        }
        Some(Self((line * 100.0).round() as i64))
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn negated(&self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Display for LineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.as_f64())
    }
}

/// Normalized team pair and start minute. Team order is irrelevant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventIdentity {
    /// Normalized team names, alphabetically ordered
    pub teams: (String, String),
    /// Scheduled start rounded to the minute
    pub start: DateTime<Utc>,
}

impl EventIdentity {
    pub fn new(team_a: String, team_b: String, start: DateTime<Utc>) -> Self {
        let teams = if team_a <= team_b {
            (team_a, team_b)
        } else {
            (team_b, team_a)
        };

        Self {
            teams,
            start: round_to_minute(start),
        }
    }

    /// Slot (0 or 1) of a normalized team in the ordered pair
    pub fn slot_of(&self, team: &str) -> Option<usize> {
        if self.teams.0 == team {
            Some(0)
        } else if self.teams.1 == team {
            Some(1)
        } else {
            None
        }
    }

    pub fn team(&self, slot: usize) -> &str {
        if slot == 0 {
            &self.teams.0
        } else {
            &self.teams.1
        }
    }
}

/// Side of a market key. Home/away sides name the backed team so the key
/// does not depend on which team a source listed first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    Team(String),
    Draw,
    Over,
    Under,
}

impl Selection {
    /// Same kind of selection, ignoring which team
    pub fn same_kind(&self, other: &Selection) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Team(name) => f.write_str(name),
            Selection::Draw => f.write_str("draw"),
            Selection::Over => f.write_str("over"),
            Selection::Under => f.write_str("under"),
        }
    }
}

/// Identity of a bettable proposition, independent of provider ids
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketKey {
    pub event: EventIdentity,
    pub market_type: MarketType,
    pub selection: Selection,
    pub line: Option<LineValue>,
}

/// Why a quote could not be keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRejection {
    UnknownMarketType,
    UnknownSide,
    SideNotInMarket,
    MissingLine,
    InvalidTeams,
}

impl KeyRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyRejection::UnknownMarketType => "unknown market type",
            KeyRejection::UnknownSide => "unknown side",
            KeyRejection::SideNotInMarket => "side not valid for market type",
            KeyRejection::MissingLine => "missing line value",
            KeyRejection::InvalidTeams => "missing or identical team names",
        }
    }
}

impl MarketKey {
    /// Build the key of a quote, returning the mapped side alongside it.
    pub fn from_quote(
        quote: &OddsQuote,
        resolver: &TeamResolver,
    ) -> Result<(Self, Side), KeyRejection> {
        let market_type =
            map_market_type(&quote.market_type).ok_or(KeyRejection::UnknownMarketType)?;
        let side = map_side(&quote.side).ok_or(KeyRejection::UnknownSide)?;

        if !market_type.accepts(side) {
            return Err(KeyRejection::SideNotInMarket);
        }

        let home = resolver.normalize(&quote.home_team);
        let away = resolver.normalize(&quote.away_team);
        if home.is_empty() || away.is_empty() || home == away {
            return Err(KeyRejection::InvalidTeams);
        }

        let line = if market_type.has_line() {
            Some(
                quote
                    .line_value
                    .and_then(LineValue::from_f64)
                    .ok_or(KeyRejection::MissingLine)?,
            )
        } else {
            None
        };

        let selection = match side {
            Side::Home => Selection::Team(home.clone()),
            Side::Away => Selection::Team(away.clone()),
            Side::Draw => Selection::Draw,
            Side::Over => Selection::Over,
            Side::Under => Selection::Under,
        };

        let key = Self {
            event: EventIdentity::new(home, away, quote.start_time),
            market_type,
            selection,
            line,
        };

        Ok((key, side))
    }

    /// Keys of every side of this key's market, in canonical order.
    ///
    /// Moneyline: both teams then draw. Spread: the backed team at its line
    /// and the opponent at the negated line. Total: over then under at the
    /// same line.
    pub fn side_set_keys(&self) -> Vec<MarketKey> {
        let with = |selection: Selection, line: Option<LineValue>| MarketKey {
            event: self.event.clone(),
            market_type: self.market_type,
            selection,
            line,
        };

        let (first, second) = (&self.event.teams.0, &self.event.teams.1);

        match self.market_type {
            MarketType::Moneyline => vec![
                with(Selection::Team(first.clone()), None),
                with(Selection::Team(second.clone()), None),
                with(Selection::Draw, None),
            ],
            MarketType::Spread => {
                let backed_first = matches!(&self.selection, Selection::Team(t) if t == first);
                let own = self.line;
                let other = self.line.map(|l| l.negated());
                let (first_line, second_line) = if backed_first {
                    (own, other)
                } else {
                    (other, own)
                };
                vec![
                    with(Selection::Team(first.clone()), first_line),
                    with(Selection::Team(second.clone()), second_line),
                ]
            }
            MarketType::Total => vec![
                with(Selection::Over, self.line),
                with(Selection::Under, self.line),
            ],
        }
    }

    /// Short label, e.g. "spread arsenal -1.5"
    pub fn label(&self) -> String {
        match self.line {
            Some(line) => format!("{} {} {}", self.market_type.as_str(), self.selection, line),
            None => format!("{} {}", self.market_type.as_str(), self.selection),
        }
    }
}
