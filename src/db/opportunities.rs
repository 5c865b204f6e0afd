use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use tracing::info;

use crate::models::{
    ComparisonReport, FavoredSide, MatchKind, OddsFormat, OpportunityRecord, RunStats, Strength,
};

/// SQLite store for comparison runs and the opportunities they emitted
pub struct OpportunityStore {
    pool: Pool<Sqlite>,
}

/// Opportunity as read back from the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOpportunity {
    pub id: i64,
    pub run_id: i64,
    pub created_at: DateTime<Utc>,
    pub record: OpportunityRecord,
}

impl OpportunityStore {
    /// Create a new opportunity store and initialize the database
    pub async fn new(database_url: &str) -> Result<Self> {
        if let Some(path) = database_url.strip_prefix("sqlite:") {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .context("Failed to create database directory")?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init_schema().await?;

        info!("Opportunity store initialized");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                as_of TEXT NOT NULL,
                total_sportsbook_quotes INTEGER NOT NULL,
                total_exchange_quotes INTEGER NOT NULL,
                rejected_invalid INTEGER NOT NULL,
                unmapped_vocabulary INTEGER NOT NULL,
                duplicate_keys INTEGER NOT NULL,
                unmatched_sportsbook INTEGER NOT NULL,
                unmatched_exchange INTEGER NOT NULL,
                matched_exact INTEGER NOT NULL,
                matched_fuzzy INTEGER NOT NULL,
                incomplete_markets INTEGER NOT NULL,
                filtered_pairs INTEGER NOT NULL,
                opportunities_emitted INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create runs table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS opportunities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id INTEGER NOT NULL REFERENCES runs (id),
                matchup TEXT NOT NULL,
                market TEXT NOT NULL,
                start_time TEXT NOT NULL,
                bookmaker TEXT,
                sportsbook_market_id TEXT NOT NULL,
                sportsbook_odds REAL NOT NULL,
                sportsbook_format TEXT NOT NULL,
                sportsbook_implied REAL NOT NULL,
                sportsbook_fair REAL NOT NULL,
                sportsbook_overround REAL NOT NULL,
                exchange_ticker TEXT NOT NULL,
                exchange_price REAL NOT NULL,
                exchange_fair REAL NOT NULL,
                probability_delta REAL NOT NULL,
                materiality_score REAL NOT NULL,
                match_confidence REAL NOT NULL,
                match_kind TEXT NOT NULL,
                favored_side TEXT NOT NULL,
                strength TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create opportunities table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_opportunities_matchup
            ON opportunities (matchup)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_opportunities_created
            ON opportunities (created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record a run and every opportunity it emitted, atomically. Returns the run id.
    pub async fn insert_run(&self, as_of: DateTime<Utc>, report: &ComparisonReport) -> Result<i64> {
        let stats = &report.stats;
        let created_at = as_of.to_rfc3339();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let result = sqlx::query(
            r#"
            INSERT INTO runs (
                as_of,
                total_sportsbook_quotes,
                total_exchange_quotes,
                rejected_invalid,
                unmapped_vocabulary,
                duplicate_keys,
                unmatched_sportsbook,
                unmatched_exchange,
                matched_exact,
                matched_fuzzy,
                incomplete_markets,
                filtered_pairs,
                opportunities_emitted
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&created_at)
        .bind(stats.total_sportsbook_quotes as i64)
        .bind(stats.total_exchange_quotes as i64)
        .bind(stats.rejected_invalid as i64)
        .bind(stats.unmapped_vocabulary as i64)
        .bind(stats.duplicate_keys as i64)
        .bind(stats.unmatched_sportsbook as i64)
        .bind(stats.unmatched_exchange as i64)
        .bind(stats.matched_exact as i64)
        .bind(stats.matched_fuzzy as i64)
        .bind(stats.incomplete_markets as i64)
        .bind(stats.filtered_pairs as i64)
        .bind(stats.opportunities_emitted as i64)
        .execute(&mut *tx)
        .await
        .context("Failed to insert run")?;

        let run_id = result.last_insert_rowid();

        for opportunity in &report.opportunities {
            let record = OpportunityRecord::from(opportunity);

            sqlx::query(
                r#"
                INSERT INTO opportunities (
                    run_id,
                    matchup,
                    market,
                    start_time,
                    bookmaker,
                    sportsbook_market_id,
                    sportsbook_odds,
                    sportsbook_format,
                    sportsbook_implied,
                    sportsbook_fair,
                    sportsbook_overround,
                    exchange_ticker,
                    exchange_price,
                    exchange_fair,
                    probability_delta,
                    materiality_score,
                    match_confidence,
                    match_kind,
                    favored_side,
                    strength,
                    created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(run_id)
            .bind(&record.matchup)
            .bind(&record.market)
            .bind(record.start_time.to_rfc3339())
            .bind(&record.bookmaker)
            .bind(&record.sportsbook_market_id)
            .bind(record.sportsbook_odds)
            .bind(record.sportsbook_format.as_str())
            .bind(record.sportsbook_implied)
            .bind(record.sportsbook_fair)
            .bind(record.sportsbook_overround)
            .bind(&record.exchange_ticker)
            .bind(record.exchange_price)
            .bind(record.exchange_fair)
            .bind(record.probability_delta)
            .bind(record.materiality_score)
            .bind(record.match_confidence)
            .bind(record.match_kind.as_str())
            .bind(record.favored_side.as_str())
            .bind(record.strength.as_str())
            .bind(&created_at)
            .execute(&mut *tx)
            .await
            .context("Failed to insert opportunity")?;
        }

        tx.commit().await.context("Failed to commit run")?;

        Ok(run_id)
    }

    /// Get recent opportunities for a matchup, newest run first
    pub async fn get_opportunities_for_matchup(
        &self,
        matchup: &str,
        limit: i64,
    ) -> Result<Vec<StoredOpportunity>> {
        let rows = sqlx::query_as::<_, OpportunityRow>(
            r#"
            SELECT * FROM opportunities
            WHERE matchup = ?
            ORDER BY created_at DESC, materiality_score DESC
            LIMIT ?
            "#,
        )
        .bind(matchup)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch opportunities")?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Statistics recorded for a run
    pub async fn get_run_stats(&self, run_id: i64) -> Result<Option<RunStats>> {
        let row = sqlx::query_as::<_, RunRow>("SELECT * FROM runs WHERE id = ?")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch run")?;

        Ok(row.map(|r| r.into()))
    }

    /// Get count of stored opportunities
    pub async fn get_opportunity_count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM opportunities")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count opportunities")?;

        Ok(row.0)
    }
}

#[derive(sqlx::FromRow)]
struct RunRow {
    total_sportsbook_quotes: i64,
    total_exchange_quotes: i64,
    rejected_invalid: i64,
    unmapped_vocabulary: i64,
    duplicate_keys: i64,
    unmatched_sportsbook: i64,
    unmatched_exchange: i64,
    matched_exact: i64,
    matched_fuzzy: i64,
    incomplete_markets: i64,
    filtered_pairs: i64,
    opportunities_emitted: i64,
}

impl From<RunRow> for RunStats {
    fn from(row: RunRow) -> Self {
        let count = |v: i64| v.max(0) as usize;
        RunStats {
            total_sportsbook_quotes: count(row.total_sportsbook_quotes),
            total_exchange_quotes: count(row.total_exchange_quotes),
            rejected_invalid: count(row.rejected_invalid),
            unmapped_vocabulary: count(row.unmapped_vocabulary),
            duplicate_keys: count(row.duplicate_keys),
            unmatched_sportsbook: count(row.unmatched_sportsbook),
            unmatched_exchange: count(row.unmatched_exchange),
            matched_exact: count(row.matched_exact),
            matched_fuzzy: count(row.matched_fuzzy),
            incomplete_markets: count(row.incomplete_markets),
            filtered_pairs: count(row.filtered_pairs),
            opportunities_emitted: count(row.opportunities_emitted),
        }
    }
}

/// Database row representation
#[derive(sqlx::FromRow)]
struct OpportunityRow {
    id: i64,
    run_id: i64,
    matchup: String,
    market: String,
    start_time: String,
    bookmaker: Option<String>,
    sportsbook_market_id: String,
    sportsbook_odds: f64,
    sportsbook_format: String,
    sportsbook_implied: f64,
    sportsbook_fair: f64,
    sportsbook_overround: f64,
    exchange_ticker: String,
    exchange_price: f64,
    exchange_fair: f64,
    probability_delta: f64,
    materiality_score: f64,
    match_confidence: f64,
    match_kind: String,
    favored_side: String,
    strength: String,
    created_at: String,
}

impl From<OpportunityRow> for StoredOpportunity {
    fn from(row: OpportunityRow) -> Self {
        StoredOpportunity {
            id: row.id,
            run_id: row.run_id,
            created_at: parse_time(&row.created_at),
            record: OpportunityRecord {
                matchup: row.matchup,
                market: row.market,
                start_time: parse_time(&row.start_time),
                bookmaker: row.bookmaker,
                sportsbook_market_id: row.sportsbook_market_id,
                sportsbook_odds: row.sportsbook_odds,
                sportsbook_format: parse_odds_format(&row.sportsbook_format),
                sportsbook_implied: row.sportsbook_implied,
                sportsbook_fair: row.sportsbook_fair,
                sportsbook_overround: row.sportsbook_overround,
                exchange_ticker: row.exchange_ticker,
                exchange_price: row.exchange_price,
                exchange_fair: row.exchange_fair,
                probability_delta: row.probability_delta,
                materiality_score: row.materiality_score,
                match_confidence: row.match_confidence,
                match_kind: parse_match_kind(&row.match_kind),
                favored_side: parse_favored_side(&row.favored_side),
                strength: parse_strength(&row.strength),
            },
        }
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn parse_odds_format(s: &str) -> OddsFormat {
    match s {
        "american" => OddsFormat::American,
        "decimal" => OddsFormat::Decimal,
        _ => OddsFormat::ExchangePrice,
    }
}

fn parse_match_kind(s: &str) -> MatchKind {
    match s {
        "fuzzy" => MatchKind::Fuzzy,
        _ => MatchKind::Exact,
    }
}

fn parse_favored_side(s: &str) -> FavoredSide {
    match s {
        "sportsbook" => FavoredSide::Sportsbook,
        _ => FavoredSide::Exchange,
    }
}

fn parse_strength(s: &str) -> Strength {
    match s {
        "moderate" => Strength::Moderate,
        "strong" => Strength::Strong,
        "very_strong" => Strength::VeryStrong,
        _ => Strength::Weak,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::analysis::ComparisonEngine;
    use crate::config::ComparisonConfig;
    use crate::matching::TeamResolver;
    use crate::models::{OddsQuote, Source};

    fn sample_report(as_of: DateTime<Utc>) -> ComparisonReport {
        let quote = |source: Source, side: &str, raw_value: f64, format: OddsFormat| OddsQuote {
            source,
            event_id: "evt".to_string(),
            market_id: format!("{}-{}", source, side),
            home_team: "Liverpool".to_string(),
            away_team: "Everton".to_string(),
            start_time: as_of,
            market_type: "moneyline".to_string(),
            side: side.to_string(),
            line_value: None,
            raw_value,
            format,
            timestamp: as_of,
            liquidity: None,
            bookmaker: (source == Source::Sportsbook).then(|| "pinnacle".to_string()),
        };

        let engine =
            ComparisonEngine::new(ComparisonConfig::default(), TeamResolver::new()).unwrap();
        engine.run(
            &[
                quote(Source::Sportsbook, "home", -150.0, OddsFormat::American),
                quote(Source::Sportsbook, "away", 130.0, OddsFormat::American),
            ],
            &[quote(Source::Exchange, "home", 0.5, OddsFormat::ExchangePrice)],
            as_of,
        )
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!(parse_odds_format("american"), OddsFormat::American);
        assert_eq!(parse_odds_format("exchange_price"), OddsFormat::ExchangePrice);
        assert_eq!(parse_match_kind("fuzzy"), MatchKind::Fuzzy);
        assert_eq!(parse_favored_side("sportsbook"), FavoredSide::Sportsbook);
        assert_eq!(parse_strength("very_strong"), Strength::VeryStrong);
        assert_eq!(parse_strength("unknown"), Strength::Weak);
    }

    #[tokio::test]
    async fn test_insert_and_query_run() {
        let path = std::env::temp_dir().join(format!(
            "odds_signal_store_test_{}.db",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let url = format!("sqlite:{}", path.display());

        let store = OpportunityStore::new(&url).await.unwrap();
        let as_of = Utc.with_ymd_and_hms(2024, 3, 9, 15, 0, 0).unwrap();
        let report = sample_report(as_of);

        let run_id = store.insert_run(as_of, &report).await.unwrap();
        assert_eq!(store.get_opportunity_count().await.unwrap(), 1);

        let stats = store.get_run_stats(run_id).await.unwrap().unwrap();
        assert_eq!(stats, report.stats);
        assert!(store.get_run_stats(run_id + 1).await.unwrap().is_none());

        let stored = store
            .get_opportunities_for_matchup("Liverpool vs Everton", 10)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].run_id, run_id);
        assert_eq!(stored[0].created_at, as_of);
        assert_eq!(stored[0].record.bookmaker.as_deref(), Some("pinnacle"));
        assert_eq!(
            stored[0].record,
            OpportunityRecord::from(&report.opportunities[0])
        );

        assert!(store
            .get_opportunities_for_matchup("Arsenal vs Chelsea", 10)
            .await
            .unwrap()
            .is_empty());

        drop(store);
        let _ = std::fs::remove_file(&path);
    }
}
