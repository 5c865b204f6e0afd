use std::fmt::Write;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::models::{ComparisonReport, OddsFormat, OpportunityRecord, RunStats};

#[derive(Serialize)]
struct JsonReport<'a> {
    opportunities: Vec<OpportunityRecord>,
    stats: &'a RunStats,
}

/// Renders comparison reports for humans and machines
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportAssembler;

fn format_odds(value: f64, format: OddsFormat) -> String {
    match format {
        OddsFormat::American => format!("{:+}", value as i64),
        OddsFormat::Decimal => format!("{:.2}", value),
        OddsFormat::ExchangePrice => format!("{:.2}", value),
    }
}

fn pct(p: f64) -> String {
    format!("{:.2}%", p * 100.0)
}

impl ReportAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Plain-text report, one block per opportunity followed by statistics
    pub fn render_text(&self, report: &ComparisonReport) -> String {
        let mut out = String::new();

        if report.opportunities.is_empty() {
            out.push_str("No significant opportunities found.\n");
        } else {
            let _ = writeln!(
                out,
                "Found {} potential opportunities:",
                report.opportunities.len()
            );
        }

        for (i, opportunity) in report.opportunities.iter().enumerate() {
            let record = OpportunityRecord::from(opportunity);

            let _ = writeln!(out, "Opportunity #{}:", i + 1);
            let _ = writeln!(
                out,
                "  Match: {} ({})",
                record.matchup,
                record.start_time.format("%Y-%m-%d %H:%M UTC")
            );
            let _ = writeln!(out, "  Market: {}", record.market);
            let _ = writeln!(
                out,
                "  Sportsbook: {}{} ({}, implied {}, fair {}, margin {})",
                record
                    .bookmaker
                    .as_deref()
                    .map(|name| format!("{} ", name))
                    .unwrap_or_default(),
                record.sportsbook_market_id,
                format_odds(record.sportsbook_odds, record.sportsbook_format),
                pct(record.sportsbook_implied),
                pct(record.sportsbook_fair),
                pct(record.sportsbook_overround)
            );
            let _ = writeln!(
                out,
                "  Exchange: {} ({:.2}, fair {})",
                record.exchange_ticker,
                record.exchange_price,
                pct(record.exchange_fair)
            );
            let _ = writeln!(
                out,
                "  Delta: {:+.2} pts | Score: {:.4} | Match: {} {:.2} | Favors: {} | {}",
                record.probability_delta * 100.0,
                record.materiality_score,
                record.match_kind.as_str(),
                record.match_confidence,
                record.favored_side.as_str(),
                record.strength.as_str()
            );
        }

        let stats = &report.stats;
        out.push_str("Run statistics:\n");
        let _ = writeln!(
            out,
            "  Quotes: {} sportsbook, {} exchange",
            stats.total_sportsbook_quotes, stats.total_exchange_quotes
        );
        let _ = writeln!(
            out,
            "  Dropped: {} invalid, {} unmapped, {} duplicate",
            stats.rejected_invalid, stats.unmapped_vocabulary, stats.duplicate_keys
        );
        let _ = writeln!(
            out,
            "  Matched: {} exact, {} fuzzy | Unmatched: {} sportsbook, {} exchange",
            stats.matched_exact,
            stats.matched_fuzzy,
            stats.unmatched_sportsbook,
            stats.unmatched_exchange
        );
        let _ = writeln!(
            out,
            "  Compared: {} incomplete, {} filtered, {} emitted",
            stats.incomplete_markets, stats.filtered_pairs, stats.opportunities_emitted
        );

        out
    }

    /// Emit the text report through the log
    pub fn log(&self, report: &ComparisonReport) {
        for line in self.render_text(report).lines() {
            info!("{}", line);
        }
    }

    pub fn render_json(&self, report: &ComparisonReport) -> Result<String> {
        let json = JsonReport {
            opportunities: report
                .opportunities
                .iter()
                .map(OpportunityRecord::from)
                .collect(),
            stats: &report.stats,
        };

        serde_json::to_string_pretty(&json).context("Failed to serialize report")
    }
}
