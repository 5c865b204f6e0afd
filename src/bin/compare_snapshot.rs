use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use odds_signal::analysis::ComparisonEngine;
use odds_signal::config::ComparisonConfig;
use odds_signal::matching::TeamResolver;
use odds_signal::report::ReportAssembler;
use odds_signal::snapshot::{self, load_quotes};

const DEFAULT_ALIASES_PATH: &str = "data/team_aliases.json";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "compare_snapshot=info,odds_signal=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Parse arguments
    let args: Vec<String> = env::args().collect();
    let aliases_path = parse_value(&args, "--aliases").unwrap_or(DEFAULT_ALIASES_PATH);
    let as_json = has_flag(&args, "--json");

    let mut config =
        ComparisonConfig::default().with_devig_exchange(has_flag(&args, "--devig-exchange"));
    if let Some(threshold) = parse_number(&args, "--threshold")? {
        config = config.with_materiality_threshold(threshold);
    }
    if let Some(confidence) = parse_number(&args, "--min-confidence")? {
        config = config.with_min_match_confidence(confidence);
    }

    let (sportsbook, exchange) = match parse_value(&args, "--snapshot") {
        Some(dir) => snapshot::load_snapshot(Path::new(dir))?,
        None => {
            let sportsbook_path = parse_value(&args, "--sportsbook")
                .map(PathBuf::from)
                .context("--snapshot <dir> or --sportsbook <file> is required")?;
            let exchange_path = parse_value(&args, "--exchange")
                .map(PathBuf::from)
                .context("--snapshot <dir> or --exchange <file> is required")?;
            (load_quotes(&sportsbook_path)?, load_quotes(&exchange_path)?)
        }
    };
    info!(
        "Loaded {} sportsbook and {} exchange quotes",
        sportsbook.len(),
        exchange.len()
    );

    // Replays are judged at the time the snapshot was taken, not at wall-clock time
    let as_of = match parse_value(&args, "--as-of") {
        Some(value) => DateTime::parse_from_rfc3339(value)
            .with_context(|| format!("Invalid --as-of {}", value))?
            .with_timezone(&Utc),
        None => snapshot::newest_timestamp(&sportsbook, &exchange).unwrap_or_else(Utc::now),
    };
    info!("Comparing as of {}", as_of.to_rfc3339());

    let resolver = TeamResolver::load_or_default(Path::new(aliases_path))?;
    let engine = ComparisonEngine::new(config, resolver)?;
    let report = engine.run(&sportsbook, &exchange, as_of);

    let assembler = ReportAssembler::new();
    if as_json {
        println!("{}", assembler.render_json(&report)?);
    } else {
        print!("{}", assembler.render_text(&report));
    }

    Ok(())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().skip(1).any(|arg| arg == flag)
}

fn parse_number(args: &[String], flag: &str) -> Result<Option<f64>> {
    parse_value(args, flag)
        .map(|value| {
            value
                .parse()
                .with_context(|| format!("Invalid {} {}", flag, value))
        })
        .transpose()
}

/// Value following `flag`, if present
fn parse_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("compare_snapshot")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_flags_and_values() {
        let args = args(&[
            "--snapshot",
            "data/snapshots/20240309T143000Z",
            "--min-confidence",
            "0.9",
            "--devig-exchange",
        ]);

        assert_eq!(
            parse_value(&args, "--snapshot"),
            Some("data/snapshots/20240309T143000Z")
        );
        assert!(has_flag(&args, "--devig-exchange"));
        assert!(!has_flag(&args, "--json"));
        assert_eq!(parse_number(&args, "--min-confidence").unwrap(), Some(0.9));
        assert_eq!(parse_number(&args, "--threshold").unwrap(), None);
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let args = args(&["--threshold", "lots"]);
        assert!(parse_number(&args, "--threshold").is_err());
    }
}
