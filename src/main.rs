use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use odds_signal::analysis::ComparisonEngine;
use odds_signal::api::{KalshiClient, SportsGameOddsClient};
use odds_signal::config::Config;
use odds_signal::db::OpportunityStore;
use odds_signal::matching::TeamResolver;
use odds_signal::workers::ComparisonWorker;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "odds_signal=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    let watch = has_flag(&args, "--watch");
    let no_store = has_flag(&args, "--no-store");
    let snapshot_flag = parse_value(&args, "--snapshot-dir").map(PathBuf::from);

    info!("Starting odds-signal");

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");

    let team_resolver = TeamResolver::load_or_default(&config.team_aliases_path)?;
    let engine = ComparisonEngine::new(config.comparison.clone(), team_resolver)?;
    info!(
        "Engine ready (materiality {:.3}, min match confidence {:.2}, devig exchange {})",
        config.comparison.materiality_threshold,
        config.comparison.min_match_confidence,
        config.comparison.devig_exchange
    );

    let store = if no_store {
        info!("Persistence disabled");
        None
    } else {
        Some(Arc::new(OpportunityStore::new(&config.database_url).await?))
    };

    // Initialize API clients
    let sportsbook_client = SportsGameOddsClient::new(
        &config.sportsgameodds_api_url,
        &config.sportsgameodds_api_key,
    )
    .with_bookmakers(config.sportsgameodds_bookmakers.clone());
    let exchange_client =
        KalshiClient::new(&config.kalshi_api_url, config.kalshi_api_token.clone());

    let worker = ComparisonWorker::new(
        sportsbook_client,
        exchange_client,
        engine,
        store,
        config.sportsgameodds_leagues.clone(),
        config.kalshi_series_tickers.clone(),
        config.comparison_interval,
    )
    .with_snapshot_dir(snapshot_flag.or_else(|| config.snapshot_dir.clone()));

    if !watch {
        worker.run_once().await?;
        return Ok(());
    }

    let handle = tokio::spawn(async move {
        worker.run().await;
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        result = handle => {
            error!("Comparison worker exited unexpectedly: {:?}", result);
        }
    }

    info!("Shutting down odds-signal");
    Ok(())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().skip(1).any(|arg| arg == flag)
}

/// Value following `flag`, if present
fn parse_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
