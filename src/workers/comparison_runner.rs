use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::time;
use tracing::{error, info, warn};

use crate::analysis::ComparisonEngine;
use crate::api::{KalshiClient, SportsGameOddsClient};
use crate::db::OpportunityStore;
use crate::models::ComparisonReport;
use crate::report::ReportAssembler;
use crate::snapshot;

/// Worker that collects both sources and runs a comparison, once or on an interval
pub struct ComparisonWorker {
    sportsbook_client: SportsGameOddsClient,
    exchange_client: KalshiClient,
    engine: ComparisonEngine,
    store: Option<Arc<OpportunityStore>>,
    leagues: Vec<String>,
    series_tickers: Vec<String>,
    interval: Duration,
    snapshot_dir: Option<PathBuf>,
    assembler: ReportAssembler,
}

impl ComparisonWorker {
    /// Create a new comparison worker
    pub fn new(
        sportsbook_client: SportsGameOddsClient,
        exchange_client: KalshiClient,
        engine: ComparisonEngine,
        store: Option<Arc<OpportunityStore>>,
        leagues: Vec<String>,
        series_tickers: Vec<String>,
        interval_secs: u64,
    ) -> Self {
        Self {
            sportsbook_client,
            exchange_client,
            engine,
            store,
            leagues,
            series_tickers,
            interval: Duration::from_secs(interval_secs),
            snapshot_dir: None,
            assembler: ReportAssembler::new(),
        }
    }

    /// Write each run's collected quotes under `dir`
    pub fn with_snapshot_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.snapshot_dir = dir;
        self
    }

    /// Run the worker loop
    pub async fn run(&self) {
        info!("Comparison worker started (interval: {:?})", self.interval);

        let mut interval = time::interval(self.interval);

        loop {
            interval.tick().await;

            if let Err(e) = self.run_once().await {
                error!("Comparison run failed: {:#}", e);
                warn!("Will retry on next interval");
            }
        }
    }

    /// Collect both sources, compare, log the report and store it
    pub async fn run_once(&self) -> Result<ComparisonReport> {
        info!("Collecting sportsbook and exchange quotes...");

        let (sportsbook, exchange) = tokio::join!(
            self.sportsbook_client.fetch_quotes(&self.leagues),
            self.exchange_client.fetch_quotes(&self.series_tickers),
        );
        let sportsbook = sportsbook.context("Sportsbook collection failed")?;
        let exchange = exchange.context("Exchange collection failed")?;

        let as_of = Utc::now();

        if let Some(root) = &self.snapshot_dir {
            let dir = snapshot::run_dir(root, as_of);
            match snapshot::write_snapshot(&dir, &sportsbook, &exchange) {
                Ok(()) => info!("Saved quote snapshot to {}", dir.display()),
                Err(e) => warn!("Failed to save quote snapshot: {:#}", e),
            }
        }

        let report = self.engine.run(&sportsbook, &exchange, as_of);

        self.assembler.log(&report);

        if let Some(store) = &self.store {
            let run_id = store.insert_run(as_of, &report).await?;
            info!(
                "Stored run {} with {} opportunities",
                run_id,
                report.opportunities.len()
            );
        }

        Ok(report)
    }
}
