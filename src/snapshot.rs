//! Quote snapshots on disk: one JSON array per source in a run directory.
//!
//! The collector writes them after each live fetch; `compare_snapshot`
//! reads them back for offline runs.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::OddsQuote;

pub const SPORTSBOOK_FILE: &str = "sportsbook.json";
pub const EXCHANGE_FILE: &str = "exchange.json";

/// Directory for the snapshot of a run taken at `as_of`, under `root`
pub fn run_dir(root: &Path, as_of: DateTime<Utc>) -> PathBuf {
    root.join(as_of.format("%Y%m%dT%H%M%SZ").to_string())
}

/// Write both quote sets into `dir`, creating it if needed
pub fn write_snapshot(
    dir: &Path,
    sportsbook: &[OddsQuote],
    exchange: &[OddsQuote],
) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create snapshot directory {}", dir.display()))?;

    write_quotes(&dir.join(SPORTSBOOK_FILE), sportsbook)?;
    write_quotes(&dir.join(EXCHANGE_FILE), exchange)?;

    debug!(
        path = %dir.display(),
        sportsbook = sportsbook.len(),
        exchange = exchange.len(),
        "Wrote quote snapshot"
    );
    Ok(())
}

fn write_quotes(path: &Path, quotes: &[OddsQuote]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, quotes)
        .with_context(|| format!("Failed to write quotes to {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))
}

/// Read a JSON array of quotes
pub fn load_quotes(path: &Path) -> Result<Vec<OddsQuote>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse quotes in {}", path.display()))
}

/// Read both quote sets from a snapshot directory
pub fn load_snapshot(dir: &Path) -> Result<(Vec<OddsQuote>, Vec<OddsQuote>)> {
    Ok((
        load_quotes(&dir.join(SPORTSBOOK_FILE))?,
        load_quotes(&dir.join(EXCHANGE_FILE))?,
    ))
}

/// Latest quote timestamp across both sources
pub fn newest_timestamp(
    sportsbook: &[OddsQuote],
    exchange: &[OddsQuote],
) -> Option<DateTime<Utc>> {
    sportsbook
        .iter()
        .chain(exchange)
        .map(|quote| quote.timestamp)
        .max()
}
