//! CSV candle storage for backtests
//!
//! Plain `timestamp,open,high,low,close,volume` rows with the timestamp in
//! milliseconds since the Unix epoch. Files are re-sorted on load so
//! exported data from any source replays in chronological order.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::types::Candle;

/// Load candles from a CSV file, sorted chronologically
pub fn load_candles(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open candle file: {}", path.display()))?;

    let mut candles = Vec::new();
    for record in reader.deserialize() {
        let candle: Candle = record.context("Failed to parse candle row")?;
        candles.push(candle);
    }
    candles.sort_by_key(|c| c.timestamp);

    info!("Loaded {} candles from {}", candles.len(), path.display());
    Ok(candles)
}

/// Write candles to a CSV file with a header row
pub fn save_candles(path: impl AsRef<Path>, candles: &[Candle]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create candle file: {}", path.display()))?;
    for candle in candles {
        writer.serialize(candle)?;
    }
    writer.flush()?;

    info!("Saved {} candles to {}", candles.len(), path.display());
    Ok(())
}
