//! Candle stores: CSV tables on disk (`candles_{timeframe}.csv`) or memory.

use chrono::Datelike;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::provider::{DataError, PriceSeriesProvider};
use crate::domain::{Candle, Timeframe};

/// Sort ascending, drop duplicate timestamps, and drop candles that fail the
/// OHLC sanity check.
pub fn canonicalize(mut candles: Vec<Candle>) -> Vec<Candle> {
    let before = candles.len();
    candles.retain(Candle::is_sane);
    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);
    if candles.len() != before {
        tracing::debug!(
            dropped = before - candles.len(),
            kept = candles.len(),
            "dropped insane or duplicate candles"
        );
    }
    candles
}

/// One CSV file per timeframe with columns `timestamp,open,high,low,close,volume`.
#[derive(Debug, Clone)]
pub struct CsvCandleStore {
    dir: PathBuf,
}

impl CsvCandleStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, timeframe: &Timeframe) -> PathBuf {
        self.dir.join(format!("{}.csv", timeframe.table_name()))
    }

    /// Read and canonicalize an entire timeframe table.
    pub fn load_table(&self, timeframe: &Timeframe) -> Result<Vec<Candle>, DataError> {
        let path = self.path_for(timeframe);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&path).map_err(|e| DataError::MalformedCandles {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let candles = reader
            .deserialize::<Candle>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DataError::MalformedCandles {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(canonicalize(candles))
    }
}

impl PriceSeriesProvider for CsvCandleStore {
    fn name(&self) -> &str {
        "csv_tables"
    }

    fn candles_for_year(&self, timeframe: &Timeframe, year: i32) -> Result<Vec<Candle>, DataError> {
        let candles: Vec<Candle> = self
            .load_table(timeframe)?
            .into_iter()
            .filter(|c| c.timestamp.year() == year)
            .collect();
        if candles.is_empty() {
            return Err(DataError::MissingCandles {
                timeframe: timeframe.to_string(),
                year,
            });
        }
        Ok(candles)
    }
}

/// Candles held in memory, keyed by timeframe.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCandleStore {
    tables: BTreeMap<Timeframe, Vec<Candle>>,
}

impl InMemoryCandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, timeframe: Timeframe, candles: Vec<Candle>) {
        self.tables.insert(timeframe, canonicalize(candles));
    }

    pub fn with_table(mut self, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        self.insert(timeframe, candles);
        self
    }
}

impl PriceSeriesProvider for InMemoryCandleStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn candles_for_year(&self, timeframe: &Timeframe, year: i32) -> Result<Vec<Candle>, DataError> {
        let candles: Vec<Candle> = self
            .tables
            .get(timeframe)
            .map(|all| {
                all.iter()
                    .filter(|c| c.timestamp.year() == year)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if candles.is_empty() {
            return Err(DataError::MissingCandles {
                timeframe: timeframe.to_string(),
                year,
            });
        }
        Ok(candles)
    }
}
