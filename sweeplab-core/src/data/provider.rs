//! Read-only data access traits and structured error types.
//!
//! `SignalRepository` and `PriceSeriesProvider` abstract over where signals and
//! candles live (JSON files and CSV tables on disk, or memory in tests) so the
//! sweep runner never touches a concrete store.

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::{Candle, SignalFile, Timeframe};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("signal directory '{}' is not readable: {reason}", path.display())]
    UnreadableDirectory { path: PathBuf, reason: String },

    #[error("no signal file for year {year} ({})", path.display())]
    MissingSignals { year: i32, path: PathBuf },

    #[error("no {timeframe} candles for year {year}")]
    MissingCandles { timeframe: String, year: i32 },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed signal file '{}': {reason}", path.display())]
    MalformedSignals { path: PathBuf, reason: String },

    #[error("malformed candle table '{}': {reason}", path.display())]
    MalformedCandles { path: PathBuf, reason: String },
}

impl DataError {
    /// True when the error only means "nothing stored for this key".
    ///
    /// The sweep runner treats these as gaps in the matrix rather than failures.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            DataError::MissingSignals { .. } | DataError::MissingCandles { .. }
        )
    }
}

/// Read-only access to per-year signal files.
pub trait SignalRepository: Send + Sync {
    /// Human-readable name of this repository.
    fn name(&self) -> &str;

    /// Load the signal file for one calendar year.
    fn load_year(&self, year: i32) -> Result<SignalFile, DataError>;
}

/// Read-only access to per-timeframe candle series.
pub trait PriceSeriesProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Candles for one calendar year, ascending by timestamp.
    ///
    /// Returns `DataError::MissingCandles` when the year has no candles.
    fn candles_for_year(&self, timeframe: &Timeframe, year: i32) -> Result<Vec<Candle>, DataError>;
}
