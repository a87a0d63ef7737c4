//! Per-year input loading for the sweep.
//!
//! Every configured year's signals and candles are read once, up front, and
//! shared immutably by that year's cells. A year whose signals or candles are
//! missing (or unreadable) becomes a gap: it is logged and left out, and the
//! sweep carries on with the remaining years.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use sweeplab_core::data::{DataError, PriceSeriesProvider, SignalRepository};
use sweeplab_core::domain::{Candle, Signal, Timeframe};

/// Everything one year's cells need.
#[derive(Debug, Clone)]
pub struct YearInputs {
    pub year: i32,
    /// Strategy named in the signal file metadata.
    pub strategy: String,
    /// Buy signals, sorted and de-duplicated by timestamp.
    pub signals: Vec<Signal>,
    /// Canonical candles for the year, sorted by timestamp.
    pub candles: Vec<Candle>,
}

impl YearInputs {
    /// Buy-and-hold return over the year in percent: first open to last close.
    pub fn buy_and_hold_pct(&self) -> Option<f64> {
        buy_and_hold_pct(&self.candles)
    }
}

/// Buy-and-hold return in percent from the first open to the last close.
pub fn buy_and_hold_pct(candles: &[Candle]) -> Option<f64> {
    let first = candles.first()?;
    let last = candles.last()?;
    if first.open <= 0.0 || first.open.is_nan() {
        return None;
    }
    Some((last.close - first.open) / first.open * 100.0)
}

/// Loaded years plus the reasons any year was left out.
#[derive(Debug, Clone, Default)]
pub struct LoadedInputs {
    pub years: BTreeMap<i32, YearInputs>,
    pub gaps: BTreeMap<i32, String>,
}

impl LoadedInputs {
    pub fn get(&self, year: i32) -> Option<&YearInputs> {
        self.years.get(&year)
    }

    /// BLAKE3 over every loaded signal and candle, in year order.
    pub fn dataset_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (year, inputs) in &self.years {
            hasher.update(&year.to_le_bytes());
            for s in &inputs.signals {
                hasher.update(&s.timestamp.and_utc().timestamp().to_le_bytes());
                hasher.update(&s.price.to_le_bytes());
                hasher.update(&s.confidence.to_le_bytes());
            }
            for c in &inputs.candles {
                hasher.update(&c.timestamp.and_utc().timestamp().to_le_bytes());
                for v in [c.open, c.high, c.low, c.close, c.volume] {
                    hasher.update(&v.to_le_bytes());
                }
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

fn load_year(
    signals: &dyn SignalRepository,
    candles: &dyn PriceSeriesProvider,
    timeframe: &Timeframe,
    year: i32,
) -> Result<YearInputs, DataError> {
    let file = signals.load_year(year)?;
    let series = candles.candles_for_year(timeframe, year)?;
    Ok(YearInputs {
        year,
        strategy: file.metadata.strategy.clone(),
        signals: file.normalized_buys(),
        candles: series,
    })
}

/// Load every year in `years`; missing or malformed years become gaps.
pub fn load_inputs(
    signals: &dyn SignalRepository,
    candles: &dyn PriceSeriesProvider,
    timeframe: &Timeframe,
    years: &[i32],
) -> LoadedInputs {
    let mut loaded = LoadedInputs::default();
    for &year in years {
        match load_year(signals, candles, timeframe, year) {
            Ok(inputs) => {
                debug!(
                    year,
                    signals = inputs.signals.len(),
                    candles = inputs.candles.len(),
                    "loaded year inputs"
                );
                loaded.years.insert(year, inputs);
            }
            Err(e) => {
                if e.is_missing() {
                    warn!(year, error = %e, "missing input, year skipped");
                } else {
                    warn!(year, error = %e, "unreadable input, year skipped");
                }
                loaded.gaps.insert(year, e.to_string());
            }
        }
    }
    loaded
}
