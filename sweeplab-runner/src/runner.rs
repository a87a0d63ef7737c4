//! Evaluation runner: wires loading, sweep, selection and the report together.
//!
//! Two entry points:
//! - `run_evaluation()`: opens the on-disk signal and candle stores. Used by the CLI.
//! - `evaluate_with()`: takes any providers. Used by tests and benches.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use sweeplab_core::data::{
    CsvCandleStore, DataError, JsonSignalRepository, PriceSeriesProvider, SignalRepository,
};

use crate::config::{ConfigError, EvaluationConfig};
use crate::report::EvaluationReport;
use crate::selector::{SelectionError, TrainValidationSelector};
use crate::sweep::{SweepError, SweepRunner};

/// Errors from a full evaluation run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("sweep error: {0}")]
    Sweep(#[from] SweepError),
    #[error("selection error: {0}")]
    Selection(#[from] SelectionError),
}

/// Sweep and select over any signal/candle providers.
pub fn evaluate_with(
    config: &EvaluationConfig,
    signals: &dyn SignalRepository,
    candles: &dyn PriceSeriesProvider,
) -> Result<EvaluationReport, RunError> {
    let runner = SweepRunner::new(config.clone())?;
    info!(
        years = config.years.len(),
        parameterizations = config.exit_parameterizations.len(),
        sizing = config.position_sizing.kind(),
        signals = signals.name(),
        candles = candles.name(),
        "starting sweep"
    );
    let matrix = runner.run(signals, candles)?;
    let outcome = TrainValidationSelector::from_config(config).select(&matrix)?;
    Ok(EvaluationReport::new(
        matrix,
        outcome,
        config.selection_metric,
        config.config_hash(),
    ))
}

/// Sweep and select over the signal directory and candle directory on disk.
///
/// An unreadable signal directory is fatal; missing per-year files are not.
pub fn run_evaluation(
    config: &EvaluationConfig,
    signals_dir: &Path,
    candles_dir: &Path,
) -> Result<EvaluationReport, RunError> {
    let signals = JsonSignalRepository::open(signals_dir, &config.signal_file_pattern)?;
    let candles = CsvCandleStore::new(candles_dir);
    evaluate_with(config, &signals, &candles)
}
