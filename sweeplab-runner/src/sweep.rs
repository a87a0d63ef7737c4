//! Combination sweep: {years} × {exit parameterizations} under one sizing policy.
//!
//! Each cell builds fresh policies, runs one simulator pass over its year's
//! inputs and records one [`SweepResult`] under `"{year}_{parameterization_id}"`.
//! Cells share only immutable inputs, so serial and parallel runs agree exactly.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use sweeplab_core::data::{PriceSeriesProvider, SignalRepository};
use sweeplab_core::{create_exit_policy, create_sizer, FactoryError, SweepResult, TradeSimulator};

use crate::config::{ConfigError, EvaluationConfig, ExitParameterization};
use crate::data_loader::{load_inputs, LoadedInputs, YearInputs};

#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("parameterization {id:?}: {source}")]
    Factory {
        id: String,
        #[source]
        source: FactoryError,
    },
}

/// Matrix key for one (year, parameterization) cell.
pub fn cell_key(year: i32, parameterization_id: &str) -> String {
    format!("{year}_{parameterization_id}")
}

/// One finished cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellResult {
    pub year: i32,
    pub parameterization_id: String,
    pub result: SweepResult,
}

impl CellResult {
    pub fn key(&self) -> String {
        cell_key(self.year, &self.parameterization_id)
    }
}

/// Every cell result of a sweep, plus what could not be run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepMatrix {
    pub cells: BTreeMap<String, SweepResult>,
    /// Buy-and-hold return per loaded year, in percent.
    pub benchmarks: BTreeMap<i32, f64>,
    /// Keys of cells absent for lack of input.
    pub missing: Vec<String>,
    pub dataset_hash: String,
}

impl SweepMatrix {
    pub fn get(&self, year: i32, parameterization_id: &str) -> Option<&SweepResult> {
        self.cells.get(&cell_key(year, parameterization_id))
    }

    pub fn benchmark(&self, year: i32) -> Option<f64> {
        self.benchmarks.get(&year).copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Runs the combination sweep described by an [`EvaluationConfig`].
pub struct SweepRunner {
    config: EvaluationConfig,
    parallel: bool,
}

impl SweepRunner {
    /// Validates the config; parallelism follows `config.parallel`.
    pub fn new(config: EvaluationConfig) -> Result<Self, SweepError> {
        config.validate()?;
        let parallel = config.parallel;
        Ok(Self { config, parallel })
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Load every year's inputs, then run all cells.
    pub fn run(
        &self,
        signals: &dyn SignalRepository,
        candles: &dyn PriceSeriesProvider,
    ) -> Result<SweepMatrix, SweepError> {
        self.run_with_progress(signals, candles, |_, _, _| {})
    }

    /// Like [`run`](Self::run), invoking `progress(done, total, cell)` as cells finish.
    ///
    /// `done` counts finished cells: each value in `1..=total` is passed exactly
    /// once. Under rayon the calls may arrive out of order.
    pub fn run_with_progress<F>(
        &self,
        signals: &dyn SignalRepository,
        candles: &dyn PriceSeriesProvider,
        progress: F,
    ) -> Result<SweepMatrix, SweepError>
    where
        F: Fn(usize, usize, &CellResult) + Send + Sync,
    {
        let inputs = load_inputs(signals, candles, &self.config.timeframe, &self.config.years);
        self.run_loaded(&inputs, progress)
    }

    /// Run all cells over already-loaded inputs.
    pub fn run_loaded<F>(&self, inputs: &LoadedInputs, progress: F) -> Result<SweepMatrix, SweepError>
    where
        F: Fn(usize, usize, &CellResult) + Send + Sync,
    {
        let mut matrix = SweepMatrix {
            dataset_hash: inputs.dataset_hash(),
            ..SweepMatrix::default()
        };

        let mut work: Vec<(&YearInputs, &ExitParameterization)> = Vec::new();
        for &year in &self.config.years {
            match inputs.get(year) {
                Some(year_inputs) => {
                    if let Some(bh) = year_inputs.buy_and_hold_pct() {
                        matrix.benchmarks.insert(year, bh);
                    }
                    for param in &self.config.exit_parameterizations {
                        work.push((year_inputs, param));
                    }
                }
                None => {
                    for param in &self.config.exit_parameterizations {
                        let key = cell_key(year, &param.id);
                        warn!(cell = %key, "no input for cell, left absent");
                        matrix.missing.push(key);
                    }
                }
            }
        }

        let total = work.len();
        let completed = AtomicUsize::new(0);
        let run = |(year_inputs, param): &(&YearInputs, &ExitParameterization)|
         -> Result<CellResult, SweepError> {
            let cell = self.run_cell(year_inputs, param)?;
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            progress(done, total, &cell);
            Ok(cell)
        };

        let cells: Vec<CellResult> = if self.parallel {
            work.par_iter()
                .map(run)
                .collect::<Result<Vec<_>, SweepError>>()?
        } else {
            work.iter().map(run).collect::<Result<Vec<_>, SweepError>>()?
        };

        for cell in cells {
            matrix.cells.insert(cell.key(), cell.result);
        }

        info!(
            cells = matrix.cells.len(),
            missing = matrix.missing.len(),
            parallel = self.parallel,
            "sweep complete"
        );
        Ok(matrix)
    }

    /// Run one cell with freshly built policies.
    pub fn run_cell(
        &self,
        inputs: &YearInputs,
        param: &ExitParameterization,
    ) -> Result<CellResult, SweepError> {
        let exit = create_exit_policy(&param.policy, Some(self.config.max_hold_hours)).map_err(
            |source| SweepError::Factory {
                id: param.id.clone(),
                source,
            },
        )?;
        let sizer = create_sizer(&self.config.position_sizing).map_err(|source| {
            SweepError::Factory {
                id: param.id.clone(),
                source,
            }
        })?;

        let mut simulator = TradeSimulator::new(self.config.simulator_config(), sizer, exit);
        let report = simulator.run(&inputs.signals, &inputs.candles);
        let result = SweepResult::evaluate(&report.trades, self.config.initial_capital);
        debug!(
            year = inputs.year,
            parameterization = %param.id,
            entries = report.entries,
            skipped = report.skipped_signals,
            trades = result.trade_count,
            total_return_pct = result.total_return_pct,
            "cell finished"
        );

        Ok(CellResult {
            year: inputs.year,
            parameterization_id: param.id.clone(),
            result,
        })
    }
}
