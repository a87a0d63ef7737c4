//! SweepLab Runner: combination sweeps, train/validation selection, reports.
//!
//! This crate builds on `sweeplab-core` to provide:
//! - Typed evaluation config loaded from TOML or JSON
//! - Per-year input loading with gap tolerance
//! - The {years} × {exit parameterizations} sweep, serial or on rayon
//! - Train/validation selection with an overfitting check
//! - JSON, CSV and Markdown report artifacts
//! - Tracing subscriber setup for binaries

pub mod config;
pub mod data_loader;
pub mod logging;
pub mod report;
pub mod runner;
pub mod selector;
pub mod sweep;

pub use config::{
    ConfigError, EvaluationConfig, ExitParameterization, OverfittingPolicy, SelectionMetric,
};
pub use data_loader::{buy_and_hold_pct, load_inputs, LoadedInputs, YearInputs};
pub use logging::init_tracing;
pub use report::{save_artifacts, EvaluationReport, SCHEMA_VERSION};
pub use runner::{evaluate_with, run_evaluation, RunError};
pub use selector::{
    OverfittingVerdict, Recommendation, SelectionError, SelectionOutcome,
    TrainValidationSelector, TrainingAverage,
};
pub use sweep::{cell_key, CellResult, SweepError, SweepMatrix, SweepRunner};
