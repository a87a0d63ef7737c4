//! Evaluation configuration: one typed document, validated once at load.
//!
//! Loaded from `.toml` or `.json` (chosen by file extension). Everything a
//! sweep needs lives here: capital and costs, the year partition, the exit
//! parameterizations, the sizing policy and the selection rules.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sweeplab_core::data::DEFAULT_SIGNAL_PATTERN;
use sweeplab_core::domain::Timeframe;
use sweeplab_core::exits::max_hold_duration;
use sweeplab_core::{ExitPolicyConfig, FactoryError, PositionSizingConfig, SimulatorConfig};

/// Errors from loading or validating an [`EvaluationConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config '{}': {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
    #[error("unsupported config format '{}' (expected .toml or .json)", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("initial_capital must be positive, got {0}")]
    InvalidCapital(f64),
    #[error("fee_rate must be in [0, 1), got {0}")]
    InvalidFeeRate(f64),
    #[error("slippage must be in [0, 1), got {0}")]
    InvalidSlippage(f64),
    #[error("min_order_value must be non-negative, got {0}")]
    InvalidMinOrder(f64),
    #[error("max_hold_hours must be positive and representable as a duration, got {0}")]
    InvalidMaxHold(f64),
    #[error("years list is empty")]
    EmptyYears,
    #[error("duplicate year {0}")]
    DuplicateYear(i32),
    #[error("train_years is empty")]
    EmptyTrainYears,
    #[error("year {0} is not in the years list")]
    UnknownYear(i32),
    #[error("validation year {0} is also a training year")]
    ValidationInTraining(i32),
    #[error("no exit parameterizations configured")]
    NoParameterizations,
    #[error("invalid parameterization id {0:?}")]
    InvalidParameterizationId(String),
    #[error("duplicate parameterization id {0:?}")]
    DuplicateParameterization(String),
    #[error("exit parameterization {id:?}: {source}")]
    ExitPolicy {
        id: String,
        #[source]
        source: FactoryError,
    },
    #[error("position sizing: {0}")]
    Sizing(#[source] FactoryError),
    #[error("signal_file_pattern {0:?} must contain {{year}}")]
    InvalidSignalPattern(String),
    #[error("overfitting policy: {0}")]
    InvalidOverfitting(String),
}

/// Ranking metric for picking the best parameterization over training years.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMetric {
    #[default]
    Sharpe,
    Return,
}

/// Tolerance band for the train → validation comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverfittingPolicy {
    /// Validation return must reach this share of the training average return.
    pub return_ratio_floor: f64,
    /// Validation win rate may trail the training average by at most this many points.
    pub win_rate_tolerance_pp: f64,
}

impl Default for OverfittingPolicy {
    fn default() -> Self {
        Self {
            return_ratio_floor: 0.8,
            win_rate_tolerance_pp: 15.0,
        }
    }
}

/// One named exit policy in the sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitParameterization {
    pub id: String,
    pub policy: ExitPolicyConfig,
}

impl ExitParameterization {
    pub fn new(id: impl Into<String>, policy: ExitPolicyConfig) -> Self {
        Self {
            id: id.into(),
            policy,
        }
    }
}

fn default_max_hold_hours() -> f64 {
    720.0
}

fn default_signal_pattern() -> String {
    DEFAULT_SIGNAL_PATTERN.to_string()
}

fn default_true() -> bool {
    true
}

/// Full sweep + selection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub initial_capital: f64,
    pub fee_rate: f64,
    #[serde(default)]
    pub slippage: f64,
    pub years: Vec<i32>,
    pub exit_parameterizations: Vec<ExitParameterization>,
    #[serde(default)]
    pub position_sizing: PositionSizingConfig,
    pub train_years: Vec<i32>,
    pub validation_year: i32,

    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default)]
    pub min_order_value: f64,
    /// Timeout appended to every parameterization that has none.
    #[serde(default = "default_max_hold_hours")]
    pub max_hold_hours: f64,
    #[serde(default = "default_signal_pattern")]
    pub signal_file_pattern: String,
    #[serde(default)]
    pub selection_metric: SelectionMetric,
    #[serde(default)]
    pub overfitting: OverfittingPolicy,
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl EvaluationConfig {
    /// Load and validate a `.toml` or `.json` config.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_err = |reason: String| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        };
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?
            }
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no sweep could run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(ConfigError::InvalidCapital(self.initial_capital));
        }
        if !(self.fee_rate.is_finite() && (0.0..1.0).contains(&self.fee_rate)) {
            return Err(ConfigError::InvalidFeeRate(self.fee_rate));
        }
        if !(self.slippage.is_finite() && (0.0..1.0).contains(&self.slippage)) {
            return Err(ConfigError::InvalidSlippage(self.slippage));
        }
        if !(self.min_order_value.is_finite() && self.min_order_value >= 0.0) {
            return Err(ConfigError::InvalidMinOrder(self.min_order_value));
        }
        if max_hold_duration(self.max_hold_hours).is_none() {
            return Err(ConfigError::InvalidMaxHold(self.max_hold_hours));
        }

        if self.years.is_empty() {
            return Err(ConfigError::EmptyYears);
        }
        let mut years = BTreeSet::new();
        for &year in &self.years {
            if !years.insert(year) {
                return Err(ConfigError::DuplicateYear(year));
            }
        }
        if self.train_years.is_empty() {
            return Err(ConfigError::EmptyTrainYears);
        }
        for &year in &self.train_years {
            if !years.contains(&year) {
                return Err(ConfigError::UnknownYear(year));
            }
        }
        if !years.contains(&self.validation_year) {
            return Err(ConfigError::UnknownYear(self.validation_year));
        }
        if self.train_years.contains(&self.validation_year) {
            return Err(ConfigError::ValidationInTraining(self.validation_year));
        }

        if self.exit_parameterizations.is_empty() {
            return Err(ConfigError::NoParameterizations);
        }
        let mut ids = BTreeSet::new();
        for param in &self.exit_parameterizations {
            let id = param.id.trim();
            if id.is_empty() || id != param.id || id.contains(char::is_whitespace) {
                return Err(ConfigError::InvalidParameterizationId(param.id.clone()));
            }
            if !ids.insert(id) {
                return Err(ConfigError::DuplicateParameterization(param.id.clone()));
            }
            param
                .policy
                .validate()
                .map_err(|source| ConfigError::ExitPolicy {
                    id: param.id.clone(),
                    source,
                })?;
        }
        self.position_sizing
            .validate()
            .map_err(ConfigError::Sizing)?;

        if !self.signal_file_pattern.contains("{year}") {
            return Err(ConfigError::InvalidSignalPattern(
                self.signal_file_pattern.clone(),
            ));
        }
        let floor = self.overfitting.return_ratio_floor;
        let tolerance = self.overfitting.win_rate_tolerance_pp;
        if !floor.is_finite() || !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigError::InvalidOverfitting(format!(
                "return_ratio_floor {floor}, win_rate_tolerance_pp {tolerance}"
            )));
        }
        Ok(())
    }

    pub fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            initial_capital: self.initial_capital,
            fee_rate: self.fee_rate,
            slippage: self.slippage,
            min_order_value: self.min_order_value,
        }
    }

    pub fn parameterization_ids(&self) -> Vec<String> {
        self.exit_parameterizations
            .iter()
            .map(|p| p.id.clone())
            .collect()
    }

    /// BLAKE3 hex digest of the canonical JSON form of this config.
    pub fn config_hash(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}
