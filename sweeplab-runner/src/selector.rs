//! Train/validation selection over a finished sweep matrix.
//!
//! The best parameterization is the one with the highest mean training-year
//! metric; it is then replayed against the held-out validation year and judged
//! against the overfitting band and the buy-and-hold floor.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use sweeplab_core::metrics::mean_f64;
use sweeplab_core::SweepResult;

use crate::config::{EvaluationConfig, OverfittingPolicy, SelectionMetric};
use crate::sweep::SweepMatrix;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error("no parameterization has any training-year result")]
    NoEligibleParameterization,
}

/// Mean metrics over the training years a parameterization has cells for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingAverage {
    pub avg_sharpe: f64,
    pub avg_return_pct: f64,
    pub avg_trades: f64,
    pub avg_win_rate: f64,
    pub years_used: Vec<i32>,
}

impl TrainingAverage {
    /// `None` when none of `years` has a cell for this parameterization.
    pub fn compute(matrix: &SweepMatrix, parameterization_id: &str, years: &[i32]) -> Option<Self> {
        let cells: Vec<(i32, &SweepResult)> = years
            .iter()
            .filter_map(|&y| matrix.get(y, parameterization_id).map(|r| (y, r)))
            .collect();
        if cells.is_empty() {
            return None;
        }
        let collect = |f: fn(&SweepResult) -> f64| -> Vec<f64> {
            cells.iter().map(|(_, r)| f(r)).collect()
        };
        Some(Self {
            avg_sharpe: mean_f64(&collect(|r| r.sharpe_ratio)),
            avg_return_pct: mean_f64(&collect(|r| r.total_return_pct)),
            avg_trades: mean_f64(&collect(|r| r.trade_count as f64)),
            avg_win_rate: mean_f64(&collect(|r| r.win_rate)),
            years_used: cells.iter().map(|(y, _)| *y).collect(),
        })
    }

    pub fn score(&self, metric: SelectionMetric) -> f64 {
        match metric {
            SelectionMetric::Sharpe => self.avg_sharpe,
            SelectionMetric::Return => self.avg_return_pct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverfittingVerdict {
    Passed,
    OverfittingSuspected,
    NoValidationData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Deploy,
    Optimize,
    Discard,
}

/// A training-eligible parameterization and its averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedParameterization {
    pub id: String,
    pub score: f64,
    pub training_avg: TrainingAverage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub year: i32,
    pub result: Option<SweepResult>,
    pub degradation_pct: Option<f64>,
    pub verdict: OverfittingVerdict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionOutcome {
    pub best_period: String,
    pub training_avg: TrainingAverage,
    /// Eligible parameterizations, best first; ties keep config order.
    pub ranking: Vec<RankedParameterization>,
    pub validation: ValidationOutcome,
    pub recommendation: Recommendation,
}

/// `(train − validation) / train × 100`, absent when the training average is zero.
pub fn degradation_pct(training_avg_return: f64, validation_return: f64) -> Option<f64> {
    if training_avg_return == 0.0 {
        return None;
    }
    Some((training_avg_return - validation_return) / training_avg_return * 100.0)
}

/// Overfitting band check on return and win rate.
pub fn overfitting_verdict(
    policy: &OverfittingPolicy,
    training: &TrainingAverage,
    validation: &SweepResult,
) -> OverfittingVerdict {
    let return_short =
        validation.total_return_pct < training.avg_return_pct * policy.return_ratio_floor;
    let win_rate_short =
        validation.win_rate < training.avg_win_rate - policy.win_rate_tolerance_pp;
    if return_short || win_rate_short {
        OverfittingVerdict::OverfittingSuspected
    } else {
        OverfittingVerdict::Passed
    }
}

/// Picks the best training parameterization and judges it on validation.
#[derive(Debug, Clone)]
pub struct TrainValidationSelector {
    train_years: Vec<i32>,
    validation_year: i32,
    metric: SelectionMetric,
    policy: OverfittingPolicy,
    /// Parameterization ids in config order.
    order: Vec<String>,
}

impl TrainValidationSelector {
    pub fn new(
        train_years: Vec<i32>,
        validation_year: i32,
        order: Vec<String>,
    ) -> Self {
        Self {
            train_years,
            validation_year,
            metric: SelectionMetric::default(),
            policy: OverfittingPolicy::default(),
            order,
        }
    }

    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self::new(
            config.train_years.clone(),
            config.validation_year,
            config.parameterization_ids(),
        )
        .with_metric(config.selection_metric)
        .with_overfitting(config.overfitting)
    }

    pub fn with_metric(mut self, metric: SelectionMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_overfitting(mut self, policy: OverfittingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Eligible parameterizations ordered by descending score.
    pub fn rank(&self, matrix: &SweepMatrix) -> Vec<RankedParameterization> {
        let mut ranked: Vec<RankedParameterization> = self
            .order
            .iter()
            .filter_map(|id| {
                let avg = TrainingAverage::compute(matrix, id, &self.train_years)?;
                Some(RankedParameterization {
                    id: id.clone(),
                    score: avg.score(self.metric),
                    training_avg: avg,
                })
            })
            .collect();
        // Stable sort keeps config order among equal scores
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    pub fn select(&self, matrix: &SweepMatrix) -> Result<SelectionOutcome, SelectionError> {
        let ranking = self.rank(matrix);
        let best = ranking
            .first()
            .cloned()
            .ok_or(SelectionError::NoEligibleParameterization)?;

        let validation_result = matrix.get(self.validation_year, &best.id).cloned();
        let validation = match &validation_result {
            Some(result) => ValidationOutcome {
                year: self.validation_year,
                degradation_pct: degradation_pct(
                    best.training_avg.avg_return_pct,
                    result.total_return_pct,
                ),
                verdict: overfitting_verdict(&self.policy, &best.training_avg, result),
                result: validation_result.clone(),
            },
            None => {
                warn!(
                    year = self.validation_year,
                    parameterization = %best.id,
                    "no validation result for best parameterization"
                );
                ValidationOutcome {
                    year: self.validation_year,
                    result: None,
                    degradation_pct: None,
                    verdict: OverfittingVerdict::NoValidationData,
                }
            }
        };

        let recommendation = self.recommend(matrix, &best.training_avg, &validation);
        info!(
            best = %best.id,
            score = best.score,
            verdict = ?validation.verdict,
            recommendation = ?recommendation,
            "selection complete"
        );

        Ok(SelectionOutcome {
            best_period: best.id,
            training_avg: best.training_avg,
            ranking,
            validation,
            recommendation,
        })
    }

    /// Whether the strategy beats buy-and-hold in both phases; missing benchmarks count as 0.
    fn beats_benchmark(
        &self,
        matrix: &SweepMatrix,
        training: &TrainingAverage,
        validation_return: f64,
    ) -> bool {
        let validation_bh = matrix.benchmark(self.validation_year).unwrap_or(0.0);
        let training_bh: Vec<f64> = self
            .train_years
            .iter()
            .map(|&y| matrix.benchmark(y).unwrap_or(0.0))
            .collect();
        validation_return > validation_bh && training.avg_return_pct > mean_f64(&training_bh)
    }

    fn recommend(
        &self,
        matrix: &SweepMatrix,
        training: &TrainingAverage,
        validation: &ValidationOutcome,
    ) -> Recommendation {
        let Some(result) = &validation.result else {
            return Recommendation::Discard;
        };
        match validation.verdict {
            OverfittingVerdict::Passed => {
                if self.beats_benchmark(matrix, training, result.total_return_pct) {
                    Recommendation::Deploy
                } else {
                    Recommendation::Optimize
                }
            }
            OverfittingVerdict::OverfittingSuspected if result.total_return_pct > 0.0 => {
                Recommendation::Optimize
            }
            _ => Recommendation::Discard,
        }
    }
}
