//! Factory system: converts typed policy configs into runtime trait objects.
//!
//! Configs are serde tagged enums so a TOML/JSON file fully describes a
//! parameterization. `validate()` rejects bad parameters before any
//! simulation; the `create_*` functions validate again and never panic.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::exits::{
    max_hold_duration, CompositeExit, CompositeStage, DynamicExit, ExitPolicy, FixedExit,
    RegimeClassifier, RegimeThresholds, Thresholds, TimeoutExit, TrailingStop,
};
use crate::sizers::{FixedFraction, KellyCriterion, PositionSizer, ScoreBased};

// ─── Error type ──────────────────────────────────────────────────────

/// Errors that can occur during policy construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FactoryError {
    #[error("invalid {policy} parameter `{field}`: {reason}")]
    InvalidParameter {
        policy: &'static str,
        field: &'static str,
        reason: String,
    },
    #[error("composite exit has no stages")]
    EmptyComposite,
    #[error("composite exits cannot be nested")]
    NestedComposite,
    #[error("staged close ratios sum to {0:.4}, more than the whole position")]
    OverAllocatedStages(f64),
}

fn invalid(policy: &'static str, field: &'static str, reason: impl Into<String>) -> FactoryError {
    FactoryError::InvalidParameter {
        policy,
        field,
        reason: reason.into(),
    }
}

fn check_stop_loss(policy: &'static str, stop_loss: f64) -> Result<(), FactoryError> {
    if !stop_loss.is_finite() || stop_loss >= 0.0 || stop_loss <= -1.0 {
        return Err(invalid(
            policy,
            "stop_loss",
            format!("{stop_loss} must be a negative fraction above -1"),
        ));
    }
    Ok(())
}

fn check_take_profit(policy: &'static str, take_profit: f64) -> Result<(), FactoryError> {
    if !take_profit.is_finite() || take_profit <= 0.0 {
        return Err(invalid(
            policy,
            "take_profit",
            format!("{take_profit} must be a positive fraction"),
        ));
    }
    Ok(())
}

fn check_fraction(
    policy: &'static str,
    field: &'static str,
    value: f64,
) -> Result<(), FactoryError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(invalid(policy, field, format!("{value} is outside [0, 1]")));
    }
    Ok(())
}

// ─── Exit policy configs ─────────────────────────────────────────────

/// One exit policy, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExitPolicyConfig {
    Fixed {
        take_profit: f64,
        stop_loss: f64,
    },
    Dynamic {
        #[serde(default)]
        classifier: RegimeClassifier,
        #[serde(default)]
        thresholds: RegimeThresholds,
    },
    TrailingStop {
        activation_profit: f64,
        trail_distance: f64,
    },
    Timeout {
        max_hold_hours: f64,
    },
    Composite {
        stages: Vec<StageConfig>,
    },
}

/// A composite stage: a sub-policy plus an optional staged close ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub policy: ExitPolicyConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_ratio: Option<f64>,
}

impl ExitPolicyConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fixed { .. } => "fixed",
            Self::Dynamic { .. } => "dynamic",
            Self::TrailingStop { .. } => "trailing_stop",
            Self::Timeout { .. } => "timeout",
            Self::Composite { .. } => "composite",
        }
    }

    /// True if this config (or any composite stage) is a timeout.
    pub fn contains_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Composite { stages } => stages.iter().any(|s| s.policy.contains_timeout()),
            _ => false,
        }
    }

    pub fn validate(&self) -> Result<(), FactoryError> {
        match self {
            Self::Fixed {
                take_profit,
                stop_loss,
            } => {
                check_take_profit("fixed", *take_profit)?;
                check_stop_loss("fixed", *stop_loss)
            }
            Self::Dynamic {
                classifier,
                thresholds,
            } => {
                if classifier.lookback < 2 {
                    return Err(invalid("dynamic", "lookback", "must be at least 2"));
                }
                if !(classifier.trend_threshold >= 0.0) || !(classifier.volatility_threshold >= 0.0)
                {
                    return Err(invalid(
                        "dynamic",
                        "classifier",
                        "thresholds must be non-negative",
                    ));
                }
                for t in [thresholds.bull, thresholds.sideways, thresholds.bear] {
                    let Thresholds {
                        take_profit,
                        stop_loss,
                    } = t;
                    check_take_profit("dynamic", take_profit)?;
                    check_stop_loss("dynamic", stop_loss)?;
                }
                let scale = thresholds.high_volatility_scale;
                if !scale.is_finite() || scale <= 0.0 {
                    return Err(invalid(
                        "dynamic",
                        "high_volatility_scale",
                        format!("{scale} must be positive"),
                    ));
                }
                // Scaled stops must stay above -100%
                for t in [thresholds.bull, thresholds.sideways, thresholds.bear] {
                    check_stop_loss("dynamic", t.stop_loss * scale.max(1.0))?;
                }
                Ok(())
            }
            Self::TrailingStop {
                activation_profit,
                trail_distance,
            } => {
                if !activation_profit.is_finite() || *activation_profit < 0.0 {
                    return Err(invalid(
                        "trailing_stop",
                        "activation_profit",
                        format!("{activation_profit} must be non-negative"),
                    ));
                }
                if !trail_distance.is_finite() || *trail_distance <= 0.0 || *trail_distance >= 1.0
                {
                    return Err(invalid(
                        "trailing_stop",
                        "trail_distance",
                        format!("{trail_distance} is outside (0, 1)"),
                    ));
                }
                Ok(())
            }
            Self::Timeout { max_hold_hours } => max_hold(*max_hold_hours).map(|_| ()),
            Self::Composite { stages } => {
                if stages.is_empty() {
                    return Err(FactoryError::EmptyComposite);
                }
                let mut staged_total = 0.0;
                for stage in stages {
                    if matches!(stage.policy, Self::Composite { .. }) {
                        return Err(FactoryError::NestedComposite);
                    }
                    stage.policy.validate()?;
                    if let Some(ratio) = stage.close_ratio {
                        if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
                            return Err(invalid(
                                "composite",
                                "close_ratio",
                                format!("{ratio} is outside (0, 1]"),
                            ));
                        }
                        staged_total += ratio;
                    }
                }
                if staged_total > 1.0 + 1e-9 {
                    return Err(FactoryError::OverAllocatedStages(staged_total));
                }
                Ok(())
            }
        }
    }
}

fn max_hold(hours: f64) -> Result<Duration, FactoryError> {
    max_hold_duration(hours).ok_or_else(|| {
        invalid(
            "timeout",
            "max_hold_hours",
            format!("{hours} must be positive and representable as a duration"),
        )
    })
}

fn build_stage(config: &StageConfig) -> Result<CompositeStage, FactoryError> {
    let policy = build_exit(&config.policy)?;
    Ok(match config.close_ratio {
        Some(ratio) => CompositeStage::staged(policy, ratio),
        None => CompositeStage::exit(policy),
    })
}

fn build_composite(stages: &[StageConfig]) -> Result<CompositeExit, FactoryError> {
    let stages = stages
        .iter()
        .map(build_stage)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CompositeExit::new(stages))
}

fn build_exit(config: &ExitPolicyConfig) -> Result<Box<dyn ExitPolicy>, FactoryError> {
    Ok(match config {
        ExitPolicyConfig::Fixed {
            take_profit,
            stop_loss,
        } => Box::new(FixedExit::new(*take_profit, *stop_loss)),
        ExitPolicyConfig::Dynamic {
            classifier,
            thresholds,
        } => Box::new(DynamicExit::new(classifier.clone(), *thresholds)),
        ExitPolicyConfig::TrailingStop {
            activation_profit,
            trail_distance,
        } => Box::new(TrailingStop::new(*activation_profit, *trail_distance)),
        ExitPolicyConfig::Timeout { max_hold_hours } => {
            Box::new(TimeoutExit::new(max_hold(*max_hold_hours)?))
        }
        ExitPolicyConfig::Composite { stages } => Box::new(build_composite(stages)?),
    })
}

// ─── Exit factory ────────────────────────────────────────────────────

/// Create an exit policy from its config.
///
/// With `backstop_hours`, a policy that has no timeout gets one appended as
/// its last stage (a non-composite policy is wrapped in a two-stage composite).
pub fn create_exit_policy(
    config: &ExitPolicyConfig,
    backstop_hours: Option<f64>,
) -> Result<Box<dyn ExitPolicy>, FactoryError> {
    config.validate()?;

    let Some(backstop_hours) = backstop_hours else {
        return build_exit(config);
    };
    let backstop_hold = max_hold(backstop_hours)?;

    let backstop = || CompositeStage::exit(Box::new(TimeoutExit::new(backstop_hold)));
    match config {
        ExitPolicyConfig::Composite { stages } => {
            let mut composite = build_composite(stages)?;
            if !composite.has_timeout() {
                composite.push(backstop());
            }
            Ok(Box::new(composite))
        }
        other => {
            let policy = build_exit(other)?;
            if policy.has_timeout() {
                return Ok(policy);
            }
            Ok(Box::new(CompositeExit::new(vec![
                CompositeStage::exit(policy),
                backstop(),
            ])))
        }
    }
}

// ─── Sizing configs ──────────────────────────────────────────────────

fn default_min_trades() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_min_fraction() -> f64 {
    0.05
}

fn default_max_fraction() -> f64 {
    0.5
}

fn default_kelly_fraction() -> f64 {
    0.1
}

fn default_multiplier() -> f64 {
    1.0
}

/// Position sizing policy, `{type, params}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
pub enum PositionSizingConfig {
    Fixed {
        fraction: f64,
    },
    Kelly {
        #[serde(default = "default_min_trades")]
        min_trades: usize,
        #[serde(default)]
        lookback: Option<usize>,
        #[serde(default = "default_true")]
        half_kelly: bool,
        #[serde(default = "default_min_fraction")]
        min_fraction: f64,
        #[serde(default = "default_max_fraction")]
        max_fraction: f64,
        #[serde(default = "default_kelly_fraction")]
        default_fraction: f64,
    },
    ScoreBased {
        base_fraction: f64,
        #[serde(default = "default_multiplier")]
        multiplier: f64,
        #[serde(default = "default_min_fraction")]
        min_fraction: f64,
        #[serde(default = "default_max_fraction")]
        max_fraction: f64,
    },
}

impl Default for PositionSizingConfig {
    fn default() -> Self {
        Self::Fixed { fraction: 1.0 }
    }
}

impl PositionSizingConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fixed { .. } => "fixed",
            Self::Kelly { .. } => "kelly",
            Self::ScoreBased { .. } => "score_based",
        }
    }

    pub fn validate(&self) -> Result<(), FactoryError> {
        match self {
            Self::Fixed { fraction } => {
                check_fraction("fixed", "fraction", *fraction)?;
                if *fraction == 0.0 {
                    return Err(invalid("fixed", "fraction", "must be above 0"));
                }
                Ok(())
            }
            Self::Kelly {
                min_fraction,
                max_fraction,
                default_fraction,
                ..
            } => {
                check_fraction("kelly", "min_fraction", *min_fraction)?;
                check_fraction("kelly", "max_fraction", *max_fraction)?;
                check_fraction("kelly", "default_fraction", *default_fraction)?;
                if min_fraction > max_fraction {
                    return Err(invalid(
                        "kelly",
                        "min_fraction",
                        format!("{min_fraction} exceeds max_fraction {max_fraction}"),
                    ));
                }
                Ok(())
            }
            Self::ScoreBased {
                base_fraction,
                multiplier,
                min_fraction,
                max_fraction,
            } => {
                check_fraction("score_based", "base_fraction", *base_fraction)?;
                check_fraction("score_based", "min_fraction", *min_fraction)?;
                check_fraction("score_based", "max_fraction", *max_fraction)?;
                if !multiplier.is_finite() || *multiplier <= 0.0 {
                    return Err(invalid(
                        "score_based",
                        "multiplier",
                        format!("{multiplier} must be positive"),
                    ));
                }
                if min_fraction > max_fraction {
                    return Err(invalid(
                        "score_based",
                        "min_fraction",
                        format!("{min_fraction} exceeds max_fraction {max_fraction}"),
                    ));
                }
                Ok(())
            }
        }
    }
}

// ─── Sizer factory ───────────────────────────────────────────────────

/// Create a position sizer from its config.
pub fn create_sizer(config: &PositionSizingConfig) -> Result<Box<dyn PositionSizer>, FactoryError> {
    config.validate()?;
    Ok(match config {
        PositionSizingConfig::Fixed { fraction } => Box::new(FixedFraction::new(*fraction)),
        PositionSizingConfig::Kelly {
            min_trades,
            lookback,
            half_kelly,
            min_fraction,
            max_fraction,
            default_fraction,
        } => Box::new(KellyCriterion::new(
            *min_trades,
            *lookback,
            *half_kelly,
            *min_fraction,
            *max_fraction,
            *default_fraction,
        )),
        PositionSizingConfig::ScoreBased {
            base_fraction,
            multiplier,
            min_fraction,
            max_fraction,
        } => Box::new(ScoreBased::new(
            *base_fraction,
            *multiplier,
            *min_fraction,
            *max_fraction,
        )),
    })
}
