//! Fixed take-profit / stop-loss exit.
//!
//! Levels are fixed at entry: `entry * (1 + take_profit)` and
//! `entry * (1 + stop_loss)` with `stop_loss` negative. The stop is tested
//! against the candle low before the target is tested against the high, so a
//! candle that spans both resolves as a stop-loss.

use super::{stop_fill, target_fill, ExitContext, ExitDecision, ExitPolicy};
use crate::domain::{Candle, ExitReason, PositionState};

#[derive(Debug, Clone)]
pub struct FixedExit {
    /// Take-profit as a positive fraction (0.10 = +10%).
    pub take_profit: f64,
    /// Stop-loss as a negative fraction (-0.05 = -5%).
    pub stop_loss: f64,
}

impl FixedExit {
    pub fn new(take_profit: f64, stop_loss: f64) -> Self {
        Self {
            take_profit,
            stop_loss,
        }
    }
}

/// Threshold-crossing check shared by fixed and regime-driven exits.
pub(crate) fn threshold_exit(
    position: &PositionState,
    candle: &Candle,
    take_profit: f64,
    stop_loss: f64,
) -> ExitDecision {
    let entry = position.entry_price;
    if !(entry > 0.0) || !take_profit.is_finite() || !stop_loss.is_finite() {
        return ExitDecision::hold();
    }

    let stop_level = entry * (1.0 + stop_loss);
    if candle.low <= stop_level {
        return ExitDecision::full(ExitReason::StopLoss, Some(stop_fill(candle, stop_level)));
    }

    let target_level = entry * (1.0 + take_profit);
    if candle.high >= target_level {
        return ExitDecision::full(
            ExitReason::TakeProfit,
            Some(target_fill(candle, target_level)),
        );
    }

    ExitDecision::hold()
}

impl ExitPolicy for FixedExit {
    fn name(&self) -> &str {
        "fixed"
    }

    fn evaluate(&self, ctx: &ExitContext<'_>) -> ExitDecision {
        threshold_exit(ctx.position, ctx.candle, self.take_profit, self.stop_loss)
    }
}
