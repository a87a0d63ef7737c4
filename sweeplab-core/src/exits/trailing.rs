//! Trailing stop: trail a fixed fraction below the peak once in profit.
//!
//! Inactive until the peak return reaches `activation_profit`. Once active the
//! stop sits at `peak * (1 - trail_distance)`; the candle low crossing it
//! fires a full exit. The peak is the one recorded before this candle, so a
//! candle cannot both raise the peak and stop out against it.

use super::{stop_fill, ExitContext, ExitDecision, ExitPolicy};
use crate::domain::ExitReason;

#[derive(Debug, Clone)]
pub struct TrailingStop {
    /// Peak return needed before trailing starts (0.03 = +3%).
    pub activation_profit: f64,
    /// Retracement from the peak that fires (0.02 = 2%).
    pub trail_distance: f64,
}

impl TrailingStop {
    pub fn new(activation_profit: f64, trail_distance: f64) -> Self {
        Self {
            activation_profit,
            trail_distance,
        }
    }

    pub fn is_active(&self, peak_return: f64) -> bool {
        peak_return >= self.activation_profit
    }
}

impl ExitPolicy for TrailingStop {
    fn name(&self) -> &str {
        "trailing_stop"
    }

    fn evaluate(&self, ctx: &ExitContext<'_>) -> ExitDecision {
        let peak = ctx.position.peak_price;
        if !(peak > 0.0) || !self.trail_distance.is_finite() {
            return ExitDecision::hold();
        }
        if !self.is_active(ctx.position.peak_return()) {
            return ExitDecision::hold();
        }

        let stop_level = peak * (1.0 - self.trail_distance);
        if ctx.candle.low <= stop_level {
            return ExitDecision::full(
                ExitReason::TrailingStop,
                Some(stop_fill(ctx.candle, stop_level)),
            );
        }
        ExitDecision::hold()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn inactive_below_activation() {
        let policy = TrailingStop::new(0.05, 0.02);
        let mut pos = position(100.0);
        pos.observe_high(104.0);
        // 10% retracement from 104 but never reached +5%
        let c = candle(2, 100.0, 100.0, 93.0, 94.0);
        assert!(!policy.evaluate(&ctx(&pos, &c, &[])).should_exit);
    }

    #[test]
    fn fires_on_retracement_after_activation() {
        let policy = TrailingStop::new(0.05, 0.02);
        let mut pos = position(100.0);
        pos.observe_high(110.0);
        // Stop at 110 * 0.98 = 107.8
        let c = candle(3, 109.0, 109.5, 107.0, 107.5);
        let d = policy.evaluate(&ctx(&pos, &c, &[]));
        assert_eq!(d.reason, Some(ExitReason::TrailingStop));
        assert!((d.exit_price.unwrap() - 107.8).abs() < 1e-9);
    }

    #[test]
    fn holds_above_stop() {
        let policy = TrailingStop::new(0.05, 0.02);
        let mut pos = position(100.0);
        pos.observe_high(110.0);
        let c = candle(3, 109.0, 111.0, 108.0, 110.5);
        assert!(!policy.evaluate(&ctx(&pos, &c, &[])).should_exit);
    }
}
