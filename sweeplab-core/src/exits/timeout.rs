//! Timeout exit: force a full close after a maximum holding time.
//!
//! A pure time-based exit, independent of P&L. Fills at the candle close.

use chrono::Duration;

use super::{ExitContext, ExitDecision, ExitPolicy};
use crate::domain::ExitReason;

#[derive(Debug, Clone)]
pub struct TimeoutExit {
    pub max_hold: Duration,
}

impl TimeoutExit {
    pub fn new(max_hold: Duration) -> Self {
        Self { max_hold }
    }

    /// `None` when `hours` is not positive or lies outside chrono's range.
    pub fn from_hours(hours: f64) -> Option<Self> {
        max_hold_duration(hours).map(Self::new)
    }
}

/// Convert a holding limit in hours to a [`Duration`], rounded to the second.
pub fn max_hold_duration(hours: f64) -> Option<Duration> {
    if !(hours.is_finite() && hours > 0.0) {
        return None;
    }
    let seconds = (hours * 3600.0).round();
    if seconds >= i64::MAX as f64 {
        return None;
    }
    Duration::try_seconds(seconds as i64)
}

impl ExitPolicy for TimeoutExit {
    fn name(&self) -> &str {
        "timeout"
    }

    fn evaluate(&self, ctx: &ExitContext<'_>) -> ExitDecision {
        if ctx.elapsed >= self.max_hold {
            ExitDecision::full(ExitReason::Timeout, None)
        } else {
            ExitDecision::hold()
        }
    }

    fn has_timeout(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn holds_before_max() {
        let policy = TimeoutExit::from_hours(24.0).unwrap();
        let pos = position(100.0);
        let c = candle(23, 100.0, 101.0, 99.0, 100.0);
        assert!(!policy.evaluate(&ctx(&pos, &c, &[])).should_exit);
    }

    #[test]
    fn exits_at_max_regardless_of_pnl() {
        let policy = TimeoutExit::from_hours(24.0).unwrap();
        let pos = position(100.0);
        for close in [50.0, 100.0, 150.0] {
            let c = candle(24, close, close, close, close);
            let d = policy.evaluate(&ctx(&pos, &c, &[]));
            assert!(d.is_full());
            assert_eq!(d.reason, Some(ExitReason::Timeout));
            assert!(d.exit_price.is_none(), "timeout fills at the close");
        }
    }

    #[test]
    fn out_of_range_hours_do_not_build() {
        assert_eq!(max_hold_duration(1.5), Some(Duration::seconds(5_400)));
        assert!(max_hold_duration(1e13).is_none());
        assert!(max_hold_duration(f64::MAX).is_none());
        assert!(max_hold_duration(0.0).is_none());
        assert!(max_hold_duration(f64::NAN).is_none());
        assert!(TimeoutExit::from_hours(1e13).is_none());
    }
}
