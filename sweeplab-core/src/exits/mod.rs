//! Exit policies: decide, candle by candle, whether to close the open position.
//!
//! Policies are immutable; all per-position state (peak price, closed ratio,
//! fired stages) lives in [`PositionState`], owned by the simulator. A policy
//! that cannot evaluate (not enough history, degenerate prices) holds.
//!
//! ## Concrete implementations
//!
//! - [`FixedExit`]: fixed take-profit / stop-loss on unrealized return
//! - [`DynamicExit`]: thresholds picked per candle from a market regime
//! - [`TrailingStop`]: retracement from the peak once in profit
//! - [`TimeoutExit`]: force exit after a maximum holding time
//! - [`CompositeExit`]: ordered sub-policies with staged partial exits

pub mod composite;
pub mod dynamic;
pub mod fixed;
pub mod regime;
pub mod timeout;
pub mod trailing;

pub use composite::{CompositeExit, CompositeStage};
pub use dynamic::{DynamicExit, RegimeThresholds, Thresholds};
pub use fixed::FixedExit;
pub use regime::{MarketRegime, RegimeClassifier, TrendRegime, VolatilityRegime};
pub use timeout::{max_hold_duration, TimeoutExit};
pub use trailing::TrailingStop;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::{Candle, ExitReason, PositionState};

/// Inputs to one exit evaluation.
#[derive(Debug, Clone, Copy)]
pub struct ExitContext<'a> {
    pub position: &'a PositionState,
    pub candle: &'a Candle,
    /// Candles strictly before `candle`, oldest first.
    pub history: &'a [Candle],
    /// Time since entry at `candle.timestamp`.
    pub elapsed: Duration,
}

/// What an exit policy wants to do on this candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitDecision {
    pub should_exit: bool,
    /// Fraction of the currently held quantity to close, in (0, 1].
    pub exit_fraction: f64,
    pub reason: Option<ExitReason>,
    /// Level the exit fills at before costs. `None` means the candle close.
    pub exit_price: Option<f64>,
    /// Composite stage that produced this decision, if any.
    pub stage: Option<usize>,
}

impl ExitDecision {
    pub fn hold() -> Self {
        Self {
            should_exit: false,
            exit_fraction: 0.0,
            reason: None,
            exit_price: None,
            stage: None,
        }
    }

    /// Close the whole remaining position.
    pub fn full(reason: ExitReason, exit_price: Option<f64>) -> Self {
        Self {
            should_exit: true,
            exit_fraction: 1.0,
            reason: Some(reason),
            exit_price,
            stage: None,
        }
    }

    /// Close `fraction` of the held quantity.
    pub fn partial(fraction: f64, reason: ExitReason, exit_price: Option<f64>) -> Self {
        Self {
            should_exit: true,
            exit_fraction: fraction,
            reason: Some(reason),
            exit_price,
            stage: None,
        }
    }

    pub fn is_full(&self) -> bool {
        self.should_exit && self.exit_fraction >= 1.0
    }
}

/// Trait for exit policies.
///
/// # Contract
/// - Must not panic; return [`ExitDecision::hold`] when evaluation is impossible.
/// - Must be deterministic: same context, same decision.
/// - Called only for candles strictly after the position's entry time.
pub trait ExitPolicy: Send + Sync {
    /// Human-readable name (e.g., "fixed", "trailing_stop").
    fn name(&self) -> &str;

    fn evaluate(&self, ctx: &ExitContext<'_>) -> ExitDecision;

    /// True if this policy (or any sub-policy) force-closes on elapsed time.
    fn has_timeout(&self) -> bool {
        false
    }
}

/// Fill level for a sell stop at `level`: the level itself, or the open when
/// the candle gapped down through it.
pub(crate) fn stop_fill(candle: &Candle, level: f64) -> f64 {
    if candle.open <= level {
        candle.open
    } else {
        level
    }
}

/// Fill level for a take-profit at `level`: the level itself, or the open when
/// the candle gapped up through it.
pub(crate) fn target_fill(candle: &Candle, level: f64) -> f64 {
    if candle.open >= level {
        candle.open
    } else {
        level
    }
}

/// Hold-all policy for strategies that rely on the end-of-period close.
pub struct NoExit;

impl ExitPolicy for NoExit {
    fn name(&self) -> &str {
        "no_exit"
    }

    fn evaluate(&self, _ctx: &ExitContext<'_>) -> ExitDecision {
        ExitDecision::hold()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    pub fn ts(hour: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(hour)
    }

    pub fn candle(hour: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(ts(hour), open, high, low, close, 1.0)
    }

    pub fn position(entry_price: f64) -> PositionState {
        PositionState::open(ts(0), entry_price, 10.0, entry_price * 10.0, 50.0)
    }

    pub fn ctx<'a>(
        position: &'a PositionState,
        candle: &'a Candle,
        history: &'a [Candle],
    ) -> ExitContext<'a> {
        ExitContext {
            position,
            candle,
            history,
            elapsed: candle.timestamp - position.entry_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn hold_decision() {
        let d = ExitDecision::hold();
        assert!(!d.should_exit);
        assert!(d.reason.is_none());
        assert!(!d.is_full());
    }

    #[test]
    fn gap_fills_at_open() {
        let c = candle(1, 90.0, 96.0, 89.0, 95.0);
        assert_eq!(stop_fill(&c, 95.0), 90.0);
        let c = candle(1, 99.0, 100.0, 94.0, 95.0);
        assert_eq!(stop_fill(&c, 95.0), 95.0);
        let c = candle(1, 112.0, 115.0, 111.0, 114.0);
        assert_eq!(target_fill(&c, 110.0), 112.0);
    }

    #[test]
    fn no_exit_always_holds() {
        let pos = position(100.0);
        let c = candle(1, 100.0, 200.0, 1.0, 150.0);
        assert_eq!(NoExit.evaluate(&ctx(&pos, &c, &[])), ExitDecision::hold());
    }
}
