//! Composite exit: ordered sub-policies, first trigger wins.
//!
//! A stage is either a plain exit (the sub-policy's decision passes through)
//! or a staged partial exit with a `close_ratio` of the *original* quantity.
//! Staged exits fire at most once per position; the simulator records fired
//! stages in [`PositionState::fired_stages`](crate::domain::PositionState).

use super::{ExitContext, ExitDecision, ExitPolicy};
use crate::domain::ExitReason;

/// Fractions within this of 1.0 close the whole remainder.
const FULL_CLOSE_EPSILON: f64 = 1e-9;

pub struct CompositeStage {
    pub policy: Box<dyn ExitPolicy>,
    /// Share of the original quantity to close when this stage fires.
    /// `None` passes the sub-policy's decision through unchanged.
    pub close_ratio: Option<f64>,
}

impl CompositeStage {
    pub fn exit(policy: Box<dyn ExitPolicy>) -> Self {
        Self {
            policy,
            close_ratio: None,
        }
    }

    pub fn staged(policy: Box<dyn ExitPolicy>, close_ratio: f64) -> Self {
        Self {
            policy,
            close_ratio: Some(close_ratio),
        }
    }

    pub fn is_staged(&self) -> bool {
        self.close_ratio.is_some()
    }
}

impl std::fmt::Debug for CompositeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeStage")
            .field("policy", &self.policy.name())
            .field("close_ratio", &self.close_ratio)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct CompositeExit {
    stages: Vec<CompositeStage>,
}

impl CompositeExit {
    pub fn new(stages: Vec<CompositeStage>) -> Self {
        Self { stages }
    }

    /// Append a stage after the existing ones.
    pub fn push(&mut self, stage: CompositeStage) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[CompositeStage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl ExitPolicy for CompositeExit {
    fn name(&self) -> &str {
        "composite"
    }

    fn evaluate(&self, ctx: &ExitContext<'_>) -> ExitDecision {
        let position = ctx.position;
        let mut tier = 0;

        for (idx, stage) in self.stages.iter().enumerate() {
            let Some(ratio) = stage.close_ratio else {
                let decision = stage.policy.evaluate(ctx);
                if decision.should_exit {
                    return decision;
                }
                continue;
            };

            tier += 1;
            if position.stage_fired(idx) {
                continue;
            }
            let decision = stage.policy.evaluate(ctx);
            if !decision.should_exit {
                continue;
            }

            let remaining = position.remaining_fraction;
            if !(remaining > 0.0) || !(ratio > 0.0) {
                continue;
            }
            let mut fraction = (ratio / remaining).min(1.0);
            if fraction > 1.0 - FULL_CLOSE_EPSILON {
                fraction = 1.0;
            }

            let mut staged =
                ExitDecision::partial(fraction, ExitReason::ProfitTier(tier), decision.exit_price);
            staged.stage = Some(idx);
            return staged;
        }

        ExitDecision::hold()
    }

    fn has_timeout(&self) -> bool {
        self.stages.iter().any(|s| s.policy.has_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{FixedExit, TimeoutExit, TrailingStop};
    use super::*;

    /// Take-profit only: the stop sits far below any test price.
    fn tier(take_profit: f64) -> Box<dyn ExitPolicy> {
        Box::new(FixedExit::new(take_profit, -0.99))
    }

    fn three_tiers() -> CompositeExit {
        CompositeExit::new(vec![
            CompositeStage::exit(Box::new(FixedExit::new(1.0, -0.05))),
            CompositeStage::staged(tier(0.05), 1.0 / 3.0),
            CompositeStage::staged(tier(0.10), 1.0 / 3.0),
            CompositeStage::staged(tier(0.15), 1.0 / 3.0),
        ])
    }

    #[test]
    fn stages_fire_in_order_and_once() {
        let policy = three_tiers();
        let mut pos = position(100.0);

        let c1 = candle(1, 100.0, 106.0, 100.0, 105.0);
        let d1 = policy.evaluate(&ctx(&pos, &c1, &[]));
        assert_eq!(d1.reason, Some(ExitReason::ProfitTier(1)));
        assert_eq!(d1.stage, Some(1));
        assert!((d1.exit_fraction - 1.0 / 3.0).abs() < 1e-12);
        assert!((d1.exit_price.unwrap() - 105.0).abs() < 1e-9);

        // Apply the partial close the way the simulator does
        pos.reduce(pos.quantity * d1.exit_fraction);
        pos.fired_stages.insert(1);

        // Same candle again: tier 1 already fired, tier 2 not reached
        assert!(!policy.evaluate(&ctx(&pos, &c1, &[])).should_exit);

        let c2 = candle(2, 105.0, 111.0, 104.0, 110.0);
        let d2 = policy.evaluate(&ctx(&pos, &c2, &[]));
        assert_eq!(d2.reason, Some(ExitReason::ProfitTier(2)));
        // 1/3 of the original out of the 2/3 still held
        assert!((d2.exit_fraction - 0.5).abs() < 1e-9);
        pos.reduce(pos.quantity * d2.exit_fraction);
        pos.fired_stages.insert(2);

        let c3 = candle(3, 110.0, 116.0, 109.0, 115.0);
        let d3 = policy.evaluate(&ctx(&pos, &c3, &[]));
        assert_eq!(d3.reason, Some(ExitReason::ProfitTier(3)));
        assert!(d3.is_full());
    }

    #[test]
    fn plain_stage_passes_through() {
        let policy = three_tiers();
        let pos = position(100.0);
        let c = candle(1, 99.0, 99.0, 94.0, 95.0);
        let d = policy.evaluate(&ctx(&pos, &c, &[]));
        assert!(d.is_full());
        assert_eq!(d.reason, Some(ExitReason::StopLoss));
        assert_eq!(d.stage, None);
    }

    #[test]
    fn first_trigger_wins() {
        // Both the stop and the first tier would fire; the stop is listed first
        let policy = three_tiers();
        let pos = position(100.0);
        let c = candle(1, 100.0, 106.0, 94.0, 100.0);
        assert_eq!(
            policy.evaluate(&ctx(&pos, &c, &[])).reason,
            Some(ExitReason::StopLoss)
        );
    }

    #[test]
    fn has_timeout_looks_through_stages() {
        let mut policy = CompositeExit::new(vec![CompositeStage::exit(Box::new(
            TrailingStop::new(0.03, 0.02),
        ))]);
        assert!(!policy.has_timeout());
        policy.push(CompositeStage::exit(Box::new(TimeoutExit::from_hours(48.0).unwrap())));
        assert!(policy.has_timeout());
    }

    #[test]
    fn empty_composite_holds() {
        let policy = CompositeExit::default();
        let pos = position(100.0);
        let c = candle(1, 100.0, 200.0, 1.0, 100.0);
        assert!(!policy.evaluate(&ctx(&pos, &c, &[])).should_exit);
    }
}
