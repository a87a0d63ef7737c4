//! Regime-driven take-profit / stop-loss exit.
//!
//! Same threshold-crossing rule as [`FixedExit`](super::FixedExit), but the
//! thresholds are looked up every candle from the regime of the candles
//! before it. High volatility widens both thresholds by
//! `high_volatility_scale`. Without enough history to classify, it holds.

use serde::{Deserialize, Serialize};

use super::fixed::threshold_exit;
use super::regime::{MarketRegime, RegimeClassifier, TrendRegime, VolatilityRegime};
use super::{ExitContext, ExitDecision, ExitPolicy};

/// Take-profit (positive) and stop-loss (negative) as fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub take_profit: f64,
    pub stop_loss: f64,
}

/// Per-trend thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    pub bull: Thresholds,
    pub sideways: Thresholds,
    pub bear: Thresholds,
    #[serde(default = "default_high_volatility_scale")]
    pub high_volatility_scale: f64,
}

fn default_high_volatility_scale() -> f64 {
    1.5
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            bull: Thresholds {
                take_profit: 0.15,
                stop_loss: -0.05,
            },
            sideways: Thresholds {
                take_profit: 0.08,
                stop_loss: -0.04,
            },
            bear: Thresholds {
                take_profit: 0.05,
                stop_loss: -0.03,
            },
            high_volatility_scale: default_high_volatility_scale(),
        }
    }
}

impl RegimeThresholds {
    pub fn for_regime(&self, regime: &MarketRegime) -> Thresholds {
        let base = match regime.trend {
            TrendRegime::Bull => self.bull,
            TrendRegime::Sideways => self.sideways,
            TrendRegime::Bear => self.bear,
        };
        match regime.volatility {
            VolatilityRegime::Low => base,
            VolatilityRegime::High => Thresholds {
                take_profit: base.take_profit * self.high_volatility_scale,
                stop_loss: base.stop_loss * self.high_volatility_scale,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct DynamicExit {
    pub classifier: RegimeClassifier,
    pub thresholds: RegimeThresholds,
}

impl DynamicExit {
    pub fn new(classifier: RegimeClassifier, thresholds: RegimeThresholds) -> Self {
        Self {
            classifier,
            thresholds,
        }
    }
}

impl ExitPolicy for DynamicExit {
    fn name(&self) -> &str {
        "dynamic"
    }

    fn evaluate(&self, ctx: &ExitContext<'_>) -> ExitDecision {
        let Some(regime) = self.classifier.classify(ctx.history) else {
            return ExitDecision::hold();
        };
        let t = self.thresholds.for_regime(&regime);
        threshold_exit(ctx.position, ctx.candle, t.take_profit, t.stop_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::domain::{Candle, ExitReason};

    fn flat_history(n: usize, price: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| candle(i as i64 - n as i64, price, price, price, price))
            .collect()
    }

    fn rising_history(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let p = 80.0 + 2.0 * i as f64;
                candle(i as i64 - n as i64, p, p, p, p)
            })
            .collect()
    }

    fn policy() -> DynamicExit {
        DynamicExit::new(
            RegimeClassifier {
                lookback: 5,
                trend_threshold: 0.02,
                volatility_threshold: 0.05,
            },
            RegimeThresholds::default(),
        )
    }

    #[test]
    fn holds_without_history() {
        let pos = position(100.0);
        let c = candle(1, 100.0, 200.0, 50.0, 100.0);
        assert!(!policy().evaluate(&ctx(&pos, &c, &[])).should_exit);
    }

    #[test]
    fn sideways_uses_tight_target() {
        let pos = position(100.0);
        let hist = flat_history(6, 100.0);
        // +9% high: above sideways target (8%) but below bull (15%)
        let c = candle(1, 100.0, 109.0, 99.0, 108.0);
        let d = policy().evaluate(&ctx(&pos, &c, &hist));
        assert_eq!(d.reason, Some(ExitReason::TakeProfit));
        assert!((d.exit_price.unwrap() - 108.0).abs() < 1e-9);
    }

    #[test]
    fn bull_lets_winners_run() {
        let pos = position(100.0);
        let hist = rising_history(6);
        let c = candle(1, 100.0, 109.0, 99.0, 108.0);
        assert!(!policy().evaluate(&ctx(&pos, &c, &hist)).should_exit);
    }

    #[test]
    fn high_volatility_scales_thresholds() {
        let t = RegimeThresholds::default();
        let regime = MarketRegime {
            trend: TrendRegime::Bear,
            volatility: VolatilityRegime::High,
            trend_strength: -0.1,
            realized_volatility: 0.2,
        };
        let scaled = t.for_regime(&regime);
        assert!((scaled.take_profit - 0.075).abs() < 1e-12);
        assert!((scaled.stop_loss + 0.045).abs() < 1e-12);
    }
}
