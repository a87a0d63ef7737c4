//! Kelly criterion sizer
//!
//! Sizes from the rolling realized trade history of the current run.
//!
//! # Formula
//! ```text
//! W     = winners / trades
//! R     = avg_win / |avg_loss|
//! kelly = W - (1 - W) / R          (halved when half_kelly)
//! f     = clamp(kelly, min_fraction, max_fraction)
//! ```
//!
//! Falls back to `default_fraction` until `min_trades` trades exist, or when
//! the winner or loser set is empty (R undefined).

use crate::domain::Trade;
use crate::sizers::{PositionSizer, SizingContext};

#[derive(Debug, Clone)]
pub struct KellyCriterion {
    min_trades: usize,
    /// Only the most recent `lookback` trades count. `None` uses all of them.
    lookback: Option<usize>,
    half_kelly: bool,
    min_fraction: f64,
    max_fraction: f64,
    default_fraction: f64,
}

impl KellyCriterion {
    /// Bounds are sorted and clamped into [0, 1]; the default is clamped into
    /// the bounds so every output respects them.
    pub fn new(
        min_trades: usize,
        lookback: Option<usize>,
        half_kelly: bool,
        min_fraction: f64,
        max_fraction: f64,
        default_fraction: f64,
    ) -> Self {
        let lo = min_fraction.clamp(0.0, 1.0);
        let hi = max_fraction.clamp(0.0, 1.0);
        let (min_fraction, max_fraction) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let default_fraction = if default_fraction.is_finite() {
            default_fraction.clamp(min_fraction, max_fraction)
        } else {
            min_fraction
        };
        Self {
            min_trades,
            lookback: lookback.filter(|&n| n > 0),
            half_kelly,
            min_fraction,
            max_fraction,
            default_fraction,
        }
    }

    pub fn min_fraction(&self) -> f64 {
        self.min_fraction
    }

    pub fn max_fraction(&self) -> f64 {
        self.max_fraction
    }

    /// Clamped (optionally halved) Kelly fraction for a win rate and payoff
    /// ratio. Returns the default fraction when either input is unusable.
    pub fn fraction_for(&self, win_rate: f64, payoff_ratio: f64) -> f64 {
        let Some(raw) = kelly_fraction(win_rate, payoff_ratio) else {
            return self.default_fraction;
        };
        let damped = if self.half_kelly { raw / 2.0 } else { raw };
        damped.clamp(self.min_fraction, self.max_fraction)
    }

    fn window<'a>(&self, history: &'a [Trade]) -> &'a [Trade] {
        match self.lookback {
            Some(n) if history.len() > n => &history[history.len() - n..],
            _ => history,
        }
    }
}

/// Raw Kelly fraction `W - (1 - W) / R`. `None` when W is outside [0, 1] or
/// R is not a positive finite number.
pub fn kelly_fraction(win_rate: f64, payoff_ratio: f64) -> Option<f64> {
    if !(0.0..=1.0).contains(&win_rate) || !payoff_ratio.is_finite() || payoff_ratio <= 0.0 {
        return None;
    }
    Some(win_rate - (1.0 - win_rate) / payoff_ratio)
}

impl PositionSizer for KellyCriterion {
    fn fraction(&self, ctx: &SizingContext<'_>) -> f64 {
        let trades = self.window(ctx.history);
        if trades.len() < self.min_trades || trades.is_empty() {
            return self.default_fraction;
        }

        let wins: Vec<f64> = trades
            .iter()
            .filter(|t| t.is_winner())
            .map(|t| t.return_pct)
            .collect();
        let losses: Vec<f64> = trades
            .iter()
            .filter(|t| t.is_loser())
            .map(|t| t.return_pct.abs())
            .collect();
        if wins.is_empty() || losses.is_empty() {
            return self.default_fraction;
        }

        let avg_win = wins.iter().sum::<f64>() / wins.len() as f64;
        let avg_loss = losses.iter().sum::<f64>() / losses.len() as f64;
        if avg_loss <= 0.0 {
            return self.default_fraction;
        }

        let win_rate = wins.len() as f64 / trades.len() as f64;
        self.fraction_for(win_rate, avg_win / avg_loss)
    }

    fn name(&self) -> &str {
        "kelly"
    }
}
