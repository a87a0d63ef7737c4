//! Score-based sizer
//!
//! Scales a base fraction by the signal's confidence and a per-strategy
//! multiplier: `clamp(base * confidence / 100 * multiplier, min, max)`.

use crate::sizers::{PositionSizer, SizingContext};

#[derive(Debug, Clone)]
pub struct ScoreBased {
    base_fraction: f64,
    /// Strategy-type multiplier (e.g. 1.2 for a trend strategy, 0.8 for mean reversion).
    multiplier: f64,
    min_fraction: f64,
    max_fraction: f64,
}

impl ScoreBased {
    pub fn new(base_fraction: f64, multiplier: f64, min_fraction: f64, max_fraction: f64) -> Self {
        let lo = min_fraction.clamp(0.0, 1.0);
        let hi = max_fraction.clamp(0.0, 1.0);
        let (min_fraction, max_fraction) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        Self {
            base_fraction,
            multiplier,
            min_fraction,
            max_fraction,
        }
    }

    /// Fraction for a confidence on the 0–100 scale.
    pub fn fraction_for_confidence(&self, confidence: f64) -> f64 {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let raw = self.base_fraction * (confidence / 100.0) * self.multiplier;
        if !raw.is_finite() {
            return self.min_fraction;
        }
        raw.clamp(self.min_fraction, self.max_fraction)
    }
}

impl PositionSizer for ScoreBased {
    fn fraction(&self, ctx: &SizingContext<'_>) -> f64 {
        self.fraction_for_confidence(ctx.signal.confidence)
    }

    fn name(&self) -> &str {
        "score_based"
    }
}
