//! Fixed fraction sizer
//!
//! Simplest sizer: commit the same fraction of current cash on every entry.

use crate::sizers::{PositionSizer, SizingContext};

/// Constant fraction of current cash. Stateless.
#[derive(Debug, Clone)]
pub struct FixedFraction {
    fraction: f64,
}

impl FixedFraction {
    /// `fraction` is clamped into [0, 1].
    pub fn new(fraction: f64) -> Self {
        Self {
            fraction: if fraction.is_finite() {
                fraction.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    pub fn full() -> Self {
        Self::new(1.0)
    }
}

impl PositionSizer for FixedFraction {
    fn fraction(&self, _ctx: &SizingContext<'_>) -> f64 {
        self.fraction
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Signal;
    use chrono::NaiveDate;

    fn ctx_with(signal: &Signal, cash: f64) -> SizingContext<'_> {
        SizingContext {
            cash,
            signal,
            history: &[],
        }
    }

    fn signal() -> Signal {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Signal::buy(ts, 100.0)
    }

    #[test]
    fn returns_configured_fraction() {
        let s = signal();
        let sizer = FixedFraction::new(0.3);
        assert_eq!(sizer.fraction(&ctx_with(&s, 1_000.0)), 0.3);
        // Independent of cash
        assert_eq!(sizer.fraction(&ctx_with(&s, 5.0)), 0.3);
    }

    #[test]
    fn clamps_out_of_range() {
        let s = signal();
        assert_eq!(FixedFraction::new(1.7).fraction(&ctx_with(&s, 1.0)), 1.0);
        assert_eq!(FixedFraction::new(-0.2).fraction(&ctx_with(&s, 1.0)), 0.0);
        assert_eq!(FixedFraction::new(f64::NAN).fraction(&ctx_with(&s, 1.0)), 0.0);
    }
}
