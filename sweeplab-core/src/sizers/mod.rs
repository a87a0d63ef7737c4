//! Position sizers: decide what fraction of current cash a new entry uses.
//!
//! Sizers see the current cash balance, the signal being entered, and the
//! ledger's realized trades. They are signal-agnostic about entry/exit timing.

pub mod fixed;
pub mod kelly;
pub mod score;

pub use fixed::FixedFraction;
pub use kelly::KellyCriterion;
pub use score::ScoreBased;

use crate::domain::{Signal, Trade};

/// Everything a sizer may look at when a buy is attempted.
#[derive(Debug, Clone, Copy)]
pub struct SizingContext<'a> {
    /// Cash available right now (after all prior trades).
    pub cash: f64,
    pub signal: &'a Signal,
    /// Realized trades so far in this run, oldest first.
    pub history: &'a [Trade],
}

/// Position sizing logic
///
/// # Responsibilities
/// - Convert sizing context → fraction of current cash to commit
/// - Keep the result within the sizer's configured bounds
///
/// # Non-Responsibilities
/// - Sizers do NOT decide entry/exit (that's the signal's and exit policy's job)
/// - Sizers do NOT apply fees or minimum order sizes (the simulator does)
///
/// Implementations must not panic. The simulator treats a non-finite or
/// non-positive fraction as "skip this entry".
pub trait PositionSizer: Send + Sync {
    /// Fraction of current cash in (0, 1].
    fn fraction(&self, ctx: &SizingContext<'_>) -> f64;

    /// Sizer name for reports/logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct HalfCash;

    impl PositionSizer for HalfCash {
        fn fraction(&self, _ctx: &SizingContext<'_>) -> f64 {
            0.5
        }

        fn name(&self) -> &str {
            "half_cash"
        }
    }

    #[test]
    fn sizer_trait_object_builds() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let signal = Signal::buy(ts, 100.0);
        let sizer: Box<dyn PositionSizer> = Box::new(HalfCash);
        let ctx = SizingContext {
            cash: 10_000.0,
            signal: &signal,
            history: &[],
        };
        assert_eq!(sizer.fraction(&ctx), 0.5);
        assert_eq!(sizer.name(), "half_cash");
    }
}
