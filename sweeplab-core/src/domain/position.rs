use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The single open position held by a simulator.
///
/// Created by a buy, mutated only by the owning simulator (peak tracking and
/// partial closes), and dropped on full close. `peak_price` never decreases
/// for the life of the position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub entry_time: NaiveDateTime,
    /// Execution price after slippage.
    pub entry_price: f64,
    /// Highest price observed since entry, starting at the entry price.
    pub peak_price: f64,
    /// Quantity currently held.
    pub quantity: f64,
    /// Quantity bought at entry.
    pub initial_quantity: f64,
    /// `quantity / initial_quantity`.
    pub remaining_fraction: f64,
    /// Total cash debited at entry (notional plus entry fee).
    pub cost_basis: f64,
    /// Confidence of the signal that opened the position (0–100).
    pub confidence: f64,
    pub is_open: bool,
    /// Composite stages that already closed part of this position.
    pub fired_stages: BTreeSet<usize>,
}

impl PositionState {
    pub fn open(
        entry_time: NaiveDateTime,
        entry_price: f64,
        quantity: f64,
        cost_basis: f64,
        confidence: f64,
    ) -> Self {
        Self {
            entry_time,
            entry_price,
            peak_price: entry_price,
            quantity,
            initial_quantity: quantity,
            remaining_fraction: 1.0,
            cost_basis,
            confidence,
            is_open: true,
            fired_stages: BTreeSet::new(),
        }
    }

    /// Unrealized return at `price` as a fraction of the entry price.
    pub fn unrealized_return(&self, price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        (price - self.entry_price) / self.entry_price
    }

    /// Best unrealized return seen so far (at the peak).
    pub fn peak_return(&self) -> f64 {
        self.unrealized_return(self.peak_price)
    }

    /// Share of the initial quantity already closed.
    pub fn closed_ratio(&self) -> f64 {
        1.0 - self.remaining_fraction
    }

    pub fn holding_time(&self, now: NaiveDateTime) -> Duration {
        now - self.entry_time
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Entry cost attributable to one unit, fee included.
    pub fn unit_cost(&self) -> f64 {
        if self.initial_quantity <= 0.0 {
            return 0.0;
        }
        self.cost_basis / self.initial_quantity
    }

    /// Raise the peak if `price` is a new high. Never lowers it.
    pub fn observe_high(&mut self, price: f64) {
        if price.is_finite() && price > self.peak_price {
            self.peak_price = price;
        }
    }

    pub fn stage_fired(&self, stage: usize) -> bool {
        self.fired_stages.contains(&stage)
    }

    /// Remove `quantity` from the position. Returns the quantity actually
    /// removed, never more than is held.
    pub fn reduce(&mut self, quantity: f64) -> f64 {
        let removed = quantity.clamp(0.0, self.quantity);
        self.quantity -= removed;
        if self.initial_quantity > 0.0 {
            self.remaining_fraction = self.quantity / self.initial_quantity;
        }
        if self.quantity <= f64::EPSILON * self.initial_quantity.max(1.0) {
            self.quantity = 0.0;
            self.remaining_fraction = 0.0;
            self.is_open = false;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn peak_only_rises() {
        let mut pos = PositionState::open(t0(), 100.0, 10.0, 1000.0, 50.0);
        pos.observe_high(110.0);
        pos.observe_high(105.0);
        pos.observe_high(f64::NAN);
        assert_eq!(pos.peak_price, 110.0);
        assert!((pos.peak_return() - 0.10).abs() < 1e-12);
    }

    #[test]
    fn reduce_tracks_remaining_fraction() {
        let mut pos = PositionState::open(t0(), 100.0, 9.0, 900.0, 50.0);
        assert_eq!(pos.reduce(3.0), 3.0);
        assert!((pos.remaining_fraction - 2.0 / 3.0).abs() < 1e-12);
        assert!(pos.is_open);
        // Asking for more than is held removes only what is left
        assert_eq!(pos.reduce(100.0), 6.0);
        assert!(!pos.is_open);
        assert_eq!(pos.remaining_fraction, 0.0);
        assert!((pos.closed_ratio() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn holding_time_from_entry() {
        let pos = PositionState::open(t0(), 100.0, 1.0, 100.0, 0.0);
        let later = t0() + Duration::hours(5);
        assert_eq!(pos.holding_time(later), Duration::hours(5));
    }
}
