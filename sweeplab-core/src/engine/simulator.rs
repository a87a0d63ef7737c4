//! Compounding trade simulator: one sizer, one exit policy, one position.
//!
//! State machine per position:
//!
//! ```text
//! NoPosition --buy--> Open --partial exit--> Open (reduced) --full exit--> NoPosition
//! ```
//!
//! `run` replays a whole window. Candle timestamps are open times, so for
//! each candle the signals stamped before it are offered to `buy` first, then
//! exits are evaluated (only for candles strictly after the entry time), then
//! signals stamped exactly at the candle are offered. A position still open
//! after the last candle is closed at its close as `end_of_period`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ledger::CompoundingLedger;
use crate::domain::{Candle, ExitReason, PositionState, Signal, Trade};
use crate::exits::{ExitContext, ExitDecision, ExitPolicy};
use crate::sizers::{PositionSizer, SizingContext};

/// Fractions within this of 1.0 close the whole remainder.
const FULL_CLOSE_EPSILON: f64 = 1e-9;

/// Cost and capital settings for a simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub initial_capital: f64,
    /// Proportional fee on both entry and exit notional (0.0005 = 5 bps).
    pub fee_rate: f64,
    /// Adverse price move on every fill: buys pay up, sells receive less.
    pub slippage: f64,
    /// Entries whose budget falls below this are rejected.
    pub min_order_value: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_capital: 1_000_000.0,
            fee_rate: 0.0005,
            slippage: 0.0,
            min_order_value: 5_000.0,
        }
    }
}

/// Why a buy did not open a position.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntryRejection {
    #[error("a position is already open")]
    PositionOpen,
    #[error("signal is not a buy")]
    NotABuy,
    #[error("invalid signal price {0}")]
    InvalidPrice(f64),
    #[error("invalid sizing fraction {0}")]
    InvalidSizing(f64),
    #[error("order value {value:.2} below minimum {minimum:.2}")]
    BelowMinimumOrder { value: f64, minimum: f64 },
}

/// Account value at one candle close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    #[serde(with = "crate::domain::timestamp")]
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// Everything one `run` produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationReport {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    /// Buy signals offered to the simulator.
    pub signals_seen: usize,
    pub entries: usize,
    /// Buy signals that did not open a position.
    pub skipped_signals: usize,
}

pub struct TradeSimulator {
    config: SimulatorConfig,
    sizer: Box<dyn PositionSizer>,
    exit_policy: Box<dyn ExitPolicy>,
    ledger: CompoundingLedger,
    position: Option<PositionState>,
}

impl TradeSimulator {
    pub fn new(
        config: SimulatorConfig,
        sizer: Box<dyn PositionSizer>,
        exit_policy: Box<dyn ExitPolicy>,
    ) -> Self {
        Self {
            ledger: CompoundingLedger::new(config.initial_capital),
            config,
            sizer,
            exit_policy,
            position: None,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn ledger(&self) -> &CompoundingLedger {
        &self.ledger
    }

    pub fn position(&self) -> Option<&PositionState> {
        self.position.as_ref()
    }

    pub fn cash(&self) -> f64 {
        self.ledger.cash()
    }

    pub fn trades(&self) -> &[Trade] {
        self.ledger.trades()
    }

    /// Cash plus the open position marked at `mark`.
    pub fn equity(&self, mark: f64) -> f64 {
        self.ledger.equity(self.position.as_ref(), mark)
    }

    /// Back to initial capital, flat, with no trades.
    pub fn reset(&mut self) {
        self.ledger.reset();
        self.position = None;
    }

    /// Open a position from a buy signal, sized from the current cash.
    pub fn buy(&mut self, signal: &Signal) -> Result<&PositionState, EntryRejection> {
        if self.position.is_some() {
            return Err(EntryRejection::PositionOpen);
        }
        if !signal.is_buy() {
            return Err(EntryRejection::NotABuy);
        }
        if !(signal.price.is_finite() && signal.price > 0.0) {
            return Err(EntryRejection::InvalidPrice(signal.price));
        }

        let cash = self.ledger.cash();
        let fraction = self.sizer.fraction(&SizingContext {
            cash,
            signal,
            history: self.ledger.trades(),
        });
        if !(fraction.is_finite() && fraction > 0.0 && fraction <= 1.0) {
            return Err(EntryRejection::InvalidSizing(fraction));
        }

        let budget = cash * fraction;
        if !(budget > 0.0) || budget < self.config.min_order_value {
            return Err(EntryRejection::BelowMinimumOrder {
                value: budget,
                minimum: self.config.min_order_value,
            });
        }

        let entry_price = signal.price * (1.0 + self.config.slippage);
        let quantity = budget / (entry_price * (1.0 + self.config.fee_rate));
        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(EntryRejection::InvalidPrice(entry_price));
        }

        self.ledger.debit(budget);
        debug!(
            timestamp = %signal.timestamp,
            price = entry_price,
            quantity,
            fraction,
            sizer = self.sizer.name(),
            "opened position"
        );
        let position = self.position.insert(PositionState::open(
            signal.timestamp,
            entry_price,
            quantity,
            budget,
            signal.confidence,
        ));
        Ok(&*position)
    }

    /// Evaluate the exit policy on `candle`. `history` holds the candles
    /// strictly before it. Returns the trade realized on this candle, if any.
    pub fn advance(&mut self, candle: &Candle, history: &[Candle]) -> Option<Trade> {
        let position = self.position.as_ref()?;
        if candle.timestamp <= position.entry_time {
            return None;
        }

        let decision = self.exit_policy.evaluate(&ExitContext {
            position,
            candle,
            history,
            elapsed: position.holding_time(candle.timestamp),
        });
        let trade = self
            .sanitize(decision, candle)
            .and_then(|(fraction, price, reason, stage)| {
                let position = self.position.as_mut()?;
                if let Some(stage) = stage {
                    position.fired_stages.insert(stage);
                }
                let quantity = if fraction >= 1.0 - FULL_CLOSE_EPSILON {
                    position.quantity
                } else {
                    position.quantity * fraction
                };
                self.close_quantity(quantity, price, candle.timestamp, reason)
            });

        if let Some(position) = self.position.as_mut() {
            position.observe_high(candle.high);
        }
        trade
    }

    /// Force-close whatever is open at `price`.
    pub fn close_all(
        &mut self,
        timestamp: NaiveDateTime,
        price: f64,
        reason: ExitReason,
    ) -> Option<Trade> {
        let quantity = self.position.as_ref()?.quantity;
        self.close_quantity(quantity, price, timestamp, reason)
    }

    fn offer(&mut self, signal: &Signal, is_last: bool, report: &mut SimulationReport) {
        if is_last {
            // No later candle could ever close it
            report.skipped_signals += 1;
            return;
        }
        match self.buy(signal) {
            Ok(_) => report.entries += 1,
            Err(rejection) => {
                debug!(timestamp = %signal.timestamp, %rejection, "signal skipped");
                report.skipped_signals += 1;
            }
        }
    }

    /// Replay `signals` over `candles` from a clean slate.
    ///
    /// Candles must be sorted by timestamp. Non-buy signals are ignored.
    pub fn run(&mut self, signals: &[Signal], candles: &[Candle]) -> SimulationReport {
        self.reset();

        let mut buys: Vec<&Signal> = signals.iter().filter(|s| s.is_buy()).collect();
        buys.sort_by_key(|s| s.timestamp);

        let mut report = SimulationReport {
            initial_capital: self.config.initial_capital,
            signals_seen: buys.len(),
            ..SimulationReport::default()
        };
        let Some(last) = candles.last() else {
            report.skipped_signals = buys.len();
            report.final_capital = self.ledger.cash();
            return report;
        };

        let mut pending = buys.into_iter().peekable();
        for (i, candle) in candles.iter().enumerate() {
            // Signals stamped before this candle opened are exposed to all of it
            while let Some(signal) = pending.next_if(|s| s.timestamp < candle.timestamp) {
                self.offer(signal, false, &mut report);
            }
            self.advance(candle, &candles[..i]);

            let is_last = i + 1 == candles.len();
            while let Some(signal) = pending.next_if(|s| s.timestamp == candle.timestamp) {
                self.offer(signal, is_last, &mut report);
            }

            report.equity_curve.push(EquityPoint {
                timestamp: candle.timestamp,
                equity: self.equity(candle.close),
            });
        }
        report.skipped_signals += pending.count();

        if self
            .close_all(last.timestamp, last.close, ExitReason::EndOfPeriod)
            .is_some()
        {
            if let Some(point) = report.equity_curve.last_mut() {
                point.equity = self.ledger.cash();
            }
        }

        report.final_capital = self.ledger.cash();
        report.trades = self.ledger.trades().to_vec();
        report
    }

    /// Validate a policy decision. Bad fractions are dropped, bad prices fall
    /// back to the candle close, and prices outside the candle are clamped.
    fn sanitize(
        &self,
        decision: ExitDecision,
        candle: &Candle,
    ) -> Option<(f64, f64, ExitReason, Option<usize>)> {
        if !decision.should_exit {
            return None;
        }
        let policy = self.exit_policy.name();
        let Some(reason) = decision.reason else {
            warn!(policy, "exit decision without a reason ignored");
            return None;
        };
        let fraction = decision.exit_fraction;
        if !(fraction.is_finite() && fraction > 0.0 && fraction <= 1.0 + FULL_CLOSE_EPSILON) {
            warn!(policy, fraction, "exit fraction out of range ignored");
            return None;
        }

        let price = match decision.exit_price {
            None => candle.close,
            Some(p) if p.is_finite() && p > 0.0 => {
                if p < candle.low || p > candle.high {
                    debug!(policy, price = p, "exit price clamped to candle range");
                }
                p.clamp(candle.low, candle.high)
            }
            Some(p) => {
                warn!(policy, price = p, "invalid exit price, using close");
                candle.close
            }
        };
        Some((fraction.min(1.0), price, reason, decision.stage))
    }

    fn close_quantity(
        &mut self,
        quantity: f64,
        price: f64,
        timestamp: NaiveDateTime,
        reason: ExitReason,
    ) -> Option<Trade> {
        let position = self.position.as_mut()?;
        let entry_price = position.entry_price;
        let entry_time = position.entry_time;
        let unit_cost = position.unit_cost();

        let removed = position.reduce(quantity);
        if removed <= 0.0 {
            return None;
        }
        let still_open = position.is_open;

        let exit_price = price * (1.0 - self.config.slippage);
        let gross = removed * exit_price;
        let exit_fee = gross * self.config.fee_rate;
        let proceeds = gross - exit_fee;
        let allocated = removed * unit_cost;
        let realized_pnl = proceeds - allocated;
        let return_pct = if allocated > 0.0 {
            realized_pnl / allocated * 100.0
        } else {
            0.0
        };
        let entry_fee = removed * (unit_cost - entry_price);

        let trade = Trade {
            entry_time,
            entry_price,
            exit_time: timestamp,
            exit_price,
            quantity: removed,
            return_pct,
            realized_pnl,
            exit_reason: reason,
            fees: entry_fee + exit_fee,
            is_partial: still_open,
        };
        debug!(
            %timestamp,
            reason = %reason,
            quantity = removed,
            return_pct,
            "closed position"
        );
        self.ledger.record(proceeds, trade.clone());
        if !still_open {
            self.position = None;
        }
        Some(trade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exits::{FixedExit, NoExit};
    use crate::sizers::FixedFraction;
    use chrono::{Duration, NaiveDate};

    fn ts(hour: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(hour)
    }

    fn candle(hour: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(ts(hour), open, high, low, close, 1.0)
    }

    fn frictionless() -> SimulatorConfig {
        SimulatorConfig {
            initial_capital: 10_000.0,
            fee_rate: 0.0,
            slippage: 0.0,
            min_order_value: 0.0,
        }
    }

    fn sim(config: SimulatorConfig, exit: Box<dyn ExitPolicy>) -> TradeSimulator {
        TradeSimulator::new(config, Box::new(FixedFraction::full()), exit)
    }

    #[test]
    fn buy_debits_budget_and_rejects_second_entry() {
        let mut s = sim(frictionless(), Box::new(NoExit));
        let pos = s.buy(&Signal::buy(ts(0), 100.0)).unwrap();
        assert!((pos.quantity - 100.0).abs() < 1e-9);
        assert_eq!(s.cash(), 0.0);
        assert_eq!(
            s.buy(&Signal::buy(ts(1), 100.0)).unwrap_err(),
            EntryRejection::PositionOpen
        );
    }

    #[test]
    fn buy_rejects_small_orders_and_bad_prices() {
        let config = SimulatorConfig {
            min_order_value: 50_000.0,
            ..frictionless()
        };
        let mut s = sim(config, Box::new(NoExit));
        assert!(matches!(
            s.buy(&Signal::buy(ts(0), 100.0)),
            Err(EntryRejection::BelowMinimumOrder { .. })
        ));

        let mut s = sim(frictionless(), Box::new(NoExit));
        assert!(matches!(
            s.buy(&Signal::buy(ts(0), f64::NAN)),
            Err(EntryRejection::InvalidPrice(_))
        ));
        assert!(s.position().is_none());
    }

    #[test]
    fn fees_and_slippage_charge_both_sides() {
        let config = SimulatorConfig {
            fee_rate: 0.001,
            slippage: 0.01,
            ..frictionless()
        };
        let mut s = sim(config, Box::new(NoExit));
        s.buy(&Signal::buy(ts(0), 100.0)).unwrap();
        let pos = s.position().unwrap();
        assert!((pos.entry_price - 101.0).abs() < 1e-9);
        assert!((pos.quantity - 10_000.0 / (101.0 * 1.001)).abs() < 1e-9);

        let trade = s.close_all(ts(1), 101.0, ExitReason::EndOfPeriod).unwrap();
        // Flat price still loses both fees and the exit slippage
        assert!(trade.realized_pnl < 0.0);
        assert!((trade.exit_price - 101.0 * 0.99).abs() < 1e-9);
        assert!((s.cash() - (10_000.0 + trade.realized_pnl)).abs() < 1e-6);
        assert!(s.position().is_none());
    }

    #[test]
    fn exits_skip_the_entry_candle() {
        let mut s = sim(frictionless(), Box::new(FixedExit::new(0.10, -0.05)));
        s.buy(&Signal::buy(ts(1), 100.0)).unwrap();
        // Same timestamp as the entry: ignored even though the stop is crossed
        assert!(s.advance(&candle(1, 100.0, 100.0, 80.0, 90.0), &[]).is_none());
        assert!(s.position().is_some());
    }

    #[test]
    fn peak_updates_after_exit_check() {
        let mut s = sim(frictionless(), Box::new(NoExit));
        s.buy(&Signal::buy(ts(0), 100.0)).unwrap();
        s.advance(&candle(1, 100.0, 112.0, 99.0, 110.0), &[]);
        assert_eq!(s.position().unwrap().peak_price, 112.0);
        s.advance(&candle(2, 110.0, 111.0, 105.0, 106.0), &[]);
        assert_eq!(s.position().unwrap().peak_price, 112.0);
    }

    struct BrokenPolicy;

    impl ExitPolicy for BrokenPolicy {
        fn name(&self) -> &str {
            "broken"
        }

        fn evaluate(&self, _ctx: &ExitContext<'_>) -> ExitDecision {
            ExitDecision::partial(f64::NAN, ExitReason::StopLoss, Some(-3.0))
        }
    }

    #[test]
    fn broken_decisions_are_no_action() {
        let mut s = sim(frictionless(), Box::new(BrokenPolicy));
        s.buy(&Signal::buy(ts(0), 100.0)).unwrap();
        assert!(s.advance(&candle(1, 100.0, 101.0, 99.0, 100.0), &[]).is_none());
        assert!(s.position().is_some());
    }

    #[test]
    fn run_skips_signals_on_the_last_candle() {
        let mut s = sim(frictionless(), Box::new(NoExit));
        let candles = vec![
            candle(0, 100.0, 100.0, 100.0, 100.0),
            candle(1, 100.0, 100.0, 100.0, 100.0),
        ];
        let report = s.run(&[Signal::buy(ts(1), 100.0), Signal::buy(ts(5), 100.0)], &candles);
        assert_eq!(report.signals_seen, 2);
        assert_eq!(report.entries, 0);
        assert_eq!(report.skipped_signals, 2);
        assert!(report.trades.is_empty());
        assert_eq!(report.final_capital, 10_000.0);
    }

    #[test]
    fn signal_before_the_last_candle_still_trades_on_it() {
        let mut s = sim(frictionless(), Box::new(NoExit));
        let candles = vec![
            candle(0, 100.0, 100.0, 100.0, 100.0),
            candle(1, 100.0, 110.0, 100.0, 110.0),
        ];
        let report = s.run(&[Signal::buy(ts(0) + Duration::minutes(30), 100.0)], &candles);
        assert_eq!(report.entries, 1);
        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.trades[0].exit_reason, ExitReason::EndOfPeriod);
        assert_eq!(report.final_capital, 11_000.0);
    }

    #[test]
    fn run_is_repeatable() {
        let mut s = sim(frictionless(), Box::new(FixedExit::new(0.10, -0.05)));
        let candles = vec![
            candle(0, 100.0, 100.0, 100.0, 100.0),
            candle(1, 100.0, 111.0, 99.0, 110.0),
            candle(2, 110.0, 110.0, 110.0, 110.0),
        ];
        let signals = [Signal::buy(ts(0), 100.0)];
        let first = s.run(&signals, &candles);
        let second = s.run(&signals, &candles);
        assert_eq!(first.trades, second.trades);
        assert_eq!(first.final_capital, second.final_capital);
        assert!((first.final_capital - 11_000.0).abs() < 1e-6);
    }
}
