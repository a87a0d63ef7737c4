//! Simulation engine: replays one signal set over one candle series.
//!
//! A [`TradeSimulator`] owns one sizer, one exit policy, a
//! [`CompoundingLedger`] and at most one open position. Each candle:
//!
//! 1. Exit check: the exit policy sees the position, the candle and all prior candles
//! 2. Peak tracking: the position's peak rises to the candle high
//! 3. Entries: buy signals stamped up to this candle are offered to `buy`
//! 4. Mark-to-market: equity at the close is appended to the curve

pub mod ledger;
pub mod simulator;

pub use ledger::CompoundingLedger;
pub use simulator::{
    EntryRejection, EquityPoint, SimulationReport, SimulatorConfig, TradeSimulator,
};
