//! SweepLab Core: domain types, data access, sizing and exit policies,
//! compounding simulator, and performance evaluation.
//!
//! This crate contains the heart of the evaluation engine:
//! - Domain types (candles, signals, positions, trades)
//! - Signal repositories and candle stores behind provider traits
//! - Position sizers (fixed, Kelly, score-based)
//! - Exit policies (fixed, regime-driven, trailing, timeout, composite)
//! - Typed policy configs and factories
//! - Single-position compounding simulator
//! - Pure performance metrics

pub mod data;
pub mod domain;
pub mod engine;
pub mod exits;
pub mod factory;
pub mod metrics;
pub mod sizers;

pub use engine::{SimulationReport, SimulatorConfig, TradeSimulator};
pub use factory::{
    create_exit_policy, create_sizer, ExitPolicyConfig, FactoryError, PositionSizingConfig,
    StageConfig,
};
pub use metrics::SweepResult;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything a sweep worker touches is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Candle>();
        require_sync::<domain::Candle>();
        require_send::<domain::Signal>();
        require_sync::<domain::Signal>();
        require_send::<domain::SignalFile>();
        require_sync::<domain::SignalFile>();
        require_send::<domain::PositionState>();
        require_sync::<domain::PositionState>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();

        // Policies
        require_send::<Box<dyn sizers::PositionSizer>>();
        require_sync::<Box<dyn sizers::PositionSizer>>();
        require_send::<Box<dyn exits::ExitPolicy>>();
        require_sync::<Box<dyn exits::ExitPolicy>>();
        require_send::<ExitPolicyConfig>();
        require_sync::<ExitPolicyConfig>();

        // Engine and results
        require_send::<TradeSimulator>();
        require_sync::<TradeSimulator>();
        require_send::<SweepResult>();
        require_sync::<SweepResult>();

        // Providers
        require_send::<data::JsonSignalRepository>();
        require_sync::<data::JsonSignalRepository>();
        require_send::<data::CsvCandleStore>();
        require_sync::<data::CsvCandleStore>();
    }
}
