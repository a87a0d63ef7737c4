//! Domain types for SweepLab

pub mod candle;
pub mod position;
pub mod signal;
pub mod timestamp;
pub mod trade;

pub use candle::{Candle, Timeframe};
pub use position::PositionState;
pub use signal::{Signal, SignalAction, SignalFile, SignalFileMetadata};
pub use trade::{ExitReason, Trade};
