//! Read-only signal and candle access

pub mod candle_store;
pub mod provider;
pub mod signal_store;

pub use candle_store::{canonicalize, CsvCandleStore, InMemoryCandleStore};
pub use provider::{DataError, PriceSeriesProvider, SignalRepository};
pub use signal_store::{InMemorySignalRepository, JsonSignalRepository, DEFAULT_SIGNAL_PATTERN};
