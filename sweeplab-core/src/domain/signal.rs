//! Signal: an externally generated entry event, and the per-year signal file.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Signal action. Only buys open positions; other actions present in a file
/// are carried through deserialization and ignored by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignalAction {
    Buy,
    Sell,
    Other,
}

impl From<String> for SignalAction {
    fn from(raw: String) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "BUY" => Self::Buy,
            "SELL" => Self::Sell,
            _ => Self::Other,
        }
    }
}

impl From<SignalAction> for String {
    fn from(action: SignalAction) -> Self {
        match action {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::Other => "OTHER",
        }
        .to_string()
    }
}

/// A single buy event produced by an upstream signal generator.
///
/// Immutable once loaded. Unique per (strategy, timestamp) and ordered ascending
/// within a [`SignalFile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(with = "super::timestamp")]
    pub timestamp: NaiveDateTime,
    pub action: SignalAction,
    /// Reference price. Files may store integers (KRW-style prices) or floats.
    pub price: f64,
    #[serde(default)]
    pub score: f64,
    /// Confidence on a 0–100 scale.
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Signal {
    /// Convenience constructor for a BUY signal with empty metadata.
    pub fn buy(timestamp: NaiveDateTime, price: f64) -> Self {
        Self {
            timestamp,
            action: SignalAction::Buy,
            price,
            score: 0.0,
            confidence: 0.0,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn is_buy(&self) -> bool {
        self.action == SignalAction::Buy
    }
}

/// Header block of a signal file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalFileMetadata {
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub timeframe: String,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub statistics: BTreeMap<String, serde_json::Value>,
}

/// One strategy-year of signals, as written by the signal generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalFile {
    #[serde(default)]
    pub metadata: SignalFileMetadata,
    pub signals: Vec<Signal>,
}

impl SignalFile {
    /// Buy signals sorted ascending by timestamp, keeping the first signal at
    /// each timestamp.
    pub fn normalized_buys(&self) -> Vec<Signal> {
        let mut buys: Vec<Signal> = self.signals.iter().filter(|s| s.is_buy()).cloned().collect();
        buys.sort_by_key(|s| s.timestamp);
        buys.dedup_by_key(|s| s.timestamp);
        buys
    }
}
