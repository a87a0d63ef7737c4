//! Market regime classification from recent candles.
//!
//! Trend strength is the distance of the last close from its simple moving
//! average; volatility is the sample standard deviation of close-to-close
//! returns. Both use the last `lookback` candles (plus one for the first return).

use serde::{Deserialize, Serialize};

use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendRegime {
    Bull,
    Sideways,
    Bear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityRegime {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketRegime {
    pub trend: TrendRegime,
    pub volatility: VolatilityRegime,
    /// (close - SMA) / SMA
    pub trend_strength: f64,
    /// Sample stdev of close-to-close returns.
    pub realized_volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeClassifier {
    pub lookback: usize,
    /// |trend_strength| above this is a trend.
    pub trend_threshold: f64,
    /// Realized volatility above this is high volatility.
    pub volatility_threshold: f64,
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self {
            lookback: 20,
            trend_threshold: 0.02,
            volatility_threshold: 0.03,
        }
    }
}

impl RegimeClassifier {
    /// Classify from `history` (oldest first). `None` when there are fewer
    /// than `lookback + 1` candles or prices are degenerate.
    pub fn classify(&self, history: &[Candle]) -> Option<MarketRegime> {
        if self.lookback < 2 || history.len() < self.lookback + 1 {
            return None;
        }
        let window = &history[history.len() - self.lookback - 1..];
        let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
        if closes.iter().any(|c| !(c.is_finite() && *c > 0.0)) {
            return None;
        }

        let recent = &closes[1..];
        let sma = recent.iter().sum::<f64>() / recent.len() as f64;
        let last = *recent.last()?;
        let trend_strength = (last - sma) / sma;

        let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance =
            returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
        let realized_volatility = variance.sqrt();

        let trend = if trend_strength > self.trend_threshold {
            TrendRegime::Bull
        } else if trend_strength < -self.trend_threshold {
            TrendRegime::Bear
        } else {
            TrendRegime::Sideways
        };
        let volatility = if realized_volatility > self.volatility_threshold {
            VolatilityRegime::High
        } else {
            VolatilityRegime::Low
        };

        Some(MarketRegime {
            trend,
            volatility,
            trend_strength,
            realized_volatility,
        })
    }
}
