//! Trade: a realized full or partial close.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Why a position (or part of it) was closed.
///
/// Serialized as snake_case strings: `take_profit`, `stop_loss`, `trailing_stop`,
/// `timeout`, `end_of_period`, `profit_tier_{n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    TrailingStop,
    Timeout,
    EndOfPeriod,
    /// Staged partial exit fired by a composite policy (1-based tier).
    ProfitTier(usize),
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TakeProfit => f.write_str("take_profit"),
            Self::StopLoss => f.write_str("stop_loss"),
            Self::TrailingStop => f.write_str("trailing_stop"),
            Self::Timeout => f.write_str("timeout"),
            Self::EndOfPeriod => f.write_str("end_of_period"),
            Self::ProfitTier(n) => write!(f, "profit_tier_{n}"),
        }
    }
}

impl FromStr for ExitReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "take_profit" => Ok(Self::TakeProfit),
            "stop_loss" => Ok(Self::StopLoss),
            "trailing_stop" => Ok(Self::TrailingStop),
            "timeout" => Ok(Self::Timeout),
            "end_of_period" => Ok(Self::EndOfPeriod),
            other => other
                .strip_prefix("profit_tier_")
                .and_then(|n| n.parse().ok())
                .map(Self::ProfitTier)
                .ok_or_else(|| format!("unknown exit reason '{other}'")),
        }
    }
}

impl TryFrom<String> for ExitReason {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExitReason> for String {
    fn from(reason: ExitReason) -> Self {
        reason.to_string()
    }
}

/// A realized close. Immutable once appended to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(with = "super::timestamp")]
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    #[serde(with = "super::timestamp")]
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub quantity: f64,
    /// Net return on the allocated entry cost, in percent.
    pub return_pct: f64,
    /// Net cash gained or lost, fees included.
    pub realized_pnl: f64,
    pub exit_reason: ExitReason,
    /// Entry fee share plus exit fee.
    pub fees: f64,
    /// True when part of the position stayed open after this close.
    pub is_partial: bool,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.return_pct > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.return_pct < 0.0
    }
}
