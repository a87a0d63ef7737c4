//! Performance evaluation: pure functions from a trade list to statistics.
//!
//! Every metric is a pure function: trades (and initial capital) in, scalar
//! out. Percent-valued outputs are on the 0–100 scale. Degenerate inputs
//! (no trades, one trade, zero variance, no losers) yield 0, never NaN.

use serde::{Deserialize, Serialize};

use crate::domain::Trade;

/// Statistics for one (year, parameterization) cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub total_return_pct: f64,
    /// Percent of trades with a positive return.
    pub win_rate: f64,
    /// Mean per-trade return, percent.
    pub avg_return: f64,
    /// Per-trade mean / sample stdev of returns, not annualized.
    pub sharpe_ratio: f64,
    /// Largest peak-to-trough decline of the realized equity curve, percent (≥ 0).
    pub max_drawdown: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    #[serde(default)]
    pub avg_win_pct: f64,
    #[serde(default)]
    pub avg_loss_pct: f64,
    #[serde(default)]
    pub max_consecutive_losses: usize,
    #[serde(default)]
    pub final_capital: f64,
}

impl SweepResult {
    /// Evaluate `trades` starting from `initial_capital`.
    pub fn evaluate(trades: &[Trade], initial_capital: f64) -> Self {
        let ordered = chronological(trades);
        let curve = equity_curve(&ordered, initial_capital);
        let final_capital = curve.last().copied().unwrap_or(initial_capital);
        let returns: Vec<f64> = ordered.iter().map(|t| t.return_pct).collect();

        Self {
            total_return_pct: total_return_pct(initial_capital, final_capital),
            win_rate: win_rate(&ordered),
            avg_return: mean_f64(&returns),
            sharpe_ratio: sharpe_ratio(&returns),
            max_drawdown: max_drawdown_pct(&curve),
            profit_factor: profit_factor(&ordered),
            trade_count: ordered.len(),
            avg_win_pct: avg_win_pct(&ordered),
            avg_loss_pct: avg_loss_pct(&ordered),
            max_consecutive_losses: max_consecutive_losses(&ordered),
            final_capital,
        }
    }
}

/// Shorthand for [`SweepResult::evaluate`].
pub fn evaluate(trades: &[Trade], initial_capital: f64) -> SweepResult {
    SweepResult::evaluate(trades, initial_capital)
}

// ─── Individual metric functions ────────────────────────────────────

/// Trades sorted by exit time; ties keep their original order.
pub fn chronological(trades: &[Trade]) -> Vec<Trade> {
    let mut ordered = trades.to_vec();
    ordered.sort_by_key(|t| t.exit_time);
    ordered
}

/// Realized equity after each trade, starting with `initial_capital`.
pub fn equity_curve(trades: &[Trade], initial_capital: f64) -> Vec<f64> {
    let mut curve = Vec::with_capacity(trades.len() + 1);
    let mut equity = initial_capital;
    curve.push(equity);
    for trade in trades {
        equity += trade.realized_pnl;
        curve.push(equity);
    }
    curve
}

/// (final - initial) / initial, in percent.
pub fn total_return_pct(initial_capital: f64, final_capital: f64) -> f64 {
    if initial_capital <= 0.0 {
        return 0.0;
    }
    (final_capital - initial_capital) / initial_capital * 100.0
}

/// Percent of trades that were winners.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64 * 100.0
}

/// Mean over sample stdev of per-trade returns.
///
/// Returns 0.0 with fewer than 2 trades or zero variance.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) / std
}

/// Maximum drawdown as a positive percentage (15.0 = 15% drawdown).
pub fn max_drawdown_pct(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak * 100.0);
        }
    }
    max_dd
}

/// Gross profit / gross loss. 0.0 when there are no losing trades.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.realized_pnl > 0.0)
        .map(|t| t.realized_pnl)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.realized_pnl < 0.0)
        .map(|t| t.realized_pnl.abs())
        .sum();
    if gross_loss < 1e-10 {
        return 0.0;
    }
    gross_profit / gross_loss
}

pub fn avg_win_pct(trades: &[Trade]) -> f64 {
    let wins: Vec<f64> = trades
        .iter()
        .filter(|t| t.is_winner())
        .map(|t| t.return_pct)
        .collect();
    mean_f64(&wins)
}

/// Mean return of losing trades (negative, or 0.0 without losers).
pub fn avg_loss_pct(trades: &[Trade]) -> f64 {
    let losses: Vec<f64> = trades
        .iter()
        .filter(|t| t.is_loser())
        .map(|t| t.return_pct)
        .collect();
    mean_f64(&losses)
}

pub fn max_consecutive_losses(trades: &[Trade]) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_loser() {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

// ─── Helpers ────────────────────────────────────────────────────────

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
