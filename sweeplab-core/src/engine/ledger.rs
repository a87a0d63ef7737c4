use crate::domain::{PositionState, Trade};

/// Cash and realized-trade tracker for one simulation window.
///
/// Every entry is sized from the current `cash`, so gains and losses compound
/// from trade to trade.
#[derive(Debug, Clone)]
pub struct CompoundingLedger {
    initial_capital: f64,
    cash: f64,
    fees_paid: f64,
    trades: Vec<Trade>,
}

impl CompoundingLedger {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            fees_paid: 0.0,
            trades: Vec::new(),
        }
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }

    /// Realized trades, oldest first.
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }

    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.realized_pnl).sum()
    }

    /// Take `amount` out of cash for an entry.
    pub fn debit(&mut self, amount: f64) {
        self.cash -= amount;
    }

    /// Book a realized close: credit the net proceeds and append the trade.
    pub fn record(&mut self, proceeds: f64, trade: Trade) {
        self.cash += proceeds;
        self.fees_paid += trade.fees;
        self.trades.push(trade);
    }

    /// Cash plus the open position marked at `mark`.
    pub fn equity(&self, position: Option<&PositionState>, mark: f64) -> f64 {
        self.cash + position.map_or(0.0, |p| p.market_value(mark))
    }

    pub fn reset(&mut self) {
        self.cash = self.initial_capital;
        self.fees_paid = 0.0;
        self.trades.clear();
    }
}
