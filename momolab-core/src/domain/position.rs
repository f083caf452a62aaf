use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An open long position, pooled at average cost.
///
/// Every buy into an existing position blends into a single `cost_basis`;
/// there is no per-lot tracking. `entry_date` and `entry_rank` describe the
/// purchase that opened the position and survive later top-ups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub shares: f64,
    /// Total paid for the shares still held, slippage included.
    pub cost_basis: f64,
    pub entry_date: NaiveDate,
    pub entry_rank: u32,
}

impl Position {
    pub fn new(
        symbol: impl Into<String>,
        shares: f64,
        cost_basis: f64,
        entry_date: NaiveDate,
        entry_rank: u32,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            shares,
            cost_basis,
            entry_date,
            entry_rank,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.shares == 0.0
    }

    /// Average cost per share. `None` for a flat position.
    pub fn avg_cost(&self) -> Option<f64> {
        if self.shares > 0.0 {
            Some(self.cost_basis / self.shares)
        } else {
            None
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares * price
    }

    /// Unrealized return against average cost, e.g. 0.08 = +8%.
    pub fn unrealized_pnl_pct(&self, price: f64) -> Option<f64> {
        self.avg_cost()
            .filter(|avg| *avg > 0.0)
            .map(|avg| price / avg - 1.0)
    }
}
