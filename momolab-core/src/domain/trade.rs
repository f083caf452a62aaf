//! Trade and turnover records: the append-only execution log.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single executed fill.
///
/// `notional` is `shares × price` before costs; `slippage_cost` is
/// `notional × slippage_rate`. Buys pay `notional + slippage_cost`, sells
/// receive `notional − slippage_cost`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub symbol: String,
    pub side: Side,
    pub shares: f64,
    pub price: f64,
    pub notional: f64,
    pub slippage_cost: f64,
    pub cash_after: f64,
}

impl TradeRecord {
    /// Signed change in cash caused by this fill.
    pub fn cash_delta(&self) -> f64 {
        match self.side {
            Side::Buy => -(self.notional + self.slippage_cost),
            Side::Sell => self.notional - self.slippage_cost,
        }
    }
}

/// Gross notional traded on one rebalance date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnoverRecord {
    pub date: NaiveDate,
    pub turnover: f64,
    /// Turnover over the day's marked portfolio value (0 if that value is 0).
    pub turnover_pct: f64,
}
