//! Average-cost position ledger.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{ExitRecord, Position};

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("no open position in {0}")]
    UnknownSymbol(String),

    #[error("cannot sell {requested} shares of {symbol}, only {held} held")]
    Oversell {
        symbol: String,
        requested: f64,
        held: f64,
    },

    #[error("share quantity must be positive and finite, got {0}")]
    InvalidShares(f64),
}

/// Result of a successful `reduce`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub avg_cost: f64,
    pub pnl_pct: f64,
    /// Present when the sale brought the position to zero shares.
    pub exit: Option<ExitRecord>,
}

/// Open positions keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    positions: BTreeMap<String, Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buy into `symbol`. A fresh lot records `date` and `rank` as its entry
    /// metadata; a buy into an existing lot pools cost and keeps them.
    pub fn open_or_add(
        &mut self,
        symbol: &str,
        shares: f64,
        cost: f64,
        date: NaiveDate,
        rank: u32,
    ) -> Result<(), LedgerError> {
        if !(shares.is_finite() && shares > 0.0) {
            return Err(LedgerError::InvalidShares(shares));
        }
        let pos = self
            .positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position::new(symbol, 0.0, 0.0, date, rank));
        if pos.is_flat() {
            pos.entry_date = date;
            pos.entry_rank = rank;
        }
        pos.shares += shares;
        pos.cost_basis += cost;
        Ok(())
    }

    /// Sell `shares` of `symbol` at `sale_price`. State is untouched on error.
    pub fn reduce(
        &mut self,
        symbol: &str,
        shares: f64,
        sale_price: f64,
        date: NaiveDate,
    ) -> Result<Reduction, LedgerError> {
        if !(shares.is_finite() && shares > 0.0) {
            return Err(LedgerError::InvalidShares(shares));
        }
        let pos = self
            .positions
            .get_mut(symbol)
            .ok_or_else(|| LedgerError::UnknownSymbol(symbol.to_string()))?;
        if shares > pos.shares {
            return Err(LedgerError::Oversell {
                symbol: symbol.to_string(),
                requested: shares,
                held: pos.shares,
            });
        }

        let avg_cost = pos.cost_basis / pos.shares;
        let pnl_pct = if avg_cost > 0.0 {
            sale_price / avg_cost - 1.0
        } else {
            0.0
        };
        pos.shares -= shares;
        pos.cost_basis -= avg_cost * shares;

        let exit = if pos.shares == 0.0 {
            self.positions.remove(symbol).map(|closed| ExitRecord {
                symbol: closed.symbol,
                entry_date: closed.entry_date,
                exit_date: date,
                entry_rank: closed.entry_rank,
                holding_days: (date - closed.entry_date).num_days(),
                pnl_pct,
            })
        } else {
            None
        };

        Ok(Reduction {
            avg_cost,
            pnl_pct,
            exit,
        })
    }

    /// Sell the whole position.
    pub fn close(
        &mut self,
        symbol: &str,
        sale_price: f64,
        date: NaiveDate,
    ) -> Result<Reduction, LedgerError> {
        let shares = self
            .positions
            .get(symbol)
            .map(|p| p.shares)
            .ok_or_else(|| LedgerError::UnknownSymbol(symbol.to_string()))?;
        self.reduce(symbol, shares, sale_price, date)
    }

    /// Drop every position without realizing it.
    pub fn clear(&mut self) {
        self.positions.clear();
    }

    pub fn get(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn pooled_buys_keep_first_entry_metadata() {
        let mut ledger = PositionLedger::new();
        ledger.open_or_add("TCS", 10.0, 1_000.0, d(2), 4).unwrap();
        ledger.open_or_add("TCS", 10.0, 1_200.0, d(9), 1).unwrap();

        let pos = ledger.get("TCS").unwrap();
        assert_eq!(pos.shares, 20.0);
        assert_eq!(pos.cost_basis, 2_200.0);
        assert_eq!(pos.entry_date, d(2));
        assert_eq!(pos.entry_rank, 4);
    }

    #[test]
    fn partial_sell_preserves_average_cost() {
        let mut ledger = PositionLedger::new();
        ledger.open_or_add("TCS", 20.0, 2_000.0, d(2), 1).unwrap();

        let red = ledger.reduce("TCS", 5.0, 120.0, d(9)).unwrap();
        assert_eq!(red.avg_cost, 100.0);
        assert!((red.pnl_pct - 0.2).abs() < 1e-12);
        assert!(red.exit.is_none());

        let pos = ledger.get("TCS").unwrap();
        assert_eq!(pos.shares, 15.0);
        assert_eq!(pos.cost_basis, 1_500.0);
        assert_eq!(pos.avg_cost(), Some(100.0));
    }

    #[test]
    fn full_sell_emits_exit_and_removes() {
        let mut ledger = PositionLedger::new();
        ledger.open_or_add("TCS", 10.0, 1_000.0, d(2), 3).unwrap();

        let red = ledger.close("TCS", 90.0, d(16)).unwrap();
        let exit = red.exit.unwrap();
        assert_eq!(exit.symbol, "TCS");
        assert_eq!(exit.entry_date, d(2));
        assert_eq!(exit.exit_date, d(16));
        assert_eq!(exit.entry_rank, 3);
        assert_eq!(exit.holding_days, 14);
        assert!((exit.pnl_pct + 0.1).abs() < 1e-12);
        assert!(!ledger.contains("TCS"));
    }

    #[test]
    fn oversell_and_unknown_are_errors_without_mutation() {
        let mut ledger = PositionLedger::new();
        ledger.open_or_add("TCS", 10.0, 1_000.0, d(2), 1).unwrap();

        let err = ledger.reduce("TCS", 11.0, 100.0, d(3)).unwrap_err();
        assert!(matches!(err, LedgerError::Oversell { .. }));
        assert_eq!(ledger.get("TCS").unwrap().shares, 10.0);

        assert_eq!(
            ledger.reduce("INFY", 1.0, 100.0, d(3)),
            Err(LedgerError::UnknownSymbol("INFY".into()))
        );
        assert_eq!(
            ledger.open_or_add("TCS", 0.0, 0.0, d(3), 1),
            Err(LedgerError::InvalidShares(0.0))
        );
    }

    #[test]
    fn clear_drops_everything() {
        let mut ledger = PositionLedger::new();
        ledger.open_or_add("A", 1.0, 10.0, d(2), 1).unwrap();
        ledger.open_or_add("B", 1.0, 10.0, d(2), 2).unwrap();
        ledger.clear();
        assert!(ledger.is_empty());
    }
}
