//! Mutable portfolio state and the output of a simulation run.

use serde::{Deserialize, Serialize};

use crate::domain::{EquitySnapshot, ExitRecord, Position, TradeRecord, TurnoverRecord};
use crate::engine::ledger::PositionLedger;

/// State that evolves day by day during a run.
#[derive(Debug, Clone)]
pub struct PortfolioState {
    pub cash: f64,
    pub ledger: PositionLedger,
    /// Running maximum of marked portfolio value; starts at initial capital.
    pub peak_equity: f64,
    pub exposure: f64,
    pub cooldown_counter: u32,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            ledger: PositionLedger::new(),
            peak_equity: initial_capital,
            exposure: 1.0,
            cooldown_counter: 0,
        }
    }
}

/// Everything a run produces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub equity: Vec<EquitySnapshot>,
    pub trades: Vec<TradeRecord>,
    pub turnover: Vec<TurnoverRecord>,
    pub exits: Vec<ExitRecord>,
    /// Positions still held after the last calendar day.
    pub open_positions: Vec<Position>,
}

impl SimulationOutput {
    pub fn final_value(&self) -> Option<f64> {
        self.equity.last().map(|s| s.portfolio_value)
    }

    pub fn total_slippage(&self) -> f64 {
        self.trades.iter().map(|t| t.slippage_cost).sum()
    }
}
