use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Written exactly once, when a position's share count reaches zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitRecord {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_rank: u32,
    pub holding_days: i64,
    /// Realized return of the final sale against average cost.
    pub pnl_pct: f64,
}

impl ExitRecord {
    pub fn is_winner(&self) -> bool {
        self.pnl_pct > 0.0
    }
}
