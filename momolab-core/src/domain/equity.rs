use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// End-of-day portfolio mark. One per trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub date: NaiveDate,
    pub portfolio_value: f64,
    pub cash: f64,
    pub invested: f64,
    pub benchmark_price: Option<f64>,
    /// `portfolio_value / peak_equity − 1`, always ≤ 0.
    pub drawdown: f64,
    pub exposure: f64,
}
