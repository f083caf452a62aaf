//! Multi-symbol price panel on a shared trading calendar.
//!
//! Given daily rows for many symbols, align them to the union of their dates.
//! Gaps are forward-filled per symbol: once a symbol has printed, every later
//! date carries its last close and trade reference price. Before the first
//! row both are `None`.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// One parsed price row.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub symbol: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
}

impl PriceRow {
    pub fn close_only(date: NaiveDate, symbol: impl Into<String>, close: f64) -> Self {
        Self {
            date,
            symbol: symbol.into(),
            open: None,
            high: None,
            low: None,
            close: Some(close),
        }
    }

    /// Mean of open/high/low/close when all four are present, else the close.
    pub fn trade_price(&self) -> Option<f64> {
        match (finite(self.open), finite(self.high), finite(self.low), finite(self.close)) {
            (Some(o), Some(h), Some(l), Some(c)) => Some((o + h + l + c) / 4.0),
            (_, _, _, close) => close,
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Errors raised while building a panel.
#[derive(Debug, Error, PartialEq)]
pub enum PanelError {
    #[error("price panel is empty: no rows were supplied")]
    Empty,

    #[error("duplicate price row for '{symbol}' on {date}")]
    DuplicateRow { symbol: String, date: NaiveDate },
}

/// Forward-filled close and trade-price columns per symbol.
#[derive(Debug, Clone)]
pub struct PricePanel {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    close: HashMap<String, Vec<Option<f64>>>,
    trade: HashMap<String, Vec<Option<f64>>>,
}

impl PricePanel {
    /// Build a panel from rows in any order.
    pub fn from_rows(rows: Vec<PriceRow>) -> Result<Self, PanelError> {
        if rows.is_empty() {
            return Err(PanelError::Empty);
        }

        let mut all_dates = BTreeSet::new();
        let mut by_symbol: BTreeMap<String, HashMap<NaiveDate, (Option<f64>, Option<f64>)>> =
            BTreeMap::new();

        for row in rows {
            all_dates.insert(row.date);
            let points = by_symbol.entry(row.symbol.clone()).or_default();
            let values = (finite(row.close), row.trade_price());
            if points.insert(row.date, values).is_some() {
                return Err(PanelError::DuplicateRow {
                    symbol: row.symbol,
                    date: row.date,
                });
            }
        }

        let dates: Vec<NaiveDate> = all_dates.into_iter().collect();
        let mut close = HashMap::with_capacity(by_symbol.len());
        let mut trade = HashMap::with_capacity(by_symbol.len());

        for (symbol, points) in &by_symbol {
            let mut last_close = None;
            let mut last_trade = None;
            let mut close_col = Vec::with_capacity(dates.len());
            let mut trade_col = Vec::with_capacity(dates.len());

            for date in &dates {
                if let Some((c, t)) = points.get(date) {
                    if c.is_some() {
                        last_close = *c;
                    }
                    if t.is_some() {
                        last_trade = *t;
                    }
                }
                close_col.push(last_close);
                trade_col.push(last_trade);
            }

            close.insert(symbol.clone(), close_col);
            trade.insert(symbol.clone(), trade_col);
        }

        Ok(Self {
            dates,
            symbols: by_symbol.into_keys().collect(),
            close,
            trade,
        })
    }

    /// The shared trading calendar, ascending.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Symbols in the panel, sorted.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Forward-filled close for `symbol` on calendar day `day`.
    pub fn close(&self, symbol: &str, day: usize) -> Option<f64> {
        self.close.get(symbol)?.get(day).copied().flatten()
    }

    /// Forward-filled trade reference price for `symbol` on calendar day `day`.
    pub fn trade_price(&self, symbol: &str, day: usize) -> Option<f64> {
        self.trade.get(symbol)?.get(day).copied().flatten()
    }

    /// Cross-sectional mean of each symbol's trailing return volatility.
    ///
    /// For every day, each symbol contributes the sample standard deviation
    /// of its last `lookback` daily close-to-close returns, provided all of
    /// them are defined. Days where no symbol qualifies are `None`.
    pub fn mean_realized_vol(&self, lookback: usize) -> Vec<Option<f64>> {
        let n = self.dates.len();
        let mut sums = vec![0.0_f64; n];
        let mut counts = vec![0_usize; n];

        if lookback >= 2 {
            for symbol in &self.symbols {
                let returns = self.daily_returns(symbol);
                for day in lookback..n {
                    let window = &returns[day + 1 - lookback..=day];
                    if let Some(std) = sample_std(window) {
                        sums[day] += std;
                        counts[day] += 1;
                    }
                }
            }
        }

        sums.into_iter()
            .zip(counts)
            .map(|(sum, count)| (count > 0).then(|| sum / count as f64))
            .collect()
    }

    fn daily_returns(&self, symbol: &str) -> Vec<Option<f64>> {
        let Some(closes) = self.close.get(symbol) else {
            return vec![None; self.dates.len()];
        };
        let mut returns = Vec::with_capacity(closes.len());
        returns.push(None);
        for pair in closes.windows(2) {
            let r = match (pair[0], pair[1]) {
                (Some(prev), Some(curr)) if prev > 0.0 => Some(curr / prev - 1.0),
                _ => None,
            };
            returns.push(r);
        }
        returns
    }
}

/// Sample standard deviation (n − 1); `None` if any value is missing.
fn sample_std(window: &[Option<f64>]) -> Option<f64> {
    if window.len() < 2 {
        return None;
    }
    let values: Vec<f64> = window.iter().copied().collect::<Option<Vec<f64>>>()?;
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}
