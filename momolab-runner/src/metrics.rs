//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function over the simulator's output series.
//! Degenerate inputs (empty series, zero span, zero variance) yield `None`
//! rather than an error or a sentinel value.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use momolab_core::domain::{EquitySnapshot, ExitRecord, Side, TradeRecord, TurnoverRecord};
use momolab_core::engine::SimulationOutput;
use serde::{Deserialize, Serialize};

const DAYS_PER_YEAR: f64 = 365.25;
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Trailing-return windows in calendar days, labelled as in reports.
pub const TRAILING_WINDOWS: [(&str, i64); 5] =
    [("1m", 30), ("3m", 90), ("6m", 180), ("1y", 365), ("3y", 1095)];

/// Return over one trailing window, for the portfolio and its benchmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrailingReturn {
    pub portfolio: Option<f64>,
    pub benchmark: Option<f64>,
}

/// Realized P&L of one symbol over the run, in currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolPnl {
    pub symbol: String,
    pub pnl: f64,
}

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: Option<f64>,
    pub cagr: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub longest_drawdown_days: Option<usize>,
    pub avg_turnover_pct: Option<f64>,
    pub max_turnover_pct: Option<f64>,
    pub annualized_turnover: Option<f64>,
    pub cost_drag: Option<f64>,
    pub avg_holding_days: Option<f64>,
    pub median_holding_days: Option<f64>,
    pub hit_rate_overall: Option<f64>,
    pub hit_rate_by_quintile: [Option<f64>; 5],
    pub trades_per_week: Option<f64>,
    pub trades_per_month: Option<f64>,
    pub trades_per_year: Option<f64>,
    pub benchmark_return: Option<f64>,
    pub benchmark_cagr: Option<f64>,
    pub benchmark_volatility: Option<f64>,
    pub annualized_volatility: Option<f64>,
    pub sharpe: Option<f64>,
    /// One entry per `TRAILING_WINDOWS` window, in the same order.
    pub trailing_returns: [TrailingReturn; 5],
    /// Realized P&L per sold symbol, best first.
    pub symbol_pnl: Vec<SymbolPnl>,
    pub trade_count: usize,
    pub exit_count: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl PerformanceMetrics {
    /// Compute all metrics from a run's output.
    pub fn compute(output: &SimulationOutput, initial_capital: f64, top_n: usize) -> Self {
        let values: Vec<f64> = output.equity.iter().map(|s| s.portfolio_value).collect();
        let span = span_days(&output.equity);
        let cagr = cagr(&values, span);
        let vol = annualized_volatility(&values);
        let portfolio_series: Vec<(NaiveDate, f64)> =
            output.equity.iter().map(|s| (s.date, s.portfolio_value)).collect();
        let benchmark_series = benchmark_series(&output.equity);
        let benchmark_values: Vec<f64> = benchmark_series.iter().map(|(_, v)| *v).collect();

        Self {
            total_return: total_return(&values),
            cagr,
            max_drawdown: max_drawdown(&values),
            longest_drawdown_days: longest_drawdown(&values),
            avg_turnover_pct: avg_turnover_pct(&output.turnover),
            max_turnover_pct: max_turnover_pct(&output.turnover),
            annualized_turnover: annualized_turnover(&output.turnover, initial_capital, span),
            cost_drag: cost_drag(output.total_slippage(), initial_capital),
            avg_holding_days: avg_holding_days(&output.exits),
            median_holding_days: median_holding_days(&output.exits),
            hit_rate_overall: hit_rate(&output.exits),
            hit_rate_by_quintile: hit_rate_by_quintile(&output.exits, top_n),
            trades_per_week: trade_frequency(output.trades.len(), span, 7.0),
            trades_per_month: trade_frequency(output.trades.len(), span, DAYS_PER_YEAR / 12.0),
            trades_per_year: trade_frequency(output.trades.len(), span, DAYS_PER_YEAR),
            benchmark_return: benchmark_return(&output.equity),
            benchmark_cagr: self::cagr(&benchmark_values, series_span(&benchmark_series)),
            benchmark_volatility: annualized_volatility(&benchmark_values),
            annualized_volatility: vol,
            sharpe: sharpe(cagr, vol),
            trailing_returns: TRAILING_WINDOWS.map(|(_, days)| TrailingReturn {
                portfolio: trailing_return(&portfolio_series, days),
                benchmark: trailing_return(&benchmark_series, days),
            }),
            symbol_pnl: symbol_pnl(&output.trades),
            trade_count: output.trades.len(),
            exit_count: output.exits.len(),
            start_date: output.equity.first().map(|s| s.date),
            end_date: output.equity.last().map(|s| s.date),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Calendar days between the first and last snapshot.
pub fn span_days(equity: &[EquitySnapshot]) -> Option<i64> {
    match (equity.first(), equity.last()) {
        (Some(first), Some(last)) => Some((last.date - first.date).num_days()),
        _ => None,
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Total return as a fraction: last / first − 1.
pub fn total_return(values: &[f64]) -> Option<f64> {
    let (&first, &last) = (values.first()?, values.last()?);
    if values.len() < 2 || first <= 0.0 {
        return None;
    }
    finite(last / first - 1.0)
}

/// Compound annual growth rate over a calendar-day span.
pub fn cagr(values: &[f64], span_days: Option<i64>) -> Option<f64> {
    let span = span_days.filter(|d| *d > 0)?;
    let total = total_return(values)?;
    finite((1.0 + total).powf(DAYS_PER_YEAR / span as f64) - 1.0)
}

/// Maximum drawdown as a non-positive fraction (e.g. −0.15).
pub fn max_drawdown(values: &[f64]) -> Option<f64> {
    let drawdowns = drawdown_series(values);
    if drawdowns.is_empty() {
        return None;
    }
    Some(drawdowns.into_iter().fold(0.0_f64, f64::min))
}

/// Longest run of consecutive snapshots below the running peak.
pub fn longest_drawdown(values: &[f64]) -> Option<usize> {
    if values.is_empty() {
        return None;
    }
    let mut longest = 0;
    let mut current = 0;
    for dd in drawdown_series(values) {
        if dd < 0.0 {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    Some(longest)
}

fn drawdown_series(values: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    values
        .iter()
        .map(|&v| {
            peak = peak.max(v);
            if peak > 0.0 {
                v / peak - 1.0
            } else {
                0.0
            }
        })
        .collect()
}

pub fn avg_turnover_pct(turnover: &[TurnoverRecord]) -> Option<f64> {
    mean(turnover.iter().map(|t| t.turnover_pct))
}

pub fn max_turnover_pct(turnover: &[TurnoverRecord]) -> Option<f64> {
    turnover
        .iter()
        .map(|t| t.turnover_pct)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
}

/// Total traded notional over initial capital, per year of span.
pub fn annualized_turnover(
    turnover: &[TurnoverRecord],
    initial_capital: f64,
    span_days: Option<i64>,
) -> Option<f64> {
    let span = span_days.filter(|d| *d > 0)?;
    if initial_capital <= 0.0 {
        return None;
    }
    let total: f64 = turnover.iter().map(|t| t.turnover).sum();
    let years = span as f64 / DAYS_PER_YEAR;
    finite(total / initial_capital / years)
}

/// Total slippage paid as a fraction of initial capital.
pub fn cost_drag(total_slippage: f64, initial_capital: f64) -> Option<f64> {
    if initial_capital <= 0.0 {
        return None;
    }
    finite(total_slippage / initial_capital)
}

pub fn avg_holding_days(exits: &[ExitRecord]) -> Option<f64> {
    mean(exits.iter().map(|e| e.holding_days as f64))
}

pub fn median_holding_days(exits: &[ExitRecord]) -> Option<f64> {
    let mut days: Vec<i64> = exits.iter().map(|e| e.holding_days).collect();
    if days.is_empty() {
        return None;
    }
    days.sort_unstable();
    let mid = days.len() / 2;
    Some(if days.len() % 2 == 0 {
        (days[mid - 1] + days[mid]) as f64 / 2.0
    } else {
        days[mid] as f64
    })
}

/// Fraction of closed positions with positive pnl.
pub fn hit_rate(exits: &[ExitRecord]) -> Option<f64> {
    if exits.is_empty() {
        return None;
    }
    let winners = exits.iter().filter(|e| e.is_winner()).count();
    Some(winners as f64 / exits.len() as f64)
}

/// Quintile of `[1, top_n]` an entry rank falls in, 0-based.
pub fn quintile(entry_rank: u32, top_n: usize) -> usize {
    if top_n == 0 {
        return 0;
    }
    let offset = (entry_rank.max(1) - 1) as usize;
    (offset * 5 / top_n).min(4)
}

/// Hit rate per entry-rank quintile. Empty quintiles are `None`.
pub fn hit_rate_by_quintile(exits: &[ExitRecord], top_n: usize) -> [Option<f64>; 5] {
    let mut wins = [0usize; 5];
    let mut totals = [0usize; 5];
    for exit in exits {
        let q = quintile(exit.entry_rank, top_n);
        totals[q] += 1;
        if exit.is_winner() {
            wins[q] += 1;
        }
    }
    std::array::from_fn(|q| (totals[q] > 0).then(|| wins[q] as f64 / totals[q] as f64))
}

/// Trades per period of `period_days` calendar days.
pub fn trade_frequency(trade_count: usize, span_days: Option<i64>, period_days: f64) -> Option<f64> {
    let span = span_days.filter(|d| *d > 0)?;
    finite(trade_count as f64 / (span as f64 / period_days))
}

/// Benchmark return between its first and last defined price.
pub fn benchmark_return(equity: &[EquitySnapshot]) -> Option<f64> {
    let first = equity.iter().find_map(|s| s.benchmark_price)?;
    let last = equity.iter().rev().find_map(|s| s.benchmark_price)?;
    if first <= 0.0 {
        return None;
    }
    finite(last / first - 1.0)
}

/// Snapshots with a defined benchmark price, as `(date, price)`.
pub fn benchmark_series(equity: &[EquitySnapshot]) -> Vec<(NaiveDate, f64)> {
    equity
        .iter()
        .filter_map(|s| s.benchmark_price.map(|p| (s.date, p)))
        .collect()
}

fn series_span(series: &[(NaiveDate, f64)]) -> Option<i64> {
    let (first, last) = (series.first()?, series.last()?);
    Some((last.0 - first.0).num_days())
}

/// Return over the points dated within `days` calendar days of the last one.
///
/// Needs at least two points in the window.
pub fn trailing_return(series: &[(NaiveDate, f64)], days: i64) -> Option<f64> {
    let end = series.last()?.0;
    let start = end - Duration::days(days);
    let window: Vec<f64> = series
        .iter()
        .filter(|(date, _)| *date >= start)
        .map(|(_, v)| *v)
        .collect();
    total_return(&window)
}

/// Realized P&L per symbol from the trade log, sorted best first.
///
/// Buys pool cost (including slippage) at average cost; each sell realizes
/// net proceeds minus the average cost of the shares sold. Symbols never
/// sold do not appear.
pub fn symbol_pnl(trades: &[TradeRecord]) -> Vec<SymbolPnl> {
    let mut books: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    let mut realized: BTreeMap<&str, f64> = BTreeMap::new();

    for trade in trades {
        let (shares, cost) = books.entry(trade.symbol.as_str()).or_default();
        match trade.side {
            Side::Buy => {
                *shares += trade.shares;
                *cost += trade.notional + trade.slippage_cost;
            }
            Side::Sell => {
                if *shares <= 0.0 {
                    continue;
                }
                let sold = trade.shares.min(*shares);
                let avg_cost = *cost / *shares;
                let proceeds = sold * trade.price - trade.slippage_cost;
                *realized.entry(trade.symbol.as_str()).or_default() += proceeds - avg_cost * sold;
                *shares -= sold;
                *cost -= avg_cost * sold;
            }
        }
    }

    let mut pnl: Vec<SymbolPnl> = realized
        .into_iter()
        .map(|(symbol, pnl)| SymbolPnl {
            symbol: symbol.to_string(),
            pnl,
        })
        .collect();
    pnl.sort_by(|a, b| b.pnl.partial_cmp(&a.pnl).unwrap_or(std::cmp::Ordering::Equal));
    pnl
}

/// Sample standard deviation of daily returns, annualized with √252.
pub fn annualized_volatility(values: &[f64]) -> Option<f64> {
    let returns: Vec<f64> = values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    if returns.len() < 2 {
        return None;
    }
    let m = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns.iter().map(|r| (r - m).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    finite(var.sqrt() * TRADING_DAYS_PER_YEAR.sqrt())
}

/// CAGR over annualized volatility (risk-free rate 0).
pub fn sharpe(cagr: Option<f64>, volatility: Option<f64>) -> Option<f64> {
    let vol = volatility.filter(|v| *v > 0.0)?;
    finite(cagr? / vol)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
