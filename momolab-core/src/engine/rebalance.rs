//! Rebalance-day logic: exits, entries and capital allocation.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::data::{PricePanel, RebalanceSlate, ScheduleEntry};
use crate::domain::{ExitRecord, Side, TradeRecord};
use crate::engine::config::{SimConfig, ZeroExposureMode};
use crate::engine::ledger::PositionLedger;
use crate::engine::state::PortfolioState;

/// Slack allowed when checking a buy's cost against available cash.
pub const CASH_EPSILON: f64 = 1e-6;

/// The slice of `SimConfig` a rebalance needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RebalanceParams {
    pub top_n: usize,
    pub exit_buffer: usize,
    pub pnl_hold_threshold: Option<f64>,
    pub slippage_rate: f64,
    pub zero_exposure: ZeroExposureMode,
}

impl RebalanceParams {
    pub fn exit_threshold(&self) -> usize {
        self.top_n + self.exit_buffer
    }
}

impl From<&SimConfig> for RebalanceParams {
    fn from(cfg: &SimConfig) -> Self {
        Self {
            top_n: cfg.top_n,
            exit_buffer: cfg.exit_buffer,
            pnl_hold_threshold: cfg.pnl_hold_threshold,
            slippage_rate: cfg.slippage_rate,
            zero_exposure: cfg.zero_exposure,
        }
    }
}

/// Price lookups for one calendar day.
#[derive(Debug, Clone, Copy)]
pub struct DayPrices<'a> {
    panel: &'a PricePanel,
    day: usize,
    last_prices: &'a HashMap<String, f64>,
}

impl<'a> DayPrices<'a> {
    pub fn new(panel: &'a PricePanel, day: usize, last_prices: &'a HashMap<String, f64>) -> Self {
        Self {
            panel,
            day,
            last_prices,
        }
    }

    /// Price a trade executes at: trade reference, else close. Only positive
    /// finite prices are usable.
    pub fn execution_price(&self, symbol: &str) -> Option<f64> {
        self.panel
            .trade_price(symbol, self.day)
            .or_else(|| self.panel.close(symbol, self.day))
            .filter(|p| p.is_finite() && *p > 0.0)
    }

    /// Price a holding is valued at: today's close, else last known.
    pub fn mark_price(&self, symbol: &str) -> Option<f64> {
        self.panel
            .close(symbol, self.day)
            .or_else(|| self.last_prices.get(symbol).copied())
    }
}

/// Records produced by one rebalance.
#[derive(Debug, Clone, Default)]
pub struct RebalanceOutcome {
    pub trades: Vec<TradeRecord>,
    pub exits: Vec<ExitRecord>,
    /// Sum of absolute notional traded.
    pub turnover: f64,
}

/// Run one rebalance against `state` using `state.exposure`.
pub fn rebalance(
    state: &mut PortfolioState,
    slate: &RebalanceSlate,
    prices: &DayPrices<'_>,
    date: NaiveDate,
    params: &RebalanceParams,
) -> RebalanceOutcome {
    let mut outcome = RebalanceOutcome::default();

    if state.exposure <= 0.0 {
        match params.zero_exposure {
            ZeroExposureMode::Discard => {
                warn!(%date, positions = state.ledger.len(), "zero exposure, discarding holdings");
                state.ledger.clear();
            }
            ZeroExposureMode::Liquidate => {
                for symbol in state.ledger.symbols() {
                    match prices.execution_price(&symbol) {
                        Some(price) => sell_all(state, &symbol, price, date, params, &mut outcome),
                        None => debug!(%date, %symbol, "no price, position kept through liquidation"),
                    }
                }
            }
        }
        return outcome;
    }

    for symbol in select_exits(&state.ledger, slate, prices, params) {
        match prices.execution_price(&symbol) {
            Some(price) => sell_all(state, &symbol, price, date, params, &mut outcome),
            None => debug!(%date, %symbol, "exit skipped, no usable price"),
        }
    }

    let entrants: Vec<ScheduleEntry> = select_entrants(&state.ledger, slate)
        .into_iter()
        .cloned()
        .collect();
    if entrants.is_empty() {
        return outcome;
    }

    let invested: f64 = state
        .ledger
        .iter()
        .map(|pos| pos.market_value(prices.mark_price(&pos.symbol).unwrap_or(0.0)))
        .sum();
    let deploy = (state.exposure * (state.cash + invested) - invested).max(0.0);
    let allocation = deploy / entrants.len() as f64;

    for entry in &entrants {
        buy(state, entry, allocation, prices, date, params, &mut outcome);
    }

    outcome
}

/// Held symbols that leave the portfolio today.
///
/// A held symbol outside today's targets exits when its extended-window rank
/// is beyond `top_n + exit_buffer` (absent counts as beyond), unless its
/// unrealized gain exceeds the pnl-hold threshold.
pub fn select_exits(
    ledger: &PositionLedger,
    slate: &RebalanceSlate,
    prices: &DayPrices<'_>,
    params: &RebalanceParams,
) -> Vec<String> {
    let threshold = params.exit_threshold();
    ledger
        .iter()
        .filter(|pos| !slate.is_target(&pos.symbol))
        .filter(|pos| {
            slate
                .exit_rank(&pos.symbol)
                .map_or(true, |rank| rank as usize > threshold)
        })
        .filter(|pos| {
            let Some(hold) = params.pnl_hold_threshold else {
                return true;
            };
            let pnl = prices
                .execution_price(&pos.symbol)
                .and_then(|p| pos.unrealized_pnl_pct(p));
            match pnl {
                Some(pnl) if pnl > hold => {
                    debug!(symbol = %pos.symbol, pnl, hold, "exit deferred by pnl hold");
                    false
                }
                _ => true,
            }
        })
        .map(|pos| pos.symbol.clone())
        .collect()
}

/// Today's targets that are not already held, best rank first.
pub fn select_entrants<'s>(ledger: &PositionLedger, slate: &'s RebalanceSlate) -> Vec<&'s ScheduleEntry> {
    slate
        .entries()
        .iter()
        .filter(|e| !ledger.contains(&e.symbol))
        .collect()
}

fn sell_all(
    state: &mut PortfolioState,
    symbol: &str,
    price: f64,
    date: NaiveDate,
    params: &RebalanceParams,
    outcome: &mut RebalanceOutcome,
) {
    let Some(shares) = state.ledger.get(symbol).map(|p| p.shares) else {
        return;
    };
    let notional = shares * price;
    let slippage_cost = notional * params.slippage_rate;
    let net_price = price * (1.0 - params.slippage_rate);

    match state.ledger.close(symbol, net_price, date) {
        Ok(reduction) => {
            state.cash += notional - slippage_cost;
            outcome.turnover += notional.abs();
            outcome.trades.push(TradeRecord {
                date,
                symbol: symbol.to_string(),
                side: Side::Sell,
                shares,
                price,
                notional,
                slippage_cost,
                cash_after: state.cash,
            });
            outcome.exits.extend(reduction.exit);
        }
        Err(err) => warn!(%date, %symbol, error = %err, "sell rejected by ledger"),
    }
}

fn buy(
    state: &mut PortfolioState,
    entry: &ScheduleEntry,
    allocation: f64,
    prices: &DayPrices<'_>,
    date: NaiveDate,
    params: &RebalanceParams,
    outcome: &mut RebalanceOutcome,
) {
    let symbol = entry.symbol.as_str();
    let Some(price) = prices.execution_price(symbol) else {
        debug!(%date, %symbol, "entry skipped, no usable price");
        return;
    };
    let shares = allocation / (price * (1.0 + params.slippage_rate));
    if !(shares.is_finite() && shares > 0.0) {
        debug!(%date, %symbol, allocation, "entry skipped, nothing to allocate");
        return;
    }

    let notional = shares * price;
    let slippage_cost = notional * params.slippage_rate;
    let cost = notional + slippage_cost;
    if cost > state.cash + CASH_EPSILON {
        debug!(%date, %symbol, cost, cash = state.cash, "entry skipped, insufficient cash");
        return;
    }

    if let Err(err) = state
        .ledger
        .open_or_add(symbol, shares, cost, date, entry.entry_rank)
    {
        warn!(%date, %symbol, error = %err, "buy rejected by ledger");
        return;
    }
    state.cash = (state.cash - cost).max(0.0);
    outcome.turnover += notional.abs();
    outcome.trades.push(TradeRecord {
        date,
        symbol: symbol.to_string(),
        side: Side::Buy,
        shares,
        price,
        notional,
        slippage_cost,
        cash_after: state.cash,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PriceRow, SignalRow, SignalSchedule};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn panel() -> PricePanel {
        let rows = vec![
            PriceRow::close_only(d(2), "A", 100.0),
            PriceRow::close_only(d(2), "B", 50.0),
            PriceRow::close_only(d(2), "C", 20.0),
            PriceRow::close_only(d(2), "D", 10.0),
        ];
        PricePanel::from_rows(rows).unwrap()
    }

    fn params(top_n: usize, exit_buffer: usize) -> RebalanceParams {
        RebalanceParams {
            top_n,
            exit_buffer,
            pnl_hold_threshold: None,
            slippage_rate: 0.0,
            zero_exposure: ZeroExposureMode::Liquidate,
        }
    }

    fn slate(rows: &[(&str, u32)], top_n: usize, exit_buffer: usize) -> RebalanceSlate {
        let rows: Vec<SignalRow> = rows
            .iter()
            .map(|(s, r)| SignalRow::new(d(2), *s, *r))
            .collect();
        SignalSchedule::new(&rows, top_n, exit_buffer)
            .slate(d(2))
            .cloned()
            .unwrap()
    }

    #[test]
    fn splits_cash_evenly_between_entrants() {
        let panel = panel();
        let last = HashMap::new();
        let prices = DayPrices::new(&panel, 0, &last);
        let mut state = PortfolioState::new(1_000.0);

        let out = rebalance(&mut state, &slate(&[("A", 1), ("B", 2)], 2, 0), &prices, d(2), &params(2, 0));

        assert_eq!(out.trades.len(), 2);
        assert_eq!(state.ledger.get("A").unwrap().shares, 5.0);
        assert_eq!(state.ledger.get("B").unwrap().shares, 10.0);
        assert!(state.cash.abs() < 1e-9);
        assert!((out.turnover - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn buffer_keeps_held_symbol_inside_window() {
        let panel = panel();
        let last = HashMap::new();
        let prices = DayPrices::new(&panel, 0, &last);
        let mut state = PortfolioState::new(1_000.0);
        state.ledger.open_or_add("C", 1.0, 20.0, d(2), 1).unwrap();

        let s = slate(&[("A", 1), ("B", 2), ("C", 3)], 2, 1);
        assert!(select_exits(&state.ledger, &s, &prices, &params(2, 1)).is_empty());

        let s = slate(&[("A", 1), ("B", 2), ("C", 3)], 2, 0);
        assert_eq!(select_exits(&state.ledger, &s, &prices, &params(2, 0)), vec!["C".to_string()]);
    }

    #[test]
    fn pnl_hold_defers_winning_exit() {
        let panel = panel();
        let last = HashMap::new();
        let prices = DayPrices::new(&panel, 0, &last);
        let mut state = PortfolioState::new(1_000.0);
        // Bought D at 5, now 10: +100%.
        state.ledger.open_or_add("D", 10.0, 50.0, d(2), 1).unwrap();

        let s = slate(&[("A", 1)], 1, 0);
        let mut p = params(1, 0);
        p.pnl_hold_threshold = Some(0.5);
        assert!(select_exits(&state.ledger, &s, &prices, &p).is_empty());
        p.pnl_hold_threshold = Some(1.5);
        assert_eq!(select_exits(&state.ledger, &s, &prices, &p).len(), 1);
    }

    #[test]
    fn zero_exposure_modes() {
        let panel = panel();
        let last = HashMap::new();
        let prices = DayPrices::new(&panel, 0, &last);
        let s = slate(&[("A", 1)], 1, 0);

        let mut state = PortfolioState::new(0.0);
        state.ledger.open_or_add("B", 2.0, 100.0, d(2), 1).unwrap();
        state.exposure = 0.0;
        let out = rebalance(&mut state, &s, &prices, d(2), &params(1, 0));
        assert_eq!(out.trades.len(), 1);
        assert_eq!(out.exits.len(), 1);
        assert_eq!(state.cash, 100.0);
        assert!(state.ledger.is_empty());

        let mut state = PortfolioState::new(0.0);
        state.ledger.open_or_add("B", 2.0, 100.0, d(2), 1).unwrap();
        state.exposure = 0.0;
        let mut p = params(1, 0);
        p.zero_exposure = ZeroExposureMode::Discard;
        let out = rebalance(&mut state, &s, &prices, d(2), &p);
        assert!(out.trades.is_empty());
        assert!(out.exits.is_empty());
        assert_eq!(state.cash, 0.0);
        assert!(state.ledger.is_empty());
    }

    #[test]
    fn short_cash_skips_only_that_entrant() {
        let panel = panel();
        let last = HashMap::new();
        let prices = DayPrices::new(&panel, 0, &last);
        let mut state = PortfolioState::new(1_000.0);
        // Over-allocation: each entrant is sized at the full 1,000.
        state.exposure = 2.0;

        let out = rebalance(&mut state, &slate(&[("A", 1), ("B", 2)], 2, 0), &prices, d(2), &params(2, 0));

        assert_eq!(out.trades.len(), 1);
        assert_eq!(out.trades[0].symbol, "A");
        assert_eq!(state.ledger.get("A").unwrap().shares, 10.0);
        assert!(!state.ledger.contains("B"));
        assert!(out.trades.iter().all(|t| t.cash_after >= 0.0));
        assert!(state.cash >= 0.0);
    }

    #[test]
    fn cash_within_epsilon_is_clamped_to_zero() {
        let panel = panel();
        let last = HashMap::new();
        let prices = DayPrices::new(&panel, 0, &last);
        let mut state = PortfolioState::new(1_000.0);
        // Sized half an epsilon above available cash.
        state.exposure = 1.0 + CASH_EPSILON / 2_000.0;

        let out = rebalance(&mut state, &slate(&[("A", 1)], 1, 0), &prices, d(2), &params(1, 0));

        assert_eq!(out.trades.len(), 1);
        assert_eq!(state.cash, 0.0);
        assert_eq!(out.trades[0].cash_after, 0.0);
    }

    #[test]
    fn missing_price_skips_entry() {
        let panel = panel();
        let last = HashMap::new();
        let prices = DayPrices::new(&panel, 0, &last);
        let mut state = PortfolioState::new(1_000.0);

        let out = rebalance(&mut state, &slate(&[("A", 1), ("ZZZ", 2)], 2, 0), &prices, d(2), &params(2, 0));
        assert_eq!(out.trades.len(), 1);
        assert!((state.cash - 500.0).abs() < 1e-9);
        assert!(!state.ledger.contains("ZZZ"));
    }
}
