//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Cost basis: a partial sell removes exactly `avg_cost × shares_sold`
//! 2. Hysteresis monotonicity: a wider exit buffer never adds exits
//! 3. Cash accounting: cash never goes negative and matches the trade log

use chrono::NaiveDate;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use momolab_core::data::{PricePanel, PriceRow, SignalRow, SignalSchedule};
use momolab_core::engine::{
    select_exits, DayPrices, PositionLedger, RebalanceParams, SimConfig, Simulator,
    ZeroExposureMode,
};

const SYMBOLS: [&str; 10] = ["S0", "S1", "S2", "S3", "S4", "S5", "S6", "S7", "S8", "S9"];

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_shares() -> impl Strategy<Value = f64> {
    (1.0..1000.0_f64).prop_map(|q| (q * 100.0).round() / 100.0)
}

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_ranking(n: usize) -> impl Strategy<Value = Vec<u32>> {
    Just((1..=n as u32).collect::<Vec<u32>>()).prop_shuffle()
}

// ── 1. Cost Basis ────────────────────────────────────────────────────

proptest! {
    /// Selling part of a pooled position leaves its average cost unchanged.
    #[test]
    fn partial_sell_preserves_avg_cost(
        lots in prop::collection::vec((arb_shares(), arb_price()), 1..5),
        fraction in 0.05..0.95_f64,
        sale_price in arb_price(),
    ) {
        let mut ledger = PositionLedger::new();
        for (shares, price) in &lots {
            ledger.open_or_add("S0", *shares, shares * price, d(1), 1).unwrap();
        }
        let before = ledger.get("S0").unwrap().clone();
        let avg = before.cost_basis / before.shares;
        let sold = before.shares * fraction;

        let red = ledger.reduce("S0", sold, sale_price, d(2)).unwrap();
        prop_assert!((red.avg_cost - avg).abs() < 1e-9 * avg.max(1.0));
        prop_assert!(red.exit.is_none());

        let after = ledger.get("S0").unwrap();
        let removed = before.cost_basis - after.cost_basis;
        prop_assert!((removed - avg * sold).abs() < 1e-6 * before.cost_basis.max(1.0));
        prop_assert!((after.avg_cost().unwrap() - avg).abs() < 1e-9 * avg.max(1.0));
    }
}

// ── 2. Hysteresis Monotonicity ───────────────────────────────────────

proptest! {
    /// For fixed ranks, exits with a wider buffer are a subset of exits with
    /// a narrower one.
    #[test]
    fn wider_buffer_never_adds_exits(
        ranks in arb_ranking(SYMBOLS.len()),
        held in prop::collection::vec(any::<bool>(), SYMBOLS.len()),
        top_n in 1usize..5,
        narrow in 0usize..4,
        widen in 0usize..4,
    ) {
        let rows: Vec<SignalRow> = SYMBOLS
            .iter()
            .zip(&ranks)
            .map(|(s, r)| SignalRow::new(d(1), *s, *r))
            .collect();
        let price_rows: Vec<PriceRow> = SYMBOLS
            .iter()
            .map(|s| PriceRow::close_only(d(1), *s, 100.0))
            .collect();
        let panel = PricePanel::from_rows(price_rows).unwrap();
        let last = HashMap::new();
        let prices = DayPrices::new(&panel, 0, &last);

        let mut ledger = PositionLedger::new();
        for (symbol, keep) in SYMBOLS.iter().zip(&held) {
            if *keep {
                ledger.open_or_add(symbol, 1.0, 100.0, d(1), 1).unwrap();
            }
        }

        let exits_for = |buffer: usize| -> BTreeSet<String> {
            let schedule = SignalSchedule::new(&rows, top_n, buffer);
            let params = RebalanceParams {
                top_n,
                exit_buffer: buffer,
                pnl_hold_threshold: None,
                slippage_rate: 0.0,
                zero_exposure: ZeroExposureMode::Liquidate,
            };
            let slate = schedule.slate(d(1)).unwrap();
            select_exits(&ledger, slate, &prices, &params).into_iter().collect()
        };

        let narrow_exits = exits_for(narrow);
        let wide_exits = exits_for(narrow + widen);
        prop_assert!(wide_exits.is_subset(&narrow_exits));
    }
}

// ── 3. Cash Accounting ───────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every trade's `cash_after` equals initial capital plus the running sum
    /// of cash deltas, and never drops below zero.
    #[test]
    fn cash_matches_trade_log(
        closes in prop::collection::vec(prop::collection::vec(arb_price(), 6), 4),
        rankings in prop::collection::vec(arb_ranking(4), 3),
        slippage in 0.0..0.01_f64,
    ) {
        let mut price_rows = Vec::new();
        for (symbol, series) in SYMBOLS.iter().zip(&closes) {
            for (i, close) in series.iter().enumerate() {
                price_rows.push(PriceRow::close_only(d(i as u32 + 1), *symbol, *close));
            }
        }
        let panel = PricePanel::from_rows(price_rows).unwrap();

        let mut signal_rows = Vec::new();
        for (day, ranking) in [1u32, 3, 5].iter().zip(&rankings) {
            for (symbol, rank) in SYMBOLS.iter().zip(ranking) {
                signal_rows.push(SignalRow::new(d(*day), *symbol, *rank));
            }
        }
        let schedule = SignalSchedule::new(&signal_rows, 2, 1);

        let cfg = SimConfig {
            initial_capital: 100_000.0,
            top_n: 2,
            exit_buffer: 1,
            slippage_rate: slippage,
            ..SimConfig::default()
        };
        let out = Simulator::new(cfg).unwrap().run(&panel, &schedule, None).unwrap();

        let mut cash = 100_000.0;
        for trade in &out.trades {
            cash += trade.cash_delta();
            prop_assert!((trade.cash_after - cash).abs() < 1e-6);
            prop_assert!(trade.cash_after >= -1e-6);
        }
        let final_cash = out.equity.last().map(|s| s.cash).unwrap();
        prop_assert!((final_cash - cash).abs() < 1e-6);
    }
}
