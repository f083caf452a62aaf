//! Reporting and export: CSV artifacts and the JSON manifest.
//!
//! A run directory holds one CSV per output series plus `manifest.json`
//! with the full `BacktestResult`. The manifest carries a
//! `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use momolab_core::domain::{EquitySnapshot, ExitRecord, TradeRecord, TurnoverRecord};

use crate::metrics::{PerformanceMetrics, SymbolPnl};
use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::sweep::SweepResults;

pub const EQUITY_FILE: &str = "momentum_equity.csv";
pub const TRADES_FILE: &str = "momentum_trades.csv";
pub const TURNOVER_FILE: &str = "momentum_turnover.csv";
pub const EXITS_FILE: &str = "momentum_exits.csv";
pub const METRICS_FILE: &str = "momentum_metrics.csv";
pub const SYMBOL_PNL_FILE: &str = "momentum_symbol_pnl.csv";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SUMMARY_FILE: &str = "summary.csv";

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: date, portfolio_value, cash, invested, benchmark, drawdown, exposure
pub fn export_equity_csv(equity: &[EquitySnapshot]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "portfolio_value",
        "cash",
        "invested",
        "benchmark",
        "drawdown",
        "exposure",
    ])?;
    for s in equity {
        wtr.write_record([
            &s.date.to_string(),
            &s.portfolio_value.to_string(),
            &s.cash.to_string(),
            &s.invested.to_string(),
            &opt(s.benchmark_price),
            &s.drawdown.to_string(),
            &s.exposure.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Columns: date, symbol, side, shares, price, notional, slippage_cost, cash_after
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "symbol",
        "side",
        "shares",
        "price",
        "notional",
        "slippage_cost",
        "cash_after",
    ])?;
    for t in trades {
        wtr.write_record([
            &t.date.to_string(),
            &t.symbol,
            &t.side.to_string(),
            &t.shares.to_string(),
            &t.price.to_string(),
            &t.notional.to_string(),
            &t.slippage_cost.to_string(),
            &t.cash_after.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Columns: date, turnover, turnover_pct
pub fn export_turnover_csv(turnover: &[TurnoverRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "turnover", "turnover_pct"])?;
    for t in turnover {
        wtr.write_record([
            &t.date.to_string(),
            &t.turnover.to_string(),
            &t.turnover_pct.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Columns: symbol, entry_date, exit_date, entry_rank, holding_days, pnl_pct
pub fn export_exits_csv(exits: &[ExitRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "entry_date",
        "exit_date",
        "entry_rank",
        "holding_days",
        "pnl_pct",
    ])?;
    for e in exits {
        wtr.write_record([
            &e.symbol,
            &e.entry_date.to_string(),
            &e.exit_date.to_string(),
            &e.entry_rank.to_string(),
            &e.holding_days.to_string(),
            &e.pnl_pct.to_string(),
        ])?;
    }
    finish(wtr)
}

const METRIC_COLUMNS: [&str; 42] = [
    "total_return",
    "cagr",
    "max_drawdown",
    "longest_drawdown_days",
    "avg_turnover_pct",
    "max_turnover_pct",
    "annualized_turnover",
    "cost_drag",
    "avg_holding_days",
    "median_holding_days",
    "hit_rate_overall",
    "hit_rate_q1",
    "hit_rate_q2",
    "hit_rate_q3",
    "hit_rate_q4",
    "hit_rate_q5",
    "trades_per_week",
    "trades_per_month",
    "trades_per_year",
    "benchmark_return",
    "benchmark_cagr",
    "benchmark_volatility",
    "annualized_volatility",
    "sharpe",
    "return_1m",
    "return_3m",
    "return_6m",
    "return_1y",
    "return_3y",
    "benchmark_return_1m",
    "benchmark_return_3m",
    "benchmark_return_6m",
    "benchmark_return_1y",
    "benchmark_return_3y",
    "best_symbol",
    "best_symbol_pnl",
    "worst_symbol",
    "worst_symbol_pnl",
    "trade_count",
    "exit_count",
    "start_date",
    "end_date",
];

fn metric_values(m: &PerformanceMetrics) -> Vec<String> {
    let mut row = vec![
        opt(m.total_return),
        opt(m.cagr),
        opt(m.max_drawdown),
        m.longest_drawdown_days.map(|d| d.to_string()).unwrap_or_default(),
        opt(m.avg_turnover_pct),
        opt(m.max_turnover_pct),
        opt(m.annualized_turnover),
        opt(m.cost_drag),
        opt(m.avg_holding_days),
        opt(m.median_holding_days),
        opt(m.hit_rate_overall),
    ];
    row.extend(m.hit_rate_by_quintile.iter().map(|q| opt(*q)));
    row.extend([
        opt(m.trades_per_week),
        opt(m.trades_per_month),
        opt(m.trades_per_year),
        opt(m.benchmark_return),
        opt(m.benchmark_cagr),
        opt(m.benchmark_volatility),
        opt(m.annualized_volatility),
        opt(m.sharpe),
    ]);
    row.extend(m.trailing_returns.iter().map(|t| opt(t.portfolio)));
    row.extend(m.trailing_returns.iter().map(|t| opt(t.benchmark)));
    for pick in [m.symbol_pnl.first(), m.symbol_pnl.last()] {
        row.push(pick.map(|p| p.symbol.clone()).unwrap_or_default());
        row.push(opt(pick.map(|p| p.pnl)));
    }
    row.extend([
        m.trade_count.to_string(),
        m.exit_count.to_string(),
        m.start_date.map(|d| d.to_string()).unwrap_or_default(),
        m.end_date.map(|d| d.to_string()).unwrap_or_default(),
    ]);
    row
}

/// Columns: symbol, pnl. Best contributor first.
pub fn export_symbol_pnl_csv(pnl: &[SymbolPnl]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["symbol", "pnl"])?;
    for p in pnl {
        wtr.write_record([&p.symbol, &p.pnl.to_string()])?;
    }
    finish(wtr)
}

/// One header row and one value row. Undefined metrics are empty cells.
pub fn export_metrics_csv(metrics: &PerformanceMetrics) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(METRIC_COLUMNS)?;
    wtr.write_record(metric_values(metrics))?;
    finish(wtr)
}

/// Sweep leaderboard: run id, the swept parameters, then every metric.
pub fn export_summary_csv(results: &SweepResults) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec![
        "run_id",
        "top_n",
        "exit_buffer",
        "pnl_hold_threshold",
        "slippage_rate",
        "exposure",
        "exposure_params",
    ];
    header.extend(METRIC_COLUMNS);
    wtr.write_record(&header)?;

    for entry in results.all() {
        let cfg = &entry.config;
        let exposure_params =
            serde_json::to_string(&cfg.exposure).context("failed to serialize exposure config")?;
        let mut row = vec![
            entry.run_id.clone(),
            cfg.top_n.to_string(),
            cfg.exit_buffer.to_string(),
            opt(cfg.pnl_hold_threshold),
            cfg.slippage_rate.to_string(),
            cfg.exposure.label().to_string(),
            exposure_params,
        ];
        row.extend(metric_values(&entry.metrics));
        wtr.write_record(&row)?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run into `run_dir`.
///
/// Writes the six `momentum_*.csv` files and `manifest.json`. Returns the
/// directory path.
pub fn save_artifacts(result: &BacktestResult, run_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let files = [
        (EQUITY_FILE, export_equity_csv(&result.equity)?),
        (TRADES_FILE, export_trades_csv(&result.trades)?),
        (TURNOVER_FILE, export_turnover_csv(&result.turnover)?),
        (EXITS_FILE, export_exits_csv(&result.exits)?),
        (METRICS_FILE, export_metrics_csv(&result.metrics)?),
        (SYMBOL_PNL_FILE, export_symbol_pnl_csv(&result.metrics.symbol_pnl)?),
        (MANIFEST_FILE, export_json(result)?),
    ];
    for (name, content) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(run_dir.to_path_buf())
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

/// Write `summary.csv` for a sweep into `dir`.
pub fn save_summary(results: &SweepResults, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir: {}", dir.display()))?;
    let path = dir.join(SUMMARY_FILE);
    std::fs::write(&path, export_summary_csv(results)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
