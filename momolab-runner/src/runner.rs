//! Backtest runner: wires together loading, scheduling, simulation and metrics.
//!
//! Two entry points:
//! - `run_from_config()`: loads the CSV inputs a `BacktestConfig` names, then runs. Used by CLI.
//! - `run_backtest()`: takes pre-loaded inputs + a `SimConfig`. Used by sweeps.

use momolab_core::data::{BenchmarkSeries, PricePanel, SignalRow, SignalSchedule};
use momolab_core::domain::{EquitySnapshot, ExitRecord, Position, TradeRecord, TurnoverRecord};
use momolab_core::engine::{ConfigError, SimConfig, SimError, Simulator};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{run_id, BacktestConfig, DataConfig, RunId};
use crate::data_loader::{load_benchmark, load_price_dir, load_signals, LoadError};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("simulation error: {0}")]
    Simulation(#[from] SimError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Inputs shared read-only by every run over the same data.
#[derive(Debug, Clone)]
pub struct LoadedInputs {
    pub panel: PricePanel,
    pub signals: Vec<SignalRow>,
    pub benchmark: Option<BenchmarkSeries>,
}

impl LoadedInputs {
    pub fn load(data: &DataConfig) -> Result<Self, LoadError> {
        let panel = load_price_dir(&data.prices_dir)?;
        let signals = load_signals(&data.signals)?;
        let benchmark = data.benchmark.as_deref().map(load_benchmark).transpose()?;
        Ok(Self {
            panel,
            signals,
            benchmark,
        })
    }

    /// Signals mapped onto the panel calendar for the given window.
    pub fn schedule(&self, top_n: usize, exit_buffer: usize) -> SignalSchedule {
        SignalSchedule::mapped_to_calendar(&self.signals, self.panel.dates(), top_n, exit_buffer)
    }
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: SimConfig,
    pub metrics: PerformanceMetrics,
    pub equity: Vec<EquitySnapshot>,
    pub trades: Vec<TradeRecord>,
    pub turnover: Vec<TurnoverRecord>,
    pub exits: Vec<ExitRecord>,
    pub open_positions: Vec<Position>,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Load the inputs a config names and run it.
pub fn run_from_config(config: &BacktestConfig) -> Result<BacktestResult, RunError> {
    config.simulation.validate()?;
    let inputs = LoadedInputs::load(&config.data)?;
    run_backtest(&inputs, &config.simulation)
}

/// Run one configuration over pre-loaded inputs without touching the filesystem.
pub fn run_backtest(inputs: &LoadedInputs, config: &SimConfig) -> Result<BacktestResult, RunError> {
    let simulator = Simulator::new(config.clone())?;
    let schedule = inputs.schedule(config.top_n, config.exit_buffer);
    let output = simulator.run(&inputs.panel, &schedule, inputs.benchmark.as_ref())?;
    let metrics = PerformanceMetrics::compute(&output, config.initial_capital, config.top_n);
    let run_id = run_id(config);

    info!(
        run_id = %&run_id[..12],
        cagr = ?metrics.cagr,
        max_drawdown = ?metrics.max_drawdown,
        trades = metrics.trade_count,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        config: config.clone(),
        metrics,
        equity: output.equity,
        trades: output.trades,
        turnover: output.turnover,
        exits: output.exits,
        open_positions: output.open_positions,
    })
}
