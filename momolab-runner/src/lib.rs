//! MomoLab Runner: backtest orchestration, CSV inputs, metrics, export, sweeps.
//!
//! This crate builds on `momolab-core` to provide:
//! - TOML run configuration with input paths and simulation parameters
//! - CSV loading of price directories, signal files and benchmarks
//! - Single-backtest runner with metrics
//! - Artifact export (CSV series + JSON manifest)
//! - Grid and seeded random parameter sweeps on rayon
//! - Exchange instrument lookup

pub mod config;
pub mod data_loader;
pub mod export;
pub mod instruments;
pub mod metrics;
pub mod runner;
pub mod sweep;

pub use config::{run_id, BacktestConfig, ConfigFileError, DataConfig, OutputConfig, RunId};
pub use data_loader::{load_benchmark, load_price_dir, load_signals, LoadError};
pub use export::{load_artifacts, save_artifacts, save_summary};
pub use instruments::{Instrument, InstrumentDirectory, InstrumentError};
pub use metrics::{PerformanceMetrics, SymbolPnl, TrailingReturn};
pub use runner::{run_backtest, run_from_config, BacktestResult, LoadedInputs, RunError, SCHEMA_VERSION};
pub use sweep::{run_sweep, ParamGrid, ParamSampler, SweepEntry, SweepResults};
