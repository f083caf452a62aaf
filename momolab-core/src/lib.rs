//! MomoLab Core: panel, schedule, ledger, exposure policies and the portfolio simulator.
//!
//! This crate contains the heart of the momentum backtester:
//! - Domain records (positions, trades, equity snapshots, exits)
//! - Forward-filled price panel and benchmark alignment
//! - Signal schedule keyed by trade date, with hysteresis windows
//! - Average-cost position ledger
//! - Exposure policies (baseline, drawdown cooldown, volatility target)
//! - Day-by-day simulator with rebalance-day exits and entries

pub mod data;
pub mod domain;
pub mod engine;
