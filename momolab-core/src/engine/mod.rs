//! Portfolio engine: exposure policies, position ledger, rebalance logic and
//! the day-by-day simulator.
//!
//! Each simulated day runs in a fixed order:
//!
//! 1. Mark holdings to market and update the running peak
//! 2. Ask the exposure policy for today's capital fraction
//! 3. Record an equity snapshot
//! 4. On a rebalance date: exits, then entries sized from the exposure

pub mod config;
pub mod exposure;
pub mod ledger;
pub mod rebalance;
pub mod simulator;
pub mod state;

pub use config::{ConfigError, ExposureConfig, SimConfig, ZeroExposureMode, DEFAULT_DRAWDOWN_TRIGGER};
pub use exposure::{
    build_exposure_policy, BaselineExposure, CooldownExposure, ExposurePolicy, VolTargetExposure,
};
pub use ledger::{LedgerError, PositionLedger, Reduction};
pub use rebalance::{
    rebalance, select_entrants, select_exits, DayPrices, RebalanceOutcome, RebalanceParams,
    CASH_EPSILON,
};
pub use simulator::{mark_to_market, SimError, Simulator};
pub use state::{PortfolioState, SimulationOutput};
