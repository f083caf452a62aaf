//! Day-by-day portfolio simulation over a shared trading calendar.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::data::{BenchmarkSeries, PricePanel, SignalSchedule};
use crate::domain::{EquitySnapshot, TurnoverRecord};
use crate::engine::config::{ConfigError, SimConfig};
use crate::engine::exposure::build_exposure_policy;
use crate::engine::rebalance::{rebalance, DayPrices, RebalanceParams};
use crate::engine::state::{PortfolioState, SimulationOutput};

#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(
        "schedule built for top_n={schedule_top_n} exit_buffer={schedule_buffer}, \
         config has top_n={config_top_n} exit_buffer={config_buffer}"
    )]
    ScheduleWindow {
        schedule_top_n: usize,
        schedule_buffer: usize,
        config_top_n: usize,
        config_buffer: usize,
    },
}

/// Runs one validated configuration.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimConfig,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Simulate every calendar day of `panel`, rebalancing on the dates
    /// `schedule` lists.
    pub fn run(
        &self,
        panel: &PricePanel,
        schedule: &SignalSchedule,
        benchmark: Option<&BenchmarkSeries>,
    ) -> Result<SimulationOutput, SimError> {
        let cfg = &self.config;
        if schedule.top_n() != cfg.top_n || schedule.exit_buffer() != cfg.exit_buffer {
            return Err(SimError::ScheduleWindow {
                schedule_top_n: schedule.top_n(),
                schedule_buffer: schedule.exit_buffer(),
                config_top_n: cfg.top_n,
                config_buffer: cfg.exit_buffer,
            });
        }

        let params = RebalanceParams::from(cfg);
        let mut policy = build_exposure_policy(&cfg.exposure, panel);
        info!(
            days = panel.len(),
            symbols = panel.symbols().len(),
            rebalances = schedule.len(),
            exposure = policy.name(),
            "starting simulation"
        );
        let benchmark_prices = match benchmark {
            Some(series) => series.align(panel.dates()),
            None => vec![None; panel.len()],
        };

        let mut state = PortfolioState::new(cfg.initial_capital);
        let mut last_prices: HashMap<String, f64> = HashMap::new();
        let mut out = SimulationOutput::default();

        for (day, &date) in panel.dates().iter().enumerate() {
            let value = mark_to_market(&state, panel, day, &mut last_prices);
            state.peak_equity = state.peak_equity.max(value);
            let drawdown = if state.peak_equity > 0.0 {
                value / state.peak_equity - 1.0
            } else {
                0.0
            };

            state.exposure = policy.update(day, drawdown, schedule.is_rebalance_date(date));
            state.cooldown_counter = policy.cooldown_counter();

            out.equity.push(EquitySnapshot {
                date,
                portfolio_value: value,
                cash: state.cash,
                invested: value - state.cash,
                benchmark_price: benchmark_prices.get(day).copied().flatten(),
                drawdown,
                exposure: state.exposure,
            });

            let Some(slate) = schedule.slate(date) else {
                continue;
            };
            let prices = DayPrices::new(panel, day, &last_prices);
            let outcome = rebalance(&mut state, slate, &prices, date, &params);
            debug!(
                %date,
                trades = outcome.trades.len(),
                exits = outcome.exits.len(),
                exposure = state.exposure,
                "rebalanced"
            );
            if !outcome.trades.is_empty() {
                out.turnover.push(TurnoverRecord {
                    date,
                    turnover: outcome.turnover,
                    turnover_pct: if value != 0.0 { outcome.turnover / value } else { 0.0 },
                });
            }
            out.trades.extend(outcome.trades);
            out.exits.extend(outcome.exits);
        }

        if let Some(first) = out.trades.first().map(|t| t.date) {
            out.equity.retain(|s| s.date >= first);
            out.turnover.retain(|t| t.date >= first);
        }
        out.open_positions = state.ledger.iter().cloned().collect();

        info!(
            trades = out.trades.len(),
            exits = out.exits.len(),
            open = out.open_positions.len(),
            final_value = out.final_value().unwrap_or(cfg.initial_capital),
            "simulation finished"
        );
        Ok(out)
    }
}

/// Value the portfolio on calendar day `day`.
///
/// Each holding is priced at today's close, else its last known close, else
/// its average cost. `last_prices` is refreshed with today's closes, so a
/// repeat call on the same day returns the same value.
pub fn mark_to_market(
    state: &PortfolioState,
    panel: &PricePanel,
    day: usize,
    last_prices: &mut HashMap<String, f64>,
) -> f64 {
    let mut invested = 0.0;
    for pos in state.ledger.iter() {
        if let Some(close) = panel.close(&pos.symbol, day) {
            last_prices.insert(pos.symbol.clone(), close);
        }
        let price = last_prices
            .get(&pos.symbol)
            .copied()
            .or_else(|| pos.avg_cost())
            .unwrap_or(0.0);
        invested += pos.market_value(price);
    }
    state.cash + invested
}
