//! Simulation configuration and its validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Drawdown at which the cooldown policy cuts exposure, unless overridden.
pub const DEFAULT_DRAWDOWN_TRIGGER: f64 = -0.25;

fn default_drawdown_trigger() -> f64 {
    DEFAULT_DRAWDOWN_TRIGGER
}

/// Capital-deployment policy (serializable enum).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExposureConfig {
    /// Always fully invested.
    #[default]
    Baseline,

    /// Go to cash on a deep drawdown, then ramp back in over rebalances.
    Cooldown {
        cooldown_weeks: u32,
        staged_step: f64,
        #[serde(default = "default_drawdown_trigger")]
        drawdown_trigger: f64,
    },

    /// Scale exposure by `target_vol / realized_vol`, capped at 1.
    VolTrigger { vol_lookback: usize, target_vol: f64 },
}

impl ExposureConfig {
    pub fn cooldown(cooldown_weeks: u32, staged_step: f64) -> Self {
        Self::Cooldown {
            cooldown_weeks,
            staged_step,
            drawdown_trigger: DEFAULT_DRAWDOWN_TRIGGER,
        }
    }

    pub fn vol_trigger(vol_lookback: usize, target_vol: f64) -> Self {
        Self::VolTrigger {
            vol_lookback,
            target_vol,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Cooldown { .. } => "cooldown",
            Self::VolTrigger { .. } => "vol_trigger",
        }
    }
}

/// What a rebalance does when the exposure policy allows zero capital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ZeroExposureMode {
    /// Sell every position at the reference price and credit cash.
    #[default]
    Liquidate,
    /// Drop every position without trades or cash credit. Matches the
    /// historical experiment outputs; destroys the marked value of holdings.
    Discard,
}

/// Parameters of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub initial_capital: f64,
    pub top_n: usize,
    pub slippage_rate: f64,
    pub exposure: ExposureConfig,
    pub exit_buffer: usize,
    pub pnl_hold_threshold: Option<f64>,
    pub zero_exposure: ZeroExposureMode,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            initial_capital: 1_000_000.0,
            top_n: 25,
            slippage_rate: 0.002,
            exposure: ExposureConfig::Baseline,
            exit_buffer: 0,
            pnl_hold_threshold: None,
            zero_exposure: ZeroExposureMode::Liquidate,
        }
    }
}

/// Invalid simulation parameters. Raised before any day is simulated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("initial_capital must be positive and finite, got {0}")]
    InitialCapital(f64),

    #[error("top_n must be at least 1")]
    TopN,

    #[error("slippage_rate must be in [0, 1), got {0}")]
    SlippageRate(f64),

    #[error("staged_step must be in (0, 1], got {0}")]
    StagedStep(f64),

    #[error("drawdown_trigger must be in [-1, 0), got {0}")]
    DrawdownTrigger(f64),

    #[error("vol_lookback must be at least 1")]
    VolLookback,

    #[error("target_vol must be positive and finite, got {0}")]
    TargetVol(f64),

    #[error("pnl_hold_threshold must be finite, got {0}")]
    PnlHoldThreshold(f64),
}

impl SimConfig {
    /// Rank above which a held, non-target symbol is sold.
    pub fn exit_threshold(&self) -> usize {
        self.top_n + self.exit_buffer
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(ConfigError::InitialCapital(self.initial_capital));
        }
        if self.top_n == 0 {
            return Err(ConfigError::TopN);
        }
        if !(0.0..1.0).contains(&self.slippage_rate) {
            return Err(ConfigError::SlippageRate(self.slippage_rate));
        }
        if let Some(threshold) = self.pnl_hold_threshold {
            if !threshold.is_finite() {
                return Err(ConfigError::PnlHoldThreshold(threshold));
            }
        }
        match self.exposure {
            ExposureConfig::Baseline => {}
            ExposureConfig::Cooldown {
                staged_step,
                drawdown_trigger,
                ..
            } => {
                if !(staged_step > 0.0 && staged_step <= 1.0) {
                    return Err(ConfigError::StagedStep(staged_step));
                }
                if !(-1.0..0.0).contains(&drawdown_trigger) {
                    return Err(ConfigError::DrawdownTrigger(drawdown_trigger));
                }
            }
            ExposureConfig::VolTrigger {
                vol_lookback,
                target_vol,
            } => {
                if vol_lookback == 0 {
                    return Err(ConfigError::VolLookback);
                }
                if !(target_vol.is_finite() && target_vol > 0.0) {
                    return Err(ConfigError::TargetVol(target_vol));
                }
            }
        }
        Ok(())
    }
}
