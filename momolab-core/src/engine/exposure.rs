//! Exposure policies: how much of the portfolio value may be invested.

use crate::data::PricePanel;
use crate::engine::config::ExposureConfig;

/// Decides the capital fraction to deploy, one call per simulated day.
///
/// Implementations may carry state across days (the cooldown counter), so
/// `update` must be called exactly once per calendar day, in order.
pub trait ExposurePolicy: Send + Sync {
    fn name(&self) -> &str;

    /// Advance the policy to `day` and return the exposure in `[0, 1]`.
    fn update(&mut self, day: usize, drawdown: f64, is_rebalance: bool) -> f64;

    fn cooldown_counter(&self) -> u32 {
        0
    }
}

/// Always fully invested.
#[derive(Debug, Clone, Default)]
pub struct BaselineExposure;

impl ExposurePolicy for BaselineExposure {
    fn name(&self) -> &str {
        "baseline"
    }

    fn update(&mut self, _day: usize, _drawdown: f64, _is_rebalance: bool) -> f64 {
        1.0
    }
}

/// Drawdown-triggered de-risking with a staged re-entry ramp.
///
/// The trigger check runs before the ramp step, so a trigger that fires on a
/// rebalance date takes its first step on that same date.
#[derive(Debug, Clone)]
pub struct CooldownExposure {
    cooldown_weeks: u32,
    staged_step: f64,
    drawdown_trigger: f64,
    counter: u32,
    exposure: f64,
}

impl CooldownExposure {
    pub fn new(cooldown_weeks: u32, staged_step: f64, drawdown_trigger: f64) -> Self {
        Self {
            cooldown_weeks,
            staged_step,
            drawdown_trigger,
            counter: 0,
            exposure: 1.0,
        }
    }
}

impl ExposurePolicy for CooldownExposure {
    fn name(&self) -> &str {
        "cooldown"
    }

    fn update(&mut self, _day: usize, drawdown: f64, is_rebalance: bool) -> f64 {
        if drawdown <= self.drawdown_trigger && self.counter == 0 {
            self.counter = self.cooldown_weeks;
            self.exposure = 0.0;
            tracing::info!(
                drawdown,
                cooldown_weeks = self.cooldown_weeks,
                "drawdown trigger hit, exposure cut to zero"
            );
        }
        if self.counter > 0 && is_rebalance {
            self.counter -= 1;
            self.exposure = (self.exposure + self.staged_step).min(1.0);
        }
        self.exposure
    }

    fn cooldown_counter(&self) -> u32 {
        self.counter
    }
}

/// Volatility targeting over the panel's cross-sectional mean realized vol.
#[derive(Debug, Clone)]
pub struct VolTargetExposure {
    target_vol: f64,
    realized_vol: Vec<Option<f64>>,
}

impl VolTargetExposure {
    /// `realized_vol[day]` is the mean trailing vol on calendar day `day`.
    pub fn new(target_vol: f64, realized_vol: Vec<Option<f64>>) -> Self {
        Self {
            target_vol,
            realized_vol,
        }
    }

    pub fn from_panel(panel: &PricePanel, vol_lookback: usize, target_vol: f64) -> Self {
        Self::new(target_vol, panel.mean_realized_vol(vol_lookback))
    }
}

impl ExposurePolicy for VolTargetExposure {
    fn name(&self) -> &str {
        "vol_trigger"
    }

    fn update(&mut self, day: usize, _drawdown: f64, _is_rebalance: bool) -> f64 {
        let realized = self
            .realized_vol
            .get(day)
            .copied()
            .flatten()
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(self.target_vol);
        (self.target_vol / realized).min(1.0)
    }
}

/// Instantiate the policy described by `config` for a run over `panel`.
pub fn build_exposure_policy(config: &ExposureConfig, panel: &PricePanel) -> Box<dyn ExposurePolicy> {
    match *config {
        ExposureConfig::Baseline => Box::new(BaselineExposure),
        ExposureConfig::Cooldown {
            cooldown_weeks,
            staged_step,
            drawdown_trigger,
        } => Box::new(CooldownExposure::new(cooldown_weeks, staged_step, drawdown_trigger)),
        ExposureConfig::VolTrigger {
            vol_lookback,
            target_vol,
        } => Box::new(VolTargetExposure::from_panel(panel, vol_lookback, target_vol)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_is_always_full() {
        let mut p = BaselineExposure;
        assert_eq!(p.update(0, -0.9, true), 1.0);
        assert_eq!(p.update(1, 0.0, false), 1.0);
    }

    #[test]
    fn cooldown_ramps_back_over_rebalances() {
        let mut p = CooldownExposure::new(2, 0.25, -0.25);
        assert_eq!(p.update(0, -0.10, false), 1.0);

        // Trigger on a non-rebalance day.
        assert_eq!(p.update(1, -0.30, false), 0.0);
        assert_eq!(p.cooldown_counter(), 2);

        assert_eq!(p.update(2, -0.30, false), 0.0);
        assert_eq!(p.update(3, -0.30, true), 0.25);
        assert_eq!(p.cooldown_counter(), 1);
        assert_eq!(p.update(4, -0.20, true), 0.5);
        assert_eq!(p.cooldown_counter(), 0);

        // Ramp ends where it left off.
        assert_eq!(p.update(5, -0.10, true), 0.5);
    }

    #[test]
    fn cooldown_trigger_on_rebalance_steps_same_day() {
        let mut p = CooldownExposure::new(1, 0.25, -0.25);
        assert_eq!(p.update(0, -0.26, true), 0.25);
        assert_eq!(p.cooldown_counter(), 0);
        // Still in drawdown with no active cooldown: triggers again.
        assert_eq!(p.update(1, -0.27, false), 0.0);
        assert_eq!(p.cooldown_counter(), 1);
    }

    #[test]
    fn cooldown_step_is_capped_at_one() {
        let mut p = CooldownExposure::new(3, 0.6, -0.25);
        p.update(0, -0.5, false);
        assert_eq!(p.update(1, -0.1, true), 0.6);
        assert_eq!(p.update(2, -0.1, true), 1.0);
        assert_eq!(p.update(3, -0.1, true), 1.0);
    }

    #[test]
    fn vol_target_scales_and_caps() {
        let mut p = VolTargetExposure::new(0.01, vec![None, Some(0.02), Some(0.005), Some(0.0)]);
        assert_eq!(p.update(0, 0.0, false), 1.0);
        assert!((p.update(1, 0.0, false) - 0.5).abs() < 1e-12);
        assert_eq!(p.update(2, 0.0, false), 1.0);
        assert_eq!(p.update(3, 0.0, false), 1.0);
        // Past the end of the precomputed series degrades to full exposure.
        assert_eq!(p.update(10, 0.0, false), 1.0);
    }

    #[test]
    fn factory_policy_names_match_config_labels() {
        let panel = PricePanel::from_rows(vec![crate::data::PriceRow::close_only(
            chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            "A",
            100.0,
        )])
        .unwrap();
        for cfg in [
            ExposureConfig::Baseline,
            ExposureConfig::cooldown(2, 0.25),
            ExposureConfig::vol_trigger(5, 0.01),
        ] {
            assert_eq!(build_exposure_policy(&cfg, &panel).name(), cfg.label());
        }
    }
}
