//! Parameter sweep utilities for grid and seeded random search.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

use momolab_core::engine::{ExposureConfig, SimConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{ConfigFileError, RunId};
use crate::metrics::PerformanceMetrics;
use crate::runner::{run_backtest, LoadedInputs, RunError};

/// Axes of a parameter grid.
///
/// Each axis lists the values to sweep. An empty axis keeps the base
/// config's value.
///
/// ```toml
/// top_n = [10, 25]
/// exit_buffer = [0, 5, 10]
/// pnl_hold_threshold = [0.05]
/// include_no_pnl_hold = true
///
/// [[exposure]]
/// type = "baseline"
///
/// [[exposure]]
/// type = "vol_trigger"
/// vol_lookback = 63
/// target_vol = 0.15
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub top_n: Vec<usize>,
    pub exit_buffer: Vec<usize>,
    pub pnl_hold_threshold: Vec<f64>,
    /// Also sweep with the pnl hold switched off.
    pub include_no_pnl_hold: bool,
    pub slippage_rate: Vec<f64>,
    pub exposure: Vec<ExposureConfig>,
}

impl ParamGrid {
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    fn axis<T: Clone>(values: &[T], base: T) -> Vec<T> {
        if values.is_empty() {
            vec![base]
        } else {
            values.to_vec()
        }
    }

    fn pnl_axis(&self, base: Option<f64>) -> Vec<Option<f64>> {
        let mut axis: Vec<Option<f64>> = self.pnl_hold_threshold.iter().copied().map(Some).collect();
        if self.include_no_pnl_hold {
            axis.push(None);
        }
        if axis.is_empty() {
            axis.push(base);
        }
        axis
    }

    /// Returns the total number of configurations in this grid.
    pub fn size(&self) -> usize {
        self.top_n.len().max(1)
            * self.exit_buffer.len().max(1)
            * (self.pnl_hold_threshold.len() + usize::from(self.include_no_pnl_hold)).max(1)
            * self.slippage_rate.len().max(1)
            * self.exposure.len().max(1)
    }

    /// Generates all valid configurations in the grid.
    pub fn generate_configs(&self, base: &SimConfig) -> Vec<SimConfig> {
        let mut configs = Vec::with_capacity(self.size());
        for &top_n in &Self::axis(&self.top_n, base.top_n) {
            for &exit_buffer in &Self::axis(&self.exit_buffer, base.exit_buffer) {
                for &pnl_hold_threshold in &self.pnl_axis(base.pnl_hold_threshold) {
                    for &slippage_rate in &Self::axis(&self.slippage_rate, base.slippage_rate) {
                        for exposure in &Self::axis(&self.exposure, base.exposure.clone()) {
                            configs.push(SimConfig {
                                top_n,
                                exit_buffer,
                                pnl_hold_threshold,
                                slippage_rate,
                                exposure: exposure.clone(),
                                ..base.clone()
                            });
                        }
                    }
                }
            }
        }
        retain_valid(configs)
    }
}

/// Seeded random sampling over a grid's axes.
///
/// The same seed always yields the same configurations. Duplicate draws are
/// dropped, so fewer than `samples` configs come back from small grids.
#[derive(Debug, Clone)]
pub struct ParamSampler {
    pub grid: ParamGrid,
    pub samples: usize,
    pub seed: u64,
}

impl ParamSampler {
    pub fn new(grid: ParamGrid, samples: usize, seed: u64) -> Self {
        Self {
            grid,
            samples,
            seed,
        }
    }

    pub fn generate_configs(&self, base: &SimConfig) -> Vec<SimConfig> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let top_n = ParamGrid::axis(&self.grid.top_n, base.top_n);
        let exit_buffer = ParamGrid::axis(&self.grid.exit_buffer, base.exit_buffer);
        let pnl = self.grid.pnl_axis(base.pnl_hold_threshold);
        let slippage = ParamGrid::axis(&self.grid.slippage_rate, base.slippage_rate);
        let exposure = ParamGrid::axis(&self.grid.exposure, base.exposure.clone());

        let mut seen = HashSet::new();
        let mut configs = Vec::with_capacity(self.samples);
        for _ in 0..self.samples {
            let config = SimConfig {
                top_n: top_n[rng.gen_range(0..top_n.len())],
                exit_buffer: exit_buffer[rng.gen_range(0..exit_buffer.len())],
                pnl_hold_threshold: pnl[rng.gen_range(0..pnl.len())],
                slippage_rate: slippage[rng.gen_range(0..slippage.len())],
                exposure: exposure[rng.gen_range(0..exposure.len())].clone(),
                ..base.clone()
            };
            if seen.insert(crate::config::run_id(&config)) {
                configs.push(config);
            }
        }
        retain_valid(configs)
    }
}

fn retain_valid(configs: Vec<SimConfig>) -> Vec<SimConfig> {
    configs
        .into_iter()
        .filter(|c| match c.validate() {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "skipping invalid sweep config");
                false
            }
        })
        .collect()
}

/// One finished sweep run, without its series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepEntry {
    pub run_id: RunId,
    pub config: SimConfig,
    pub metrics: PerformanceMetrics,
}

/// Results from a parameter sweep, best CAGR first.
#[derive(Debug, Clone, Default)]
pub struct SweepResults {
    entries: Vec<SweepEntry>,
}

impl SweepResults {
    fn new(mut entries: Vec<SweepEntry>) -> Self {
        entries.sort_by(|a, b| cmp_cagr_desc(a.metrics.cagr, b.metrics.cagr));
        Self { entries }
    }

    /// Returns all results as a slice.
    pub fn all(&self) -> &[SweepEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, run_id: &str) -> Option<&SweepEntry> {
        self.entries.iter().find(|e| e.run_id == run_id)
    }

    pub fn best(&self) -> Option<&SweepEntry> {
        self.entries.first()
    }

    pub fn top_n(&self, n: usize) -> &[SweepEntry] {
        &self.entries[..n.min(self.entries.len())]
    }
}

/// Descending by CAGR; undefined CAGR sorts last.
fn cmp_cagr_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Run every config over the same inputs, optionally in parallel.
///
/// Each worker owns its simulator and state; inputs are shared read-only.
pub fn run_sweep(
    inputs: &LoadedInputs,
    configs: &[SimConfig],
    parallel: bool,
) -> Result<SweepResults, RunError> {
    info!(configs = configs.len(), parallel, "starting sweep");
    let run_one = |config: &SimConfig| -> Result<SweepEntry, RunError> {
        let result = run_backtest(inputs, config)?;
        Ok(SweepEntry {
            run_id: result.run_id,
            config: result.config,
            metrics: result.metrics,
        })
    };

    let entries: Vec<SweepEntry> = if parallel {
        configs.par_iter().map(run_one).collect::<Result<Vec<_>, _>>()?
    } else {
        configs.iter().map(run_one).collect::<Result<Vec<_>, _>>()?
    };

    Ok(SweepResults::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> ParamGrid {
        ParamGrid {
            top_n: vec![10, 25],
            exit_buffer: vec![0, 5, 10],
            pnl_hold_threshold: vec![0.05],
            include_no_pnl_hold: true,
            slippage_rate: vec![],
            exposure: vec![ExposureConfig::Baseline, ExposureConfig::cooldown(1, 0.25)],
        }
    }

    #[test]
    fn grid_size_is_cartesian_product() {
        // 2 top_n × 3 buffers × 2 pnl × 1 slippage × 2 exposure
        assert_eq!(grid().size(), 24);
        let configs = grid().generate_configs(&SimConfig::default());
        assert_eq!(configs.len(), 24);
        assert!(configs.iter().all(|c| c.slippage_rate == 0.002));
        assert!(configs.iter().any(|c| c.pnl_hold_threshold.is_none()));
    }

    #[test]
    fn empty_grid_yields_base_config() {
        let base = SimConfig { top_n: 7, ..SimConfig::default() };
        let configs = ParamGrid::default().generate_configs(&base);
        assert_eq!(configs, vec![base]);
    }

    #[test]
    fn invalid_grid_points_are_dropped() {
        let g = ParamGrid { top_n: vec![0, 5], ..ParamGrid::default() };
        let configs = g.generate_configs(&SimConfig::default());
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].top_n, 5);
    }

    #[test]
    fn sampler_is_deterministic_per_seed() {
        let base = SimConfig::default();
        let a = ParamSampler::new(grid(), 10, 42).generate_configs(&base);
        let b = ParamSampler::new(grid(), 10, 42).generate_configs(&base);
        assert_eq!(a, b);
        assert!(!a.is_empty() && a.len() <= 10);

        let ids: HashSet<_> = a.iter().map(crate::config::run_id).collect();
        assert_eq!(ids.len(), a.len());
    }

    #[test]
    fn grid_parses_from_toml() {
        let g = ParamGrid::from_toml(
            r#"
top_n = [10, 25]
include_no_pnl_hold = true

[[exposure]]
type = "baseline"

[[exposure]]
type = "vol_trigger"
vol_lookback = 63
target_vol = 0.15
"#,
        )
        .unwrap();
        assert_eq!(g.top_n, vec![10, 25]);
        assert_eq!(g.exposure[1], ExposureConfig::vol_trigger(63, 0.15));
        assert_eq!(g.size(), 4);
    }

    #[test]
    fn undefined_cagr_sorts_last() {
        let entry = |id: &str, cagr: Option<f64>| SweepEntry {
            run_id: id.into(),
            config: SimConfig::default(),
            metrics: PerformanceMetrics { cagr, ..PerformanceMetrics::default() },
        };
        let results = SweepResults::new(vec![
            entry("a", None),
            entry("b", Some(0.1)),
            entry("c", Some(0.3)),
        ]);
        let order: Vec<&str> = results.all().iter().map(|e| e.run_id.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
        assert_eq!(results.best().unwrap().run_id, "c");
        assert_eq!(results.top_n(10).len(), 3);
    }
}
