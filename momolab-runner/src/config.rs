//! Serializable run configuration, loaded from TOML.

use std::path::{Path, PathBuf};

use momolab_core::engine::{ConfigError, SimConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

/// Errors from reading or validating a run configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid simulation parameters: {0}")]
    Invalid(#[from] ConfigError),
}

/// Input file locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    /// Directory of `*_day.csv` price files.
    pub prices_dir: PathBuf,
    /// Signals CSV with `date, symbol, rank`.
    pub signals: PathBuf,
    /// Optional benchmark CSV with `date, close`.
    #[serde(default)]
    pub benchmark: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
        }
    }
}

/// A complete, reproducible run: inputs, simulation parameters, output.
///
/// ```toml
/// [data]
/// prices_dir = "data/prices"
/// signals = "data/momentum_signals.csv"
/// benchmark = "data/NIFTYBEES_day.csv"
///
/// [simulation]
/// top_n = 25
/// exit_buffer = 10
///
/// [simulation.exposure]
/// type = "cooldown"
/// cooldown_weeks = 2
/// staged_step = 0.25
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestConfig {
    pub data: DataConfig,
    #[serde(default)]
    pub simulation: SimConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl BacktestConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        let config: Self = toml::from_str(content)?;
        config.simulation.validate()?;
        Ok(config)
    }

    /// Load from a file. Relative data and output paths are resolved
    /// against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigFileError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn run_id(&self) -> RunId {
        run_id(&self.simulation)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.data.prices_dir);
        resolve(&mut self.data.signals);
        if let Some(bench) = self.data.benchmark.as_mut() {
            resolve(bench);
        }
        resolve(&mut self.output.dir);
    }
}

/// Deterministic BLAKE3 id over the serialized simulation parameters.
pub fn run_id(config: &SimConfig) -> RunId {
    let bytes = serde_json::to_vec(config).unwrap_or_else(|_| format!("{config:?}").into_bytes());
    blake3::hash(&bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use momolab_core::engine::{ExposureConfig, ZeroExposureMode};

    const SAMPLE: &str = r#"
[data]
prices_dir = "prices"
signals = "signals.csv"

[simulation]
top_n = 10
exit_buffer = 5
pnl_hold_threshold = 0.05
zero_exposure = "discard"

[simulation.exposure]
type = "cooldown"
cooldown_weeks = 2
staged_step = 0.5
"#;

    #[test]
    fn parses_sections_and_fills_defaults() {
        let cfg = BacktestConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(cfg.data.prices_dir, PathBuf::from("prices"));
        assert_eq!(cfg.data.benchmark, None);
        assert_eq!(cfg.simulation.top_n, 10);
        assert_eq!(cfg.simulation.exit_buffer, 5);
        assert_eq!(cfg.simulation.pnl_hold_threshold, Some(0.05));
        assert_eq!(cfg.simulation.zero_exposure, ZeroExposureMode::Discard);
        assert_eq!(cfg.simulation.exposure, ExposureConfig::cooldown(2, 0.5));
        assert_eq!(cfg.simulation.initial_capital, 1_000_000.0);
        assert_eq!(cfg.output.dir, PathBuf::from("results"));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let toml = SAMPLE.replace("top_n = 10", "top_n = 0");
        assert!(matches!(
            BacktestConfig::from_toml(&toml),
            Err(ConfigFileError::Invalid(ConfigError::TopN))
        ));
        assert!(matches!(
            BacktestConfig::from_toml("[data]\nprices_dir = 1"),
            Err(ConfigFileError::Parse(_))
        ));
    }

    #[test]
    fn toml_roundtrip_preserves_config() {
        let cfg = BacktestConfig::from_toml(SAMPLE).unwrap();
        let back = BacktestConfig::from_toml(&cfg.to_toml().unwrap()).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn run_id_is_deterministic_and_parameter_sensitive() {
        let a = SimConfig::default();
        let b = SimConfig { exit_buffer: 3, ..SimConfig::default() };
        assert_eq!(run_id(&a), run_id(&a.clone()));
        assert_ne!(run_id(&a), run_id(&b));
        assert_eq!(run_id(&a).len(), 64);
    }

    #[test]
    fn from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let cfg = BacktestConfig::from_file(&path).unwrap();
        assert_eq!(cfg.data.prices_dir, dir.path().join("prices"));
        assert_eq!(cfg.data.signals, dir.path().join("signals.csv"));
        assert_eq!(cfg.output.dir, dir.path().join("results"));
    }
}
