//! Configuration file support for replication backtests.
//!
//! Allows loading run configurations from TOML files for reproducibility.

use crate::engine::EngineConfig;
use crate::error::{ReplicationError, Result};
use crate::periods::SplitConfig;
use crate::solver::SolverConfig;
use crate::strategies::default_targets;
use crate::types::GridPoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Complete replication run configuration loaded from a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationFileConfig {
    /// Input file paths.
    #[serde(default)]
    pub data: DataSettings,
    /// In-sample / out-of-sample split.
    #[serde(default)]
    pub split: SplitSettings,
    /// The (q, m) grid to sweep.
    #[serde(default)]
    pub grid: GridSettings,
    /// External solver settings.
    #[serde(default)]
    pub solver: SolverSettings,
    /// Market cap source settings.
    #[serde(default)]
    pub caps: CapSettings,
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineSettings,
    /// Attribute-exposure targets for the attribute strategy.
    #[serde(default = "default_targets")]
    pub targets: BTreeMap<String, f64>,
}

impl Default for ReplicationFileConfig {
    fn default() -> Self {
        Self {
            data: DataSettings::default(),
            split: SplitSettings::default(),
            grid: GridSettings::default(),
            solver: SolverSettings::default(),
            caps: CapSettings::default(),
            engine: EngineSettings::default(),
            targets: default_targets(),
        }
    }
}

/// Input file paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    /// Wide returns CSV (date column + one column per ticker).
    pub returns: Option<String>,
    /// Benchmark returns CSV.
    pub benchmark: Option<String>,
    /// Binary ticker attribute CSV.
    pub attributes: Option<String>,
    /// Column holding benchmark returns.
    #[serde(default = "default_benchmark_column")]
    pub benchmark_column: String,
    /// Label for the benchmark in reports and the combined table.
    #[serde(default = "default_benchmark_label")]
    pub benchmark_label: String,
    /// Date format override for CSV parsing.
    pub date_format: Option<String>,
}

fn default_benchmark_column() -> String {
    "Portfolio_Return".to_string()
}

fn default_benchmark_label() -> String {
    "SP100".to_string()
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            returns: None,
            benchmark: None,
            attributes: None,
            benchmark_column: default_benchmark_column(),
            benchmark_label: default_benchmark_label(),
            date_format: None,
        }
    }
}

/// In-sample / out-of-sample split settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitSettings {
    /// Fraction of history used as in-sample data.
    #[serde(default = "default_ratio")]
    pub in_sample_ratio: f64,
}

fn default_ratio() -> f64 {
    0.7
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            in_sample_ratio: 0.7,
        }
    }
}

/// The (q, m) grid to sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSettings {
    /// Tickers selected per period.
    #[serde(default = "default_qs")]
    pub qs: Vec<usize>,
    /// Rebalancing period counts.
    #[serde(default = "default_ms")]
    pub ms: Vec<usize>,
}

fn default_qs() -> Vec<usize> {
    vec![10, 15, 20]
}

fn default_ms() -> Vec<usize> {
    vec![4, 6, 8]
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            qs: default_qs(),
            ms: default_ms(),
        }
    }
}

impl GridSettings {
    /// Cartesian product of the configured qs and ms.
    pub fn points(&self) -> Vec<GridPoint> {
        self.qs
            .iter()
            .flat_map(|&q| self.ms.iter().map(move |&m| GridPoint::new(q, m)))
            .collect()
    }
}

/// External solver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSettings {
    #[serde(default = "default_ampl_cmd")]
    pub ampl_cmd: String,
    #[serde(default = "default_solver_name")]
    pub solver: String,
    #[serde(default = "default_model_dir")]
    pub model_dir: String,
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
    #[serde(default)]
    pub keep_files: bool,
}

fn default_ampl_cmd() -> String {
    "ampl".to_string()
}

fn default_solver_name() -> String {
    "gurobi".to_string()
}

fn default_model_dir() -> String {
    "models".to_string()
}

fn default_work_dir() -> String {
    "solver_work".to_string()
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            ampl_cmd: default_ampl_cmd(),
            solver: default_solver_name(),
            model_dir: default_model_dir(),
            work_dir: default_work_dir(),
            keep_files: false,
        }
    }
}

/// Market cap source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapSettings {
    /// "cached" reads the CSV at `path`; "live" queries the data provider.
    #[serde(default = "default_cap_provider")]
    pub provider: String,
    /// Cached caps CSV path.
    pub path: Option<String>,
    /// Override the live provider base URL.
    pub base_url: Option<String>,
}

fn default_cap_provider() -> String {
    "cached".to_string()
}

impl Default for CapSettings {
    fn default() -> Self {
        Self {
            provider: default_cap_provider(),
            path: None,
            base_url: None,
        }
    }
}

/// Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_true")]
    pub show_progress: bool,
    /// Seed for the random baseline.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_true() -> bool {
    true
}

fn default_seed() -> u64 {
    42
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            show_progress: true,
            seed: 42,
        }
    }
}

impl ReplicationFileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ReplicationError::ConfigError(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Basic sanity checks on loaded values.
    pub fn validate(&self) -> Result<()> {
        if self.split.in_sample_ratio <= 0.0 || self.split.in_sample_ratio >= 1.0 {
            return Err(ReplicationError::ConfigError(format!(
                "in_sample_ratio must be in (0, 1), got {}",
                self.split.in_sample_ratio
            )));
        }
        if self.grid.qs.is_empty() || self.grid.ms.is_empty() {
            return Err(ReplicationError::ConfigError(
                "Grid qs and ms must be non-empty".to_string(),
            ));
        }
        if self.grid.qs.iter().any(|&q| q == 0) || self.grid.ms.iter().any(|&m| m == 0) {
            return Err(ReplicationError::ConfigError(
                "Grid values must be positive".to_string(),
            ));
        }
        match self.caps.provider.as_str() {
            "cached" | "live" => Ok(()),
            other => Err(ReplicationError::ConfigError(format!(
                "Unknown cap provider '{}', expected 'cached' or 'live'",
                other
            ))),
        }
    }

    /// An example configuration with commented defaults, for `init`.
    pub fn example() -> Self {
        Self {
            data: DataSettings {
                returns: Some("data/returns.csv".to_string()),
                benchmark: Some("data/sp100returns.csv".to_string()),
                attributes: Some("data/ticker_attributes.csv".to_string()),
                ..Default::default()
            },
            caps: CapSettings {
                path: Some("data/market_caps.csv".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn split_config(&self) -> SplitConfig {
        SplitConfig {
            in_sample_ratio: self.split.in_sample_ratio,
            ..Default::default()
        }
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            ampl_cmd: self.solver.ampl_cmd.clone(),
            solver_name: self.solver.solver.clone(),
            model_dir: PathBuf::from(&self.solver.model_dir),
            work_dir: PathBuf::from(&self.solver.work_dir),
            keep_files: self.solver.keep_files,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            split: self.split_config(),
            show_progress: self.engine.show_progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let config = ReplicationFileConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ReplicationFileConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.grid.qs, vec![10, 15, 20]);
        assert_eq!(parsed.solver.solver, "gurobi");
        assert_eq!(parsed.targets.len(), 12);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let toml_str = r#"
            [grid]
            qs = [5]
            ms = [2, 3]

            [solver]
            ampl_cmd = "/opt/ampl/ampl"
        "#;

        let config: ReplicationFileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.grid.qs, vec![5]);
        assert_eq!(config.solver.ampl_cmd, "/opt/ampl/ampl");
        // Untouched sections keep defaults.
        assert!((config.split.in_sample_ratio - 0.7).abs() < 1e-12);
        assert_eq!(config.caps.provider, "cached");
    }

    #[test]
    fn test_grid_points_cartesian_product() {
        let grid = GridSettings {
            qs: vec![5, 10],
            ms: vec![2, 4],
        };
        let points = grid.points();
        assert_eq!(points.len(), 4);
        assert_eq!(points[0], GridPoint::new(5, 2));
        assert_eq!(points[3], GridPoint::new(10, 4));
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let mut config = ReplicationFileConfig::default();
        config.split.in_sample_ratio = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_provider() {
        let mut config = ReplicationFileConfig::default();
        config.caps.provider = "psychic".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("replication.toml");

        let config = ReplicationFileConfig::example();
        config.save(&path).unwrap();

        let loaded = ReplicationFileConfig::load(&path).unwrap();
        assert_eq!(loaded.data.returns, Some("data/returns.csv".to_string()));
        assert_eq!(loaded.data.benchmark_label, "SP100");
    }
}
