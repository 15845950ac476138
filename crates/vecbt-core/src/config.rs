use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;
use crate::params::{ParamAxis, ParamGrid, ParamValue};

/// Top-level backtest config, parsed from one or more TOML files.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BacktestConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub walk_forward: WalkForwardConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BacktestConfig {
    /// Load config from a TOML file path.
    pub fn from_toml(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse config from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load and merge multiple TOML files (later files override earlier).
    pub fn from_toml_files(paths: &[&Path]) -> Result<Self, ConfigError> {
        let mut base = toml::Value::Table(toml::Table::new());
        for path in paths {
            let content = std::fs::read_to_string(path)?;
            let overlay: toml::Value =
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            merge_toml(&mut base, overlay);
        }

        base.try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))
    }

    /// Apply `BACKTEST_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| -> Result<Option<f64>, ConfigError> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| ConfigError::invalid(key, format!("not a number: {:?}", raw))),
                None => Ok(None),
            }
        };

        if let Some(v) = read("BACKTEST_FEE_RATE")? {
            self.engine.fee_rate = v;
        }
        if let Some(v) = read("BACKTEST_SLIPPAGE")? {
            self.engine.slippage = v;
        }
        if let Some(v) = read("BACKTEST_INITIAL_CAPITAL")? {
            self.engine.initial_capital = v;
        }
        if let Some(v) = read("BACKTEST_TRAIN_RATIO")? {
            self.walk_forward.train_ratio = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.walk_forward.validate()?;
        self.grid.validate()
    }
}

fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    if let (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) = (base, overlay) {
        for (key, value) in overlay_table {
            if let Some(base_value) = base_table.get_mut(&key) {
                if base_value.is_table() && value.is_table() {
                    merge_toml(base_value, value);
                    continue;
                }
            }
            base_table.insert(key, value);
        }
    }
}

/// Cost and capital parameters consumed by the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_0_001")]
    pub fee_rate: f64,
    #[serde(default = "default_0_001")]
    pub slippage: f64,
    #[serde(default = "default_10_000_000")]
    pub initial_capital: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fee_rate: 0.001,
            slippage: 0.001,
            initial_capital: 10_000_000.0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fee_rate.is_finite() && self.fee_rate >= 0.0) {
            return Err(ConfigError::invalid("engine.fee_rate", "must be >= 0"));
        }
        if !(self.slippage.is_finite() && self.slippage >= 0.0) {
            return Err(ConfigError::invalid("engine.slippage", "must be >= 0"));
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(ConfigError::invalid("engine.initial_capital", "must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalkForwardConfig {
    #[serde(default = "default_0_5")]
    pub train_ratio: f64,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self { train_ratio: 0.5 }
    }
}

impl WalkForwardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(ConfigError::invalid(
                "walk_forward.train_ratio",
                "must lie strictly between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// Parameter search setup: which strategy, which metric, which candidates.
#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_ema_cross")]
    pub strategy: String,
    #[serde(default = "default_sharpe_ratio")]
    pub sort_by: String,
    #[serde(default = "default_grid_params")]
    pub param: Vec<ParamAxis>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            strategy: default_ema_cross(),
            sort_by: default_sharpe_ratio(),
            param: default_grid_params(),
        }
    }
}

impl GridConfig {
    pub fn grid(&self) -> ParamGrid {
        ParamGrid::from_axes(self.param.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, axis) in self.param.iter().enumerate() {
            if axis.values.is_empty() {
                return Err(ConfigError::invalid(
                    format!("grid.param.{}", axis.name),
                    "candidate list is empty",
                ));
            }
            if self.param[..i].iter().any(|a| a.name == axis.name) {
                return Err(ConfigError::invalid(
                    format!("grid.param.{}", axis.name),
                    "declared more than once",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_info")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_info(),
        }
    }
}

// Default value helpers
fn default_0_001() -> f64 { 0.001 }
fn default_0_5() -> f64 { 0.5 }
fn default_10_000_000() -> f64 { 10_000_000.0 }
fn default_ema_cross() -> String { "ema_cross".into() }
fn default_sharpe_ratio() -> String { "sharpe_ratio".into() }
fn default_info() -> String { "info".into() }

fn default_grid_params() -> Vec<ParamAxis> {
    let ints = |values: &[i64]| values.iter().map(|&v| ParamValue::Int(v)).collect();
    vec![
        ParamAxis { name: "short_period".into(), values: ints(&[3, 5, 7, 10]) },
        ParamAxis { name: "long_period".into(), values: ints(&[15, 20, 25, 30]) },
        ParamAxis { name: "rsi_threshold".into(), values: ints(&[40, 50, 60]) },
    ]
}
