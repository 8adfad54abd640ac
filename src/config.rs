//! Configuration management
//!
//! Loads JSON configuration files with environment-variable support for API
//! credentials. Every section has sensible defaults so a minimal config file
//! only overrides what it cares about.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::backtest::BacktestConfig;
use crate::engine::EngineConfig;
use crate::optimizer::ParamGrid;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeSettings,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub backtest: BacktestSettings,
    /// Parameter ranges for grid-search optimization (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<ParamGrid>,
    #[serde(default = "default_switch_db")]
    pub switch_db: String,
}

fn default_switch_db() -> String {
    "state/switch.db".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            exchange: ExchangeSettings::default(),
            engine: EngineConfig::default(),
            backtest: BacktestSettings::default(),
            grid: None,
            switch_db: default_switch_db(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        // Load API credentials from environment if not set
        if let Ok(api_key) = std::env::var("EXCHANGE_API_KEY") {
            config.exchange.api_key = Some(api_key);
        }
        if let Ok(api_secret) = std::env::var("EXCHANGE_API_SECRET") {
            config.exchange.api_secret = Some(api_secret);
        }

        Ok(config)
    }

    /// Backtest configuration derived from the engine section
    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            initial_balance: self.backtest.initial_balance,
            min_confidence: self.engine.min_confidence,
            max_positions: self.engine.max_positions,
            max_consecutive_trades: self.engine.max_consecutive_trades,
            scale_in_threshold_pct: self.engine.scale_in_threshold_pct,
            risk: self.engine.risk,
        }
    }
}

/// Exchange connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    crate::exchange::client::DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        ExchangeSettings {
            api_key: None,
            api_secret: None,
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Backtest-only settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    #[serde(default = "default_initial_balance")]
    pub initial_balance: f64,
}

fn default_initial_balance() -> f64 {
    10_000.0
}

impl Default for BacktestSettings {
    fn default() -> Self {
        BacktestSettings {
            initial_balance: default_initial_balance(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.engine.min_confidence, 60.0);
        assert_eq!(config.engine.max_positions, 3);
        assert_eq!(config.backtest.initial_balance, 10_000.0);
        assert_eq!(config.switch_db, "state/switch.db");
        assert!(config.grid.is_none());
    }

    #[test]
    fn test_backtest_config_mirrors_engine_section() {
        let config: Config = serde_json::from_str(
            r#"{"engine": {"min_confidence": 70.0, "max_positions": 2}}"#,
        )
        .unwrap();

        let bt = config.backtest_config();
        assert_eq!(bt.min_confidence, 70.0);
        assert_eq!(bt.max_positions, 2);
        assert_eq!(bt.initial_balance, 10_000.0);
    }
}
