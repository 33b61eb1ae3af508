//! Application configuration.
//!
//! Everything the CLI needs for a run, loaded from a TOML file. Every
//! section and field has a default, so a partial file (or none at all)
//! is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analytics::AnalyticsConfig;
use crate::backtest::SimulationConfig;
use crate::data::{ColumnMapping, PriceLoader};
use crate::metrics::MetricsConfig;
use crate::validation::IntegrityConfig;
use crate::volatility::ForecasterConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Where the prices come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV or Parquet price file.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Defaults to the file stem.
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub columns: ColumnMapping,
}

impl DataConfig {
    pub fn loader(&self) -> Result<PriceLoader, ConfigError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("data.path is not set".to_string()))?;
        let mut loader = PriceLoader::new(path).with_columns(self.columns.clone());
        if let Some(symbol) = &self.symbol {
            loader = loader.with_symbol(symbol);
        }
        Ok(loader)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub forecaster: ForecasterConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub validation: IntegrityConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.forecaster
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.metrics.periods_per_year == 0 {
            return Err(ConfigError::Invalid(
                "metrics.periods_per_year must be positive".to_string(),
            ));
        }
        if !self.metrics.risk_free_rate_annual.is_finite() {
            return Err(ConfigError::Invalid(
                "metrics.risk_free_rate_annual must be finite".to_string(),
            ));
        }
        if self.validation.max_gap_days < 1 {
            return Err(ConfigError::Invalid(
                "validation.max_gap_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{FailurePolicy, Position};
    use crate::volatility::ForecasterKind;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.simulation.train_size_rate, 0.8);
        assert_eq!(config.simulation.initial_balance, dec!(10000000));
        assert_eq!(config.metrics.periods_per_year, 252);
        assert_eq!(config.metrics.risk_free_rate_annual, 0.01);
        assert_eq!(config.validation.max_gap_days, 7);
        assert_eq!(config.analytics.acf_lags, 30);
        assert_eq!(config.forecaster.kind, ForecasterKind::Garch);
        assert_eq!(config.data.columns.price, "adj_close");
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml_str(
            r#"
            [data]
            path = "data/N225.csv"
            symbol = "^N225"

            [data.columns]
            price = "Adj Close"

            [simulation]
            volatility_threshold = 2.5
            on_estimation_failure = "fallback"
            fallback_position = "short"
            initial_balance = 1000000

            [simulation.order]
            p = 2
            q = 1

            [forecaster]
            kind = "ewma"
            ewma_lambda = 0.97
            "#,
        )
        .unwrap();

        assert_eq!(config.simulation.volatility_threshold, 2.5);
        assert_eq!(config.simulation.on_estimation_failure, FailurePolicy::Fallback);
        assert_eq!(config.simulation.fallback_position, Position::Short);
        assert_eq!(config.simulation.initial_balance, dec!(1000000));
        assert_eq!(config.simulation.order.p, 2);
        assert_eq!(config.forecaster.kind, ForecasterKind::Ewma);
        assert_eq!(config.data.columns.price, "Adj Close");
        assert_eq!(config.data.columns.date, "date");

        let loader = config.data.loader().unwrap();
        assert_eq!(loader.symbol(), "^N225");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            AppConfig::from_toml_str("[simulation]\ntrain_size_rate = 1.5\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("[forecaster]\nkind = \"ewma\"\newma_lambda = 2.0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("[forecaster]\nkind = \"arima\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_data_path() {
        let config = AppConfig::default();
        assert!(matches!(config.data.loader(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[metrics]\nrisk_free_rate_annual = 0.0\n").unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.metrics.risk_free_rate_annual, 0.0);

        assert!(matches!(
            AppConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
