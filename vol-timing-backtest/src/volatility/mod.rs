//! Volatility forecasting.
//!
//! Provides:
//! - The [`VolatilityForecaster`] contract consumed by the simulator
//! - GARCH(p, q) fitted by maximum likelihood (Nelder–Mead)
//! - EWMA and trailing realized volatility baselines
//! - [`ForecasterConfig`] for selecting one from configuration

pub mod ewma;
pub mod forecaster;
pub mod garch;
pub mod optimizer;
pub mod realized;

pub use ewma::EwmaForecaster;
pub use forecaster::{EstimationError, ModelOrder, VolatilityForecaster};
pub use garch::{GarchFit, GarchForecaster, GarchSettings};
pub use optimizer::{Minimum, NelderMead};
pub use realized::RealizedVolatilityForecaster;

use serde::{Deserialize, Serialize};

/// Which forecaster to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ForecasterKind {
    #[default]
    Garch,
    Ewma,
    Realized,
}

impl std::str::FromStr for ForecasterKind {
    type Err = EstimationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "garch" => Ok(Self::Garch),
            "ewma" => Ok(Self::Ewma),
            "realized" => Ok(Self::Realized),
            other => Err(EstimationError::InvalidParameter(format!(
                "unknown forecaster '{}'",
                other
            ))),
        }
    }
}

/// Forecaster selection and per-model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecasterConfig {
    #[serde(default)]
    pub kind: ForecasterKind,
    #[serde(default)]
    pub garch: GarchSettings,
    #[serde(default = "default_ewma_lambda")]
    pub ewma_lambda: f64,
}

fn default_ewma_lambda() -> f64 {
    ewma::DEFAULT_LAMBDA
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            kind: ForecasterKind::default(),
            garch: GarchSettings::default(),
            ewma_lambda: default_ewma_lambda(),
        }
    }
}

impl ForecasterConfig {
    pub fn build(&self) -> Result<Box<dyn VolatilityForecaster>, EstimationError> {
        Ok(match self.kind {
            ForecasterKind::Garch => Box::new(GarchForecaster::new(self.garch.clone())),
            ForecasterKind::Ewma => Box::new(EwmaForecaster::new(self.ewma_lambda)?),
            ForecasterKind::Realized => Box::new(RealizedVolatilityForecaster),
        })
    }
}
