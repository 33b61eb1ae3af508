//! Simulation configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::volatility::ModelOrder;

use super::engine::SimulationError;
use super::position::Position;

/// What to do when the forecaster fails on a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run and report the failing step.
    #[default]
    Abort,
    /// Take `fallback_position` for the step and keep going.
    Fallback,
}

/// Configuration for a walk-forward run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Fraction of the series used as the trailing window (0 < rate < 1).
    #[serde(default = "default_train_size_rate")]
    pub train_size_rate: f64,

    /// Starting balance.
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,

    /// Forecasts above this (percent units) go short.
    #[serde(default = "default_volatility_threshold")]
    pub volatility_threshold: f64,

    /// Lag orders passed to the forecaster.
    #[serde(default)]
    pub order: ModelOrder,

    #[serde(default)]
    pub on_estimation_failure: FailurePolicy,

    /// Position taken on failed steps under [`FailurePolicy::Fallback`].
    #[serde(default)]
    pub fallback_position: Position,

    /// Compute forecasts on the rayon pool before folding.
    #[serde(default)]
    pub parallel: bool,
}

fn default_train_size_rate() -> f64 {
    0.8
}

fn default_initial_balance() -> Decimal {
    Decimal::from(10_000_000)
}

fn default_volatility_threshold() -> f64 {
    5.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            train_size_rate: default_train_size_rate(),
            initial_balance: default_initial_balance(),
            volatility_threshold: default_volatility_threshold(),
            order: ModelOrder::default(),
            on_estimation_failure: FailurePolicy::default(),
            fallback_position: Position::default(),
            parallel: false,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if !(self.train_size_rate > 0.0 && self.train_size_rate < 1.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "train_size_rate must be in (0, 1), got {}",
                self.train_size_rate
            )));
        }
        if self.initial_balance <= Decimal::ZERO {
            return Err(SimulationError::InvalidConfig(format!(
                "initial_balance must be positive, got {}",
                self.initial_balance
            )));
        }
        if !(self.volatility_threshold.is_finite() && self.volatility_threshold > 0.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "volatility_threshold must be a positive number, got {}",
                self.volatility_threshold
            )));
        }
        Ok(())
    }

    /// `floor(len * train_size_rate)`.
    pub fn train_size(&self, len: usize) -> usize {
        (len as f64 * self.train_size_rate).floor() as usize
    }
}
