//! Exponentially weighted moving average (RiskMetrics) forecaster.

use crate::data::TrailingWindow;

use super::forecaster::{prepare_window, EstimationError, ModelOrder, VolatilityForecaster};

pub const DEFAULT_LAMBDA: f64 = 0.94;

/// `sigma2_t = lambda * sigma2_{t-1} + (1 - lambda) * r_{t-1}^2`, seeded with
/// the window's sample variance. The model order is ignored.
#[derive(Debug, Clone, Copy)]
pub struct EwmaForecaster {
    lambda: f64,
}

impl EwmaForecaster {
    pub fn new(lambda: f64) -> Result<Self, EstimationError> {
        if !(lambda > 0.0 && lambda < 1.0) {
            return Err(EstimationError::InvalidParameter(format!(
                "EWMA decay must be in (0, 1), got {}",
                lambda
            )));
        }
        Ok(Self { lambda })
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

impl Default for EwmaForecaster {
    fn default() -> Self {
        Self {
            lambda: DEFAULT_LAMBDA,
        }
    }
}

impl VolatilityForecaster for EwmaForecaster {
    fn name(&self) -> &str {
        "ewma"
    }

    fn forecast(
        &self,
        window: &TrailingWindow<'_>,
        _order: ModelOrder,
    ) -> Result<f64, EstimationError> {
        let (returns, seed) = prepare_window(window, 2)?;
        let variance = returns.iter().fold(seed, |var, r| {
            self.lambda * var + (1.0 - self.lambda) * r * r
        });
        Ok(variance.sqrt())
    }
}
