//! Volatility forecaster contract.
//!
//! A forecaster maps a trailing window of returns (in percent units) to a
//! one-step-ahead volatility estimate on the same scale. Implementations
//! hold no state between calls, so the simulator is free to call them in
//! any order and from several threads.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analytics::statistics::variance;
use crate::data::TrailingWindow;

/// Windows whose variance is below this are treated as constant.
pub(crate) const MIN_VARIANCE: f64 = 1e-12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimationError {
    #[error("window too short: need at least {required} observations, got {actual}")]
    WindowTooShort { required: usize, actual: usize },

    #[error("window has zero variance")]
    ZeroVariance,

    #[error("optimizer did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("invalid model order p={p}, q={q}: {reason}")]
    InvalidOrder { p: usize, q: usize, reason: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("forecast is not a finite non-negative number: {0}")]
    InvalidForecast(f64),
}

/// Lag orders passed through to the forecaster.
///
/// `p` counts lagged squared shocks (ARCH terms), `q` counts lagged
/// conditional variances (GARCH terms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOrder {
    pub p: usize,
    pub q: usize,
}

impl ModelOrder {
    pub fn new(p: usize, q: usize) -> Self {
        Self { p, q }
    }

    pub fn max_lag(&self) -> usize {
        self.p.max(self.q)
    }
}

impl Default for ModelOrder {
    fn default() -> Self {
        Self { p: 1, q: 1 }
    }
}

/// One-step-ahead volatility forecaster.
pub trait VolatilityForecaster: Send + Sync {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &str;

    /// Forecast the standard deviation of the return following the window.
    fn forecast(
        &self,
        window: &TrailingWindow<'_>,
        order: ModelOrder,
    ) -> Result<f64, EstimationError>;
}

impl<F: VolatilityForecaster + ?Sized> VolatilityForecaster for &F {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn forecast(
        &self,
        window: &TrailingWindow<'_>,
        order: ModelOrder,
    ) -> Result<f64, EstimationError> {
        (**self).forecast(window, order)
    }
}

impl<F: VolatilityForecaster + ?Sized> VolatilityForecaster for Box<F> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn forecast(
        &self,
        window: &TrailingWindow<'_>,
        order: ModelOrder,
    ) -> Result<f64, EstimationError> {
        (**self).forecast(window, order)
    }
}

impl<F: VolatilityForecaster + ?Sized> VolatilityForecaster for Arc<F> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn forecast(
        &self,
        window: &TrailingWindow<'_>,
        order: ModelOrder,
    ) -> Result<f64, EstimationError> {
        (**self).forecast(window, order)
    }
}

/// Common preconditions: at least `required` observations and non-zero
/// sample variance. Returns the scaled returns and their sample variance.
pub(crate) fn prepare_window(
    window: &TrailingWindow<'_>,
    required: usize,
) -> Result<(Vec<f64>, f64), EstimationError> {
    let required = required.max(2);
    if window.len() < required {
        return Err(EstimationError::WindowTooShort {
            required,
            actual: window.len(),
        });
    }

    let returns = window.scaled_returns();
    let var = variance(&returns, 1);
    if !var.is_finite() || var < MIN_VARIANCE {
        return Err(EstimationError::ZeroVariance);
    }
    Ok((returns, var))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ReturnPoint, ReturnSeries};
    use chrono::NaiveDate;

    fn series(values: &[f64]) -> ReturnSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        ReturnSeries::from_points(
            "TEST",
            values
                .iter()
                .enumerate()
                .map(|(i, &value)| ReturnPoint {
                    date: start + chrono::Duration::days(i as i64),
                    value,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_default_order() {
        let order = ModelOrder::default();
        assert_eq!((order.p, order.q), (1, 1));
        assert_eq!(ModelOrder::new(2, 1).max_lag(), 2);
    }

    #[test]
    fn test_prepare_window_rejects_short_window() {
        let s = series(&[0.01, 0.02, -0.01, 0.0]);
        let window = s.trailing_window(3, 3).unwrap();
        assert_eq!(
            prepare_window(&window, 10).unwrap_err(),
            EstimationError::WindowTooShort {
                required: 10,
                actual: 3
            }
        );
    }

    #[test]
    fn test_prepare_window_rejects_constant_window() {
        let s = series(&[0.01, 0.01, 0.01, 0.01, 0.02]);
        let window = s.trailing_window(4, 4).unwrap();
        assert_eq!(
            prepare_window(&window, 2).unwrap_err(),
            EstimationError::ZeroVariance
        );
    }

    #[test]
    fn test_prepare_window_scales_returns() {
        let s = series(&[0.01, -0.01, 0.0]);
        let window = s.trailing_window(2, 2).unwrap();
        let (returns, var) = prepare_window(&window, 2).unwrap();
        assert!((returns[0] - 1.0).abs() < 1e-12);
        assert!((var - 2.0).abs() < 1e-12);
    }
}
