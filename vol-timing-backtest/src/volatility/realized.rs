//! Trailing realized volatility: sample standard deviation of the window.

use crate::data::TrailingWindow;

use super::forecaster::{prepare_window, EstimationError, ModelOrder, VolatilityForecaster};

#[derive(Debug, Clone, Copy, Default)]
pub struct RealizedVolatilityForecaster;

impl VolatilityForecaster for RealizedVolatilityForecaster {
    fn name(&self) -> &str {
        "realized"
    }

    fn forecast(
        &self,
        window: &TrailingWindow<'_>,
        _order: ModelOrder,
    ) -> Result<f64, EstimationError> {
        let (_, variance) = prepare_window(window, 2)?;
        Ok(variance.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ReturnPoint, ReturnSeries};
    use chrono::{Duration, NaiveDate};

    #[test]
    fn test_sample_standard_deviation() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let points = [0.02, 0.04, 0.04, 0.04, 0.05, 0.05, 0.07, 0.09, 0.0]
            .iter()
            .enumerate()
            .map(|(i, &value)| ReturnPoint {
                date: start + Duration::days(i as i64),
                value,
            })
            .collect();
        let s = ReturnSeries::from_points("TEST", points).unwrap();
        let window = s.trailing_window(8, 8).unwrap();

        // Percent values 2,4,4,4,5,5,7,9: sample variance 32/7.
        let vol = RealizedVolatilityForecaster
            .forecast(&window, ModelOrder::default())
            .unwrap();
        assert!((vol - (32.0f64 / 7.0).sqrt()).abs() < 1e-9);
    }
}
