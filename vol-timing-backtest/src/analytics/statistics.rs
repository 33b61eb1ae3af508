//! Descriptive statistics shared by the forecasters, metrics and diagnostics.

use serde::{Deserialize, Serialize};

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Variance with `ddof` delta degrees of freedom (0 = population, 1 = sample).
/// NaN when `data.len() <= ddof`.
pub fn variance(data: &[f64], ddof: usize) -> f64 {
    if data.len() <= ddof {
        return f64::NAN;
    }
    let m = mean(data);
    data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - ddof) as f64
}

pub fn std_dev(data: &[f64], ddof: usize) -> f64 {
    variance(data, ddof).sqrt()
}

/// Summary statistics for a return series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub skewness: f64,
    /// Excess kurtosis (0 for a normal distribution).
    pub kurtosis: f64,
}

impl DescriptiveStats {
    pub fn from_slice(data: &[f64]) -> Self {
        let count = data.len();
        let m = mean(data);
        let sd = std_dev(data, 0);

        let (skewness, kurtosis) = if count > 0 && sd > 0.0 {
            let n = count as f64;
            let m3 = data.iter().map(|x| ((x - m) / sd).powi(3)).sum::<f64>() / n;
            let m4 = data.iter().map(|x| ((x - m) / sd).powi(4)).sum::<f64>() / n;
            (m3, m4 - 3.0)
        } else {
            (f64::NAN, f64::NAN)
        };

        Self {
            count,
            mean: m,
            std_dev: std_dev(data, 1),
            min: data.iter().copied().fold(f64::INFINITY, f64::min),
            max: data.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            skewness,
            kurtosis,
        }
    }
}
