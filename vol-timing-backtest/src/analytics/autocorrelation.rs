//! Autocorrelation analysis for return series.
//!
//! Volatility clustering shows up as significant autocorrelation in
//! absolute returns while raw returns stay close to white noise.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use super::statistics::{mean, variance};

/// Sample autocorrelation for lags `0..=max_lag`.
///
/// Uses the biased estimator (divides by `n`), so values are bounded by 1.
/// `max_lag` is capped at `n - 1`. A constant series yields an empty vector.
pub fn acf(data: &[f64], max_lag: usize) -> Vec<f64> {
    let n = data.len();
    if n < 2 {
        return Vec::new();
    }

    let max_lag = max_lag.min(n - 1);
    let m = mean(data);
    let var = variance(data, 0);
    if !(var > 0.0) {
        return Vec::new();
    }

    (0..=max_lag)
        .map(|lag| {
            if lag == 0 {
                return 1.0;
            }
            let sum: f64 = data[lag..]
                .iter()
                .zip(&data[..n - lag])
                .map(|(a, b)| (a - m) * (b - m))
                .sum();
            sum / (n as f64 * var)
        })
        .collect()
}

/// Half-width of the white-noise confidence band, `z / sqrt(n)`.
pub fn confidence_bound(n: usize, confidence: f64) -> f64 {
    let z = match confidence {
        c if c >= 0.99 => 2.576,
        c if c >= 0.95 => 1.96,
        c if c >= 0.90 => 1.645,
        _ => 1.96,
    };
    z / (n as f64).sqrt()
}

/// Ljung–Box portmanteau test result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LjungBoxResult {
    pub statistic: f64,
    pub p_value: f64,
    pub lags: usize,
    /// Rejects "no autocorrelation" at the 5% level.
    pub is_significant: bool,
}

/// `Q = n(n+2) * sum_k rho_k^2 / (n-k)` against a chi-squared with `lags`
/// degrees of freedom.
pub fn ljung_box(data: &[f64], lags: usize) -> LjungBoxResult {
    let n = data.len();
    let rho = acf(data, lags);

    if rho.len() < 2 {
        return LjungBoxResult {
            statistic: f64::NAN,
            p_value: 1.0,
            lags,
            is_significant: false,
        };
    }

    let lags = rho.len() - 1;
    let q = rho[1..]
        .iter()
        .enumerate()
        .map(|(k, r)| r * r / (n - (k + 1)) as f64)
        .sum::<f64>()
        * n as f64
        * (n + 2) as f64;

    let p_value = ChiSquared::new(lags as f64)
        .map(|chi2| 1.0 - chi2.cdf(q))
        .unwrap_or(1.0);

    LjungBoxResult {
        statistic: q,
        p_value,
        lags,
        is_significant: p_value < 0.05,
    }
}

/// Text bar chart of an ACF with the confidence band marked.
pub fn render_acf(values: &[f64], title: &str, bound: f64, width: usize) -> String {
    let mut out = format!("\n{} (lags={}, band=±{:.3}):\n", title, values.len().saturating_sub(1), bound);
    out.push_str(&"-".repeat(width + 18));
    out.push('\n');

    for (lag, &value) in values.iter().enumerate().skip(1) {
        let bar = ((value.abs().min(1.0)) * width as f64).round() as usize;
        let marker = if value.abs() > bound { '*' } else { ' ' };
        let sign = if value >= 0.0 { '+' } else { '-' };
        out.push_str(&format!(
            "{:>4} {} {:>7.3} |{}\n",
            lag,
            marker,
            value,
            sign.to_string().repeat(bar)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acf_lag_zero_is_one() {
        let data = [1.0, 3.0, 2.0, 5.0, 4.0];
        let values = acf(&data, 3);
        assert_eq!(values.len(), 4);
        assert_eq!(values[0], 1.0);
        assert!(values.iter().all(|v| v.abs() <= 1.0 + 1e-12));
    }

    #[test]
    fn test_acf_alternating_series() {
        let data: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let values = acf(&data, 2);
        assert!((values[1] + 0.99).abs() < 1e-12);
        assert!((values[2] - 0.98).abs() < 1e-12);
    }

    #[test]
    fn test_acf_caps_lags_and_handles_constant() {
        assert_eq!(acf(&[1.0, 2.0, 3.0], 30).len(), 3);
        assert!(acf(&[2.0, 2.0, 2.0], 5).is_empty());
        assert!(acf(&[1.0], 5).is_empty());
    }

    #[test]
    fn test_confidence_bound() {
        assert!((confidence_bound(100, 0.95) - 0.196).abs() < 1e-12);
    }

    #[test]
    fn test_ljung_box_detects_persistence() {
        let data: Vec<f64> = (0..200).map(|i| if (i / 10) % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let result = ljung_box(&data, 10);
        assert!(result.is_significant);
        assert!(result.p_value < 0.01);
        assert_eq!(result.lags, 10);
    }

    #[test]
    fn test_ljung_box_degenerate() {
        let result = ljung_box(&[1.0, 1.0, 1.0], 5);
        assert!(result.statistic.is_nan());
        assert!(!result.is_significant);
    }

    #[test]
    fn test_render_acf_marks_significant_lags() {
        let text = render_acf(&[1.0, 0.5, 0.01], "returns", 0.1, 20);
        assert!(text.contains("returns"));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.iter().any(|l| l.trim_start().starts_with("1 *")));
        assert!(lines.iter().any(|l| l.trim_start().starts_with("2  ")));
    }
}
