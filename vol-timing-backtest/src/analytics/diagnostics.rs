//! Return-series diagnostics: descriptive stats plus ACF and Ljung–Box for
//! raw and absolute returns.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::ReturnSeries;

use super::autocorrelation::{acf, confidence_bound, ljung_box, render_acf, LjungBoxResult};
use super::statistics::DescriptiveStats;

/// Settings for the diagnostics pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_acf_lags")]
    pub acf_lags: usize,
}

fn default_acf_lags() -> usize {
    30
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            acf_lags: default_acf_lags(),
        }
    }
}

/// Diagnostics for a single return series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnDiagnostics {
    pub symbol: String,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub stats: DescriptiveStats,
    pub acf_returns: Vec<f64>,
    pub acf_abs_returns: Vec<f64>,
    /// 95% white-noise band for the ACF values.
    pub confidence_bound: f64,
    pub ljung_box_returns: LjungBoxResult,
    pub ljung_box_abs_returns: LjungBoxResult,
}

impl ReturnDiagnostics {
    pub fn analyze(series: &ReturnSeries, config: &AnalyticsConfig) -> Self {
        let values = series.values();
        let abs_values = series.abs_values();

        let diagnostics = Self {
            symbol: series.symbol().to_string(),
            first_date: series.first_date(),
            last_date: series.last_date(),
            stats: DescriptiveStats::from_slice(&values),
            acf_returns: acf(&values, config.acf_lags),
            acf_abs_returns: acf(&abs_values, config.acf_lags),
            confidence_bound: confidence_bound(values.len(), 0.95),
            ljung_box_returns: ljung_box(&values, config.acf_lags),
            ljung_box_abs_returns: ljung_box(&abs_values, config.acf_lags),
        };

        info!(
            "Diagnostics for {}: {} returns, Ljung-Box p={:.4} (returns), p={:.4} (|returns|)",
            diagnostics.symbol,
            diagnostics.stats.count,
            diagnostics.ljung_box_returns.p_value,
            diagnostics.ljung_box_abs_returns.p_value
        );

        diagnostics
    }

    /// Absolute returns are autocorrelated while raw returns are not.
    pub fn shows_volatility_clustering(&self) -> bool {
        self.ljung_box_abs_returns.is_significant && !self.ljung_box_returns.is_significant
    }

    pub fn summary(&self) -> String {
        let period = match (self.first_date, self.last_date) {
            (Some(a), Some(b)) => format!("{} to {}", a, b),
            _ => "n/a".to_string(),
        };
        let mut out = format!(
            "Return Diagnostics: {} ({})\n\
             ========================================\n\
             Observations: {}\n\
             Mean: {:.6}\n\
             Std Dev: {:.6}\n\
             Min / Max: {:.6} / {:.6}\n\
             Skewness: {:.3}\n\
             Excess Kurtosis: {:.3}\n\
             \n\
             Ljung-Box returns:   Q={:.2}, p={:.4}\n\
             Ljung-Box |returns|: Q={:.2}, p={:.4}\n\
             Volatility clustering: {}\n",
            self.symbol,
            period,
            self.stats.count,
            self.stats.mean,
            self.stats.std_dev,
            self.stats.min,
            self.stats.max,
            self.stats.skewness,
            self.stats.kurtosis,
            self.ljung_box_returns.statistic,
            self.ljung_box_returns.p_value,
            self.ljung_box_abs_returns.statistic,
            self.ljung_box_abs_returns.p_value,
            if self.shows_volatility_clustering() { "yes" } else { "no" },
        );
        out.push_str(&render_acf(&self.acf_returns, "ACF returns", self.confidence_bound, 40));
        out.push_str(&render_acf(
            &self.acf_abs_returns,
            "ACF |returns|",
            self.confidence_bound,
            40,
        ));
        out
    }
}
