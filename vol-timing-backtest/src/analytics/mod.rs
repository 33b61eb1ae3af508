//! Return analytics module.
//!
//! Provides:
//! - Descriptive statistics (mean, variance, skewness, kurtosis)
//! - Autocorrelation and Ljung–Box tests for volatility clustering
//! - Per-series diagnostics report

pub mod autocorrelation;
pub mod diagnostics;
pub mod statistics;

pub use autocorrelation::{acf, confidence_bound, ljung_box, LjungBoxResult};
pub use diagnostics::{AnalyticsConfig, ReturnDiagnostics};
pub use statistics::DescriptiveStats;
