//! Performance metrics module.
//!
//! Provides performance calculations over a balance history:
//! - Sharpe ratio, Sortino ratio
//! - Drawdown series and maximum drawdown
//! - CAGR, annualized volatility, Calmar ratio

pub mod calculator;

pub use calculator::{
    DrawdownAnalysis, DrawdownPoint, MetricError, MetricsCalculator, MetricsConfig,
    PerformanceMetrics,
};
