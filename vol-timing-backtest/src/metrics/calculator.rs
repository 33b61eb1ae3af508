//! Performance metrics calculator.
//!
//! Pure functions over a balance history:
//! - Sharpe and Sortino ratios from per-step percentage changes
//! - Drawdown series, maximum drawdown and drawdown episodes
//! - Total return, CAGR, annualized volatility, Calmar ratio

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::analytics::statistics::{mean, std_dev};
use crate::backtest::{BalanceHistory, SimulationResult};

/// Standard deviations below this are treated as zero.
const ZERO_VARIANCE_TOLERANCE: f64 = 1e-12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("insufficient data: need at least {required} balance entries, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("returns have zero variance")]
    ZeroVariance,
}

/// Annualization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate_annual: f64,
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: u32,
}

fn default_risk_free_rate() -> f64 {
    0.01
}

fn default_periods_per_year() -> u32 {
    252
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate_annual: default_risk_free_rate(),
            periods_per_year: default_periods_per_year(),
        }
    }
}

/// Drawdown on one date, as a fraction of the running peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawdownPoint {
    pub date: NaiveDate,
    pub drawdown: f64,
}

/// Drawdown analysis details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownAnalysis {
    /// Largest drawdown as a fraction of the peak.
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub peak_date: Option<NaiveDate>,
    pub trough_date: Option<NaiveDate>,
    /// First date the balance regained the peak, if it did.
    pub recovery_date: Option<NaiveDate>,
    /// Peak to recovery, or peak to the last date if not recovered.
    pub duration_days: i64,
    pub avg_drawdown_pct: f64,
    pub drawdown_periods: usize,
}

impl Default for DrawdownAnalysis {
    fn default() -> Self {
        Self {
            max_drawdown: 0.0,
            max_drawdown_pct: 0.0,
            peak_date: None,
            trough_date: None,
            recovery_date: None,
            duration_days: 0,
            avg_drawdown_pct: 0.0,
            drawdown_periods: 0,
        }
    }
}

/// Performance metrics for one run. Undefined ratios are NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub steps: usize,
    pub initial_balance: Decimal,
    pub final_balance: Decimal,

    // Return metrics
    pub total_return_pct: f64,
    pub cagr: f64,
    pub annualized_volatility_pct: f64,

    // Risk metrics
    pub max_drawdown: f64,
    pub drawdown: DrawdownAnalysis,

    // Risk-adjusted returns
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,

    // Positioning
    pub long_steps: usize,
    pub short_steps: usize,
    pub fallback_steps: usize,
}

impl PerformanceMetrics {
    /// Generate a summary report.
    pub fn summary(&self) -> String {
        format!(
            "Performance Summary\n\
             ====================\n\
             \n\
             Steps: {} (Long: {}, Short: {}, Fallback: {})\n\
             Initial Balance: {:.2}\n\
             Final Balance: {:.2}\n\
             \n\
             Total Return: {:.2}%\n\
             CAGR: {:.2}%\n\
             Annualized Volatility: {:.2}%\n\
             \n\
             Max Drawdown: {:.2}%\n\
             Drawdown Periods: {}\n\
             Longest Drawdown: {} days\n\
             Sharpe Ratio: {:.4}\n\
             Sortino Ratio: {:.4}\n\
             Calmar Ratio: {:.2}",
            self.steps,
            self.long_steps,
            self.short_steps,
            self.fallback_steps,
            self.initial_balance,
            self.final_balance,
            self.total_return_pct,
            self.cagr,
            self.annualized_volatility_pct,
            self.drawdown.max_drawdown_pct,
            self.drawdown.drawdown_periods,
            self.drawdown.duration_days,
            self.sharpe_ratio,
            self.sortino_ratio,
            self.calmar_ratio,
        )
    }
}

/// Metrics calculator.
#[derive(Debug, Clone, Default)]
pub struct MetricsCalculator {
    config: MetricsConfig,
}

impl MetricsCalculator {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Calculate all metrics from a simulation result.
    pub fn calculate(&self, result: &SimulationResult) -> PerformanceMetrics {
        let history = &result.history;
        let balances = history.balances_f64();

        let initial: f64 = history.initial_balance.try_into().unwrap_or(0.0);
        let last: f64 = history.final_balance().try_into().unwrap_or(0.0);
        let total_return_pct = if initial > 0.0 {
            (last / initial - 1.0) * 100.0
        } else {
            0.0
        };
        let cagr = self.cagr(initial, last, history.len());

        let returns = Self::step_returns(&balances);
        let annualized_volatility_pct = if returns.is_empty() {
            0.0
        } else {
            std_dev(&returns, 0) * self.annualization() * 100.0
        };

        let drawdown = Self::analyze_drawdown(history);

        let sharpe_ratio = self.sharpe_ratio(&balances).unwrap_or_else(|e| {
            warn!("Sharpe ratio undefined for {}: {}", result.symbol, e);
            f64::NAN
        });
        let sortino_ratio = self.sortino_ratio(&balances).unwrap_or_else(|e| {
            warn!("Sortino ratio undefined for {}: {}", result.symbol, e);
            f64::NAN
        });
        let calmar_ratio = if drawdown.max_drawdown_pct > 0.0 {
            cagr / drawdown.max_drawdown_pct
        } else {
            0.0
        };

        PerformanceMetrics {
            steps: history.len(),
            initial_balance: history.initial_balance,
            final_balance: history.final_balance(),
            total_return_pct,
            cagr,
            annualized_volatility_pct,
            max_drawdown: drawdown.max_drawdown,
            drawdown,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            long_steps: result.long_steps,
            short_steps: result.short_steps,
            fallback_steps: result.fallback_steps,
        }
    }

    /// Percentage change between consecutive balances.
    pub fn step_returns(balances: &[f64]) -> Vec<f64> {
        balances.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
    }

    /// Annualized Sharpe ratio with population standard deviation.
    pub fn sharpe_ratio(&self, balances: &[f64]) -> Result<f64, MetricError> {
        let excess = self.excess_returns(balances)?;
        let sd = std_dev(&excess, 0);
        if !(sd > ZERO_VARIANCE_TOLERANCE) {
            return Err(MetricError::ZeroVariance);
        }
        Ok(mean(&excess) / sd * self.annualization())
    }

    /// Annualized Sortino ratio. Downside deviation is taken over all
    /// steps with positive excess returns counted as zero.
    pub fn sortino_ratio(&self, balances: &[f64]) -> Result<f64, MetricError> {
        let excess = self.excess_returns(balances)?;
        let downside = (excess.iter().map(|r| r.min(0.0).powi(2)).sum::<f64>()
            / excess.len() as f64)
            .sqrt();
        if !(downside > ZERO_VARIANCE_TOLERANCE) {
            return Err(MetricError::ZeroVariance);
        }
        Ok(mean(&excess) / downside * self.annualization())
    }

    /// Calculate CAGR (Compound Annual Growth Rate) in percent.
    pub fn cagr(&self, initial: f64, final_val: f64, periods: usize) -> f64 {
        if initial <= 0.0 || final_val <= 0.0 || periods == 0 {
            return 0.0;
        }
        let years = periods as f64 / f64::from(self.config.periods_per_year);
        ((final_val / initial).powf(1.0 / years) - 1.0) * 100.0
    }

    /// `(running_max - balance) / running_max` for each balance.
    pub fn drawdowns(balances: &[f64]) -> Vec<f64> {
        let mut peak = f64::NEG_INFINITY;
        balances
            .iter()
            .map(|&b| {
                peak = peak.max(b);
                if peak > 0.0 {
                    (peak - b) / peak
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Drawdown series indexed like the balance history.
    pub fn drawdown_series(history: &BalanceHistory) -> Vec<DrawdownPoint> {
        Self::drawdowns(&history.balances_f64())
            .into_iter()
            .zip(&history.points)
            .map(|(drawdown, p)| DrawdownPoint {
                date: p.date,
                drawdown,
            })
            .collect()
    }

    /// Largest drawdown, 0.0 for empty or non-decreasing balances.
    pub fn max_drawdown(balances: &[f64]) -> f64 {
        Self::drawdowns(balances).into_iter().fold(0.0, f64::max)
    }

    /// Analyze drawdown episodes in the balance history.
    pub fn analyze_drawdown(history: &BalanceHistory) -> DrawdownAnalysis {
        let points = &history.points;
        if points.is_empty() {
            return DrawdownAnalysis::default();
        }

        let balances = history.balances_f64();
        let drawdowns = Self::drawdowns(&balances);

        let mut peak_idx = 0;
        let mut worst: Option<(usize, usize)> = None; // (peak, trough)
        let mut periods = 0;
        let mut in_drawdown = false;

        for (i, &dd) in drawdowns.iter().enumerate() {
            if dd > 0.0 {
                if !in_drawdown {
                    periods += 1;
                    in_drawdown = true;
                }
                if worst.map_or(true, |(_, t)| dd > drawdowns[t]) {
                    worst = Some((peak_idx, i));
                }
            } else {
                in_drawdown = false;
                peak_idx = i;
            }
        }

        let in_dd: Vec<f64> = drawdowns.iter().copied().filter(|d| *d > 0.0).collect();
        let avg_drawdown_pct = if in_dd.is_empty() {
            0.0
        } else {
            mean(&in_dd) * 100.0
        };

        let Some((peak, trough)) = worst else {
            return DrawdownAnalysis {
                peak_date: Some(points[peak_idx].date),
                ..Default::default()
            };
        };

        let recovery = (trough + 1..points.len()).find(|&i| balances[i] >= balances[peak]);
        let end_date = recovery
            .map(|i| points[i].date)
            .unwrap_or(points[points.len() - 1].date);

        DrawdownAnalysis {
            max_drawdown: drawdowns[trough],
            max_drawdown_pct: drawdowns[trough] * 100.0,
            peak_date: Some(points[peak].date),
            trough_date: Some(points[trough].date),
            recovery_date: recovery.map(|i| points[i].date),
            duration_days: (end_date - points[peak].date).num_days(),
            avg_drawdown_pct,
            drawdown_periods: periods,
        }
    }

    fn excess_returns(&self, balances: &[f64]) -> Result<Vec<f64>, MetricError> {
        if balances.len() < 2 {
            return Err(MetricError::InsufficientData {
                required: 2,
                available: balances.len(),
            });
        }
        let per_period = self.config.risk_free_rate_annual / f64::from(self.config.periods_per_year);
        Ok(Self::step_returns(balances)
            .into_iter()
            .map(|r| r - per_period)
            .collect())
    }

    fn annualization(&self) -> f64 {
        f64::from(self.config.periods_per_year).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{BalancePoint, Position, SimulationConfig};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn history(balances: &[Decimal]) -> BalanceHistory {
        BalanceHistory {
            initial_balance: balances[0],
            points: balances
                .iter()
                .enumerate()
                .map(|(i, &balance)| BalancePoint {
                    date: day(i as u32 + 1),
                    balance,
                    position: Position::Long,
                    forecast_volatility: Some(1.0),
                    realized_return: 0.0,
                    fallback: false,
                })
                .collect(),
        }
    }

    fn no_risk_free() -> MetricsCalculator {
        MetricsCalculator::new(MetricsConfig {
            risk_free_rate_annual: 0.0,
            periods_per_year: 252,
        })
    }

    #[test]
    fn test_drawdown_series_known_values() {
        let dd = MetricsCalculator::drawdowns(&[100.0, 90.0, 120.0, 80.0]);
        assert_eq!(dd[0], 0.0);
        assert!((dd[1] - 0.1).abs() < 1e-12);
        assert_eq!(dd[2], 0.0);
        assert!((dd[3] - 1.0 / 3.0).abs() < 1e-12);
        assert!(
            (MetricsCalculator::max_drawdown(&[100.0, 90.0, 120.0, 80.0]) - 1.0 / 3.0).abs()
                < 1e-12
        );
    }

    #[test]
    fn test_max_drawdown_non_decreasing() {
        assert_eq!(MetricsCalculator::max_drawdown(&[100.0, 100.0, 101.0, 150.0]), 0.0);
        assert_eq!(MetricsCalculator::max_drawdown(&[]), 0.0);
    }

    #[test]
    fn test_single_excursion() {
        let dd = MetricsCalculator::max_drawdown(&[100.0, 150.0, 120.0]);
        assert!((dd - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_sharpe_hand_computed() {
        let sharpe = no_risk_free()
            .sharpe_ratio(&[100.0, 110.0, 99.0, 108.9])
            .unwrap();
        let expected = (1.0 / 30.0) / (0.08f64 / 9.0).sqrt() * 252f64.sqrt();
        assert!((sharpe - expected).abs() < 1e-9);
    }

    #[test]
    fn test_risk_free_rate_lowers_sharpe() {
        let balances = [100.0, 110.0, 99.0, 108.9];
        let without = no_risk_free().sharpe_ratio(&balances).unwrap();
        let with = MetricsCalculator::default().sharpe_ratio(&balances).unwrap();
        assert!(with < without);
    }

    #[test]
    fn test_sharpe_invariant_to_scale() {
        let calc = MetricsCalculator::default();
        let base = [100.0, 103.0, 101.5, 104.0, 102.0];
        let scaled: Vec<f64> = base.iter().map(|b| b * 1_000.0).collect();
        let a = calc.sharpe_ratio(&base).unwrap();
        let b = calc.sharpe_ratio(&scaled).unwrap();
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_sharpe_undefined_cases() {
        let calc = MetricsCalculator::default();
        assert_eq!(
            calc.sharpe_ratio(&[100.0]),
            Err(MetricError::InsufficientData {
                required: 2,
                available: 1
            })
        );
        assert_eq!(
            calc.sharpe_ratio(&[100.0, 100.0, 100.0]),
            Err(MetricError::ZeroVariance)
        );
    }

    #[test]
    fn test_sortino_needs_downside() {
        let calc = no_risk_free();
        assert_eq!(
            calc.sortino_ratio(&[100.0, 110.0, 121.0]),
            Err(MetricError::ZeroVariance)
        );
        assert!(calc.sortino_ratio(&[100.0, 110.0, 99.0, 108.9]).unwrap() > 0.0);
    }

    #[test]
    fn test_cagr() {
        // Doubling over 504 periods at 252/year is ~41.4% a year.
        let cagr = MetricsCalculator::default().cagr(100.0, 200.0, 504);
        assert!((cagr - (2f64.sqrt() - 1.0) * 100.0).abs() < 1e-9);
        assert_eq!(MetricsCalculator::default().cagr(100.0, 200.0, 0), 0.0);
    }

    #[test]
    fn test_drawdown_analysis() {
        let h = history(&[
            dec!(100),
            dec!(120),
            dec!(90),
            dec!(100),
            dec!(130),
            dec!(117),
        ]);
        let analysis = MetricsCalculator::analyze_drawdown(&h);
        assert!((analysis.max_drawdown - 0.25).abs() < 1e-12);
        assert_eq!(analysis.peak_date, Some(day(2)));
        assert_eq!(analysis.trough_date, Some(day(3)));
        assert_eq!(analysis.recovery_date, Some(day(5)));
        assert_eq!(analysis.duration_days, 3);
        assert_eq!(analysis.drawdown_periods, 2);
    }

    #[test]
    fn test_drawdown_analysis_empty() {
        let analysis = MetricsCalculator::analyze_drawdown(&BalanceHistory::new(dec!(100)));
        assert_eq!(analysis.max_drawdown_pct, 0.0);
        assert_eq!(analysis.drawdown_periods, 0);
    }

    #[test]
    fn test_drawdown_series_dates() {
        let h = history(&[dec!(100), dec!(90), dec!(120), dec!(80)]);
        let series = MetricsCalculator::drawdown_series(&h);
        assert_eq!(series.len(), 4);
        assert_eq!(series[3].date, day(4));
        assert!((series[3].drawdown - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_calculate_records_nan_sharpe() {
        let result = SimulationResult {
            symbol: "TEST".to_string(),
            forecaster: "constant".to_string(),
            config: SimulationConfig::default(),
            train_size: 8,
            test_start: Some(day(1)),
            test_end: Some(day(1)),
            history: history(&[dec!(100)]),
            long_steps: 1,
            short_steps: 0,
            fallback_steps: 0,
        };
        let metrics = MetricsCalculator::default().calculate(&result);
        assert!(metrics.sharpe_ratio.is_nan());
        assert_eq!(metrics.steps, 1);
        assert_eq!(metrics.max_drawdown, 0.0);
        assert!(metrics.summary().contains("Steps: 1"));
    }
}
