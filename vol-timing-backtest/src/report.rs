//! Report sink for completed runs.
//!
//! Writes two files into an output directory:
//! - `summary.json`: run parameters and performance metrics
//! - `balance_history.csv`: one row per simulated step

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::backtest::{SimulationConfig, SimulationResult};
use crate::metrics::{MetricsCalculator, PerformanceMetrics};

pub const SUMMARY_FILE: &str = "summary.json";
pub const HISTORY_FILE: &str = "balance_history.csv";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Contents of `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary<'a> {
    pub symbol: &'a str,
    pub forecaster: &'a str,
    pub config: &'a SimulationConfig,
    pub train_size: usize,
    pub test_start: Option<NaiveDate>,
    pub test_end: Option<NaiveDate>,
    pub metrics: &'a PerformanceMetrics,
}

/// Paths of the files written for one run.
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub summary: PathBuf,
    pub history: PathBuf,
}

/// Build the per-step frame: date, balance, drawdown, position, forecast,
/// realized return and fallback flag.
pub fn history_frame(result: &SimulationResult) -> Result<DataFrame, ReportError> {
    let points = &result.history.points;
    let drawdowns: Vec<f64> = MetricsCalculator::drawdown_series(&result.history)
        .into_iter()
        .map(|p| p.drawdown)
        .collect();

    let date: Vec<String> = points.iter().map(|p| p.date.to_string()).collect();
    let balance: Vec<f64> = points.iter().map(|p| p.balance_f64()).collect();
    let position: Vec<&str> = points.iter().map(|p| p.position.as_str()).collect();
    let forecast: Vec<Option<f64>> = points.iter().map(|p| p.forecast_volatility).collect();
    let realized: Vec<f64> = points.iter().map(|p| p.realized_return).collect();
    let fallback: Vec<bool> = points.iter().map(|p| p.fallback).collect();

    let df = DataFrame::new(vec![
        Series::new("date".into(), date).into(),
        Series::new("balance".into(), balance).into(),
        Series::new("drawdown".into(), drawdowns).into(),
        Series::new("position".into(), position).into(),
        Series::new("forecast_volatility".into(), forecast).into(),
        Series::new("realized_return".into(), realized).into(),
        Series::new("fallback".into(), fallback).into(),
    ])?;

    Ok(df)
}

/// Write `summary.json` and `balance_history.csv` under `output_dir`.
pub fn write_report(
    output_dir: impl AsRef<Path>,
    result: &SimulationResult,
    metrics: &PerformanceMetrics,
) -> Result<ReportPaths, ReportError> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;

    let summary = RunSummary {
        symbol: &result.symbol,
        forecaster: &result.forecaster,
        config: &result.config,
        train_size: result.train_size,
        test_start: result.test_start,
        test_end: result.test_end,
        metrics,
    };
    let summary_path = output_dir.join(SUMMARY_FILE);
    fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;

    let history_path = output_dir.join(HISTORY_FILE);
    let mut df = history_frame(result)?;
    let mut file = File::create(&history_path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;

    info!(
        "Wrote report for {} to {}",
        result.symbol,
        output_dir.display()
    );

    Ok(ReportPaths {
        summary: summary_path,
        history: history_path,
    })
}
