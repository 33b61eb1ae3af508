//! Price loader for CSV and Parquet files.
//!
//! Reads a dated close-price column into a [`PriceSeries`]. The file is
//! expected to hold one row per trading day with at least:
//! - a date column (`YYYY-MM-DD` strings or a native date type)
//! - a numeric price column (adjusted close by default)
//!
//! Rows keep file order. Out-of-order and duplicate dates are left in place
//! for the integrity validator to report.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::{PricePoint, PriceSeries};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can hand the backtester a price series.
pub trait PriceSource {
    fn load_prices(&self) -> Result<PriceSeries, LoaderError>;
}

/// Column names to read from the price file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(default = "default_date_column")]
    pub date: String,
    #[serde(default = "default_price_column")]
    pub price: String,
}

fn default_date_column() -> String {
    "date".to_string()
}

fn default_price_column() -> String {
    "adj_close".to_string()
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date: default_date_column(),
            price: default_price_column(),
        }
    }
}

/// File-backed price source.
pub struct PriceLoader {
    path: PathBuf,
    symbol: String,
    columns: ColumnMapping,
}

impl PriceLoader {
    /// Create a loader for a CSV or Parquet file. The symbol defaults to
    /// the file stem.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let symbol = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            path,
            symbol,
            columns: ColumnMapping::default(),
        }
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = symbol.to_string();
        self
    }

    pub fn with_columns(mut self, columns: ColumnMapping) -> Self {
        self.columns = columns;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Scan the file lazily, projecting the date and price columns.
    pub fn load_lazy(&self) -> Result<LazyFrame, LoaderError> {
        if !self.path.exists() {
            return Err(LoaderError::FileNotFound(self.path.display().to_string()));
        }

        let extension = self
            .path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let lf = match extension.as_str() {
            "csv" => LazyCsvReader::new(&self.path).with_has_header(true).finish()?,
            "parquet" => LazyFrame::scan_parquet(&self.path, ScanArgsParquet::default())?,
            other => return Err(LoaderError::UnsupportedFormat(other.to_string())),
        };

        Ok(lf.select([
            col(self.columns.date.as_str()),
            col(self.columns.price.as_str()).cast(DataType::Float64),
        ]))
    }

    /// Load the projected columns into a DataFrame.
    pub fn load_dataframe(&self) -> Result<DataFrame, LoaderError> {
        Ok(self.load_lazy()?.collect()?)
    }
}

impl PriceSource for PriceLoader {
    fn load_prices(&self) -> Result<PriceSeries, LoaderError> {
        let df = self.load_dataframe()?;
        debug!(rows = df.height(), path = %self.path.display(), "read price frame");

        let points = dataframe_to_prices(&df, &self.columns)?;
        if points.windows(2).any(|w| w[1].date < w[0].date) {
            warn!(path = %self.path.display(), "price rows are not in date order");
        }

        info!(
            "Loaded {} prices for {} from {}",
            points.len(),
            self.symbol,
            self.path.display()
        );
        Ok(PriceSeries::new(self.symbol.clone(), points))
    }
}

/// Convert days since Unix epoch to NaiveDate.
fn date_from_days(days: i32) -> NaiveDate {
    NaiveDate::from_num_days_from_ce_opt(days + 719163).unwrap_or_default()
}

/// Extract `(date, close)` pairs. Null prices become NaN so the return
/// builder can drop them; unparseable dates are an error.
fn dataframe_to_prices(
    df: &DataFrame,
    columns: &ColumnMapping,
) -> Result<Vec<PricePoint>, LoaderError> {
    let date_col = df.column(columns.date.as_str())?;
    let price_col = df.column(columns.price.as_str())?.f64()?;

    let dates: Vec<NaiveDate> = if let Ok(str_col) = date_col.str() {
        str_col
            .into_iter()
            .enumerate()
            .map(|(row, s)| {
                s.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
                    .ok_or_else(|| {
                        LoaderError::InvalidData(format!("unparseable date in row {}", row))
                    })
            })
            .collect::<Result<_, _>>()?
    } else if let Ok(date_col) = date_col.date() {
        date_col
            .into_iter()
            .enumerate()
            .map(|(row, d)| {
                d.map(date_from_days).ok_or_else(|| {
                    LoaderError::InvalidData(format!("missing date in row {}", row))
                })
            })
            .collect::<Result<_, _>>()?
    } else {
        return Err(LoaderError::InvalidData(format!(
            "{} column has unexpected type",
            columns.date
        )));
    };

    Ok(dates
        .into_iter()
        .zip(price_col.into_iter())
        .map(|(date, close)| PricePoint::new(date, close.unwrap_or(f64::NAN)))
        .collect())
}
