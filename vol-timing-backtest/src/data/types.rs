//! Core data types for the walk-forward backtester.
//!
//! Prices come in as a dated close series; everything downstream works on
//! log returns. The return series is immutable once built and hands out
//! borrowed trailing windows to the volatility forecasters.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Returns are handed to forecasters in percent units.
pub const RETURN_SCALE: f64 = 100.0;

/// Minimum number of returns a usable series must contain.
pub const MIN_RETURNS: usize = 2;

/// Structural problems with an input series. Always fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("timestamps out of order at index {index}: {current} follows {previous}")]
    NonMonotonic {
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("duplicate timestamp {date} at index {index}")]
    DuplicateTimestamp { index: usize, date: NaiveDate },

    #[error("non-positive price {price} on {date}")]
    NonPositivePrice { date: NaiveDate, price: f64 },

    #[error("gap of {days} days between {from} and {to}")]
    Gap {
        from: NaiveDate,
        to: NaiveDate,
        days: i64,
    },

    #[error("insufficient data: need at least {required} observations, got {available}")]
    InsufficientData { required: usize, available: usize },
}

/// A single closing price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Raw price series as delivered by a price source.
///
/// No ordering guarantees are made here; the integrity validator and
/// [`ReturnSeries::from_prices`] enforce them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Self {
        Self {
            symbol: symbol.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

/// A single log-return observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Ordered, gap-checked log-return series.
///
/// Invariants: strictly increasing dates, every value finite, at least
/// [`MIN_RETURNS`] observations.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnSeries {
    symbol: String,
    points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    /// Build log returns `ln(p_t / p_{t-1})` from a price series.
    ///
    /// The first price has no return and is dropped. Missing (NaN) prices
    /// produce non-finite returns, which are excluded with a warning.
    pub fn from_prices(prices: &PriceSeries) -> Result<Self, DataError> {
        check_order(prices.points.iter().map(|p| p.date))?;

        if let Some(bad) = prices
            .points
            .iter()
            .find(|p| !p.close.is_nan() && p.close <= 0.0)
        {
            return Err(DataError::NonPositivePrice {
                date: bad.date,
                price: bad.close,
            });
        }

        let mut dropped = 0usize;
        let points: Vec<ReturnPoint> = prices
            .points
            .windows(2)
            .filter_map(|w| {
                let value = (w[1].close / w[0].close).ln();
                if value.is_finite() {
                    Some(ReturnPoint {
                        date: w[1].date,
                        value,
                    })
                } else {
                    dropped += 1;
                    None
                }
            })
            .collect();

        if dropped > 0 {
            warn!(
                symbol = %prices.symbol,
                dropped,
                "excluded non-finite returns before simulation"
            );
        }

        Self::from_points(prices.symbol.clone(), points)
    }

    /// Wrap already-computed returns, enforcing the series invariants.
    pub fn from_points(
        symbol: impl Into<String>,
        points: Vec<ReturnPoint>,
    ) -> Result<Self, DataError> {
        check_order(points.iter().map(|p| p.date))?;

        let points: Vec<_> = points.into_iter().filter(|p| p.value.is_finite()).collect();
        if points.len() < MIN_RETURNS {
            return Err(DataError::InsufficientData {
                required: MIN_RETURNS,
                available: points.len(),
            });
        }

        Ok(Self {
            symbol: symbol.into(),
            points,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&ReturnPoint> {
        self.points.get(index)
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn abs_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value.abs()).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// The `size` observations immediately preceding `target`.
    ///
    /// Returns `None` when the target is out of range or there is not
    /// enough history before it.
    pub fn trailing_window(&self, target: usize, size: usize) -> Option<TrailingWindow<'_>> {
        if size == 0 || target >= self.points.len() || size > target {
            return None;
        }
        Some(TrailingWindow {
            observations: &self.points[target - size..target],
            target_index: target,
            target_date: self.points[target].date,
        })
    }
}

fn check_order(dates: impl Iterator<Item = NaiveDate>) -> Result<(), DataError> {
    let mut previous: Option<NaiveDate> = None;
    for (index, current) in dates.enumerate() {
        if let Some(prev) = previous {
            if current == prev {
                return Err(DataError::DuplicateTimestamp {
                    index,
                    date: current,
                });
            }
            if current < prev {
                return Err(DataError::NonMonotonic {
                    index,
                    previous: prev,
                    current,
                });
            }
        }
        previous = Some(current);
    }
    Ok(())
}

/// Fixed-length slice of history ending strictly before the decision date.
#[derive(Debug, Clone, Copy)]
pub struct TrailingWindow<'a> {
    observations: &'a [ReturnPoint],
    target_index: usize,
    target_date: NaiveDate,
}

impl<'a> TrailingWindow<'a> {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &'a [ReturnPoint] {
        self.observations
    }

    /// Index of the return being forecast (not part of the window).
    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn target_date(&self) -> NaiveDate {
        self.target_date
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|p| p.date)
    }

    /// Returns in percent units, the scale forecasters estimate on.
    pub fn scaled_returns(&self) -> Vec<f64> {
        self.observations
            .iter()
            .map(|p| p.value * RETURN_SCALE)
            .collect()
    }
}
