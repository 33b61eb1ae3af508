//! Data integrity validation for price series.
//!
//! Validates:
//! - Chronological order (strictly increasing dates)
//! - Duplicate dates
//! - Price validity (positive, finite)
//! - Date continuity (no calendar gaps beyond a tolerance)
//! - Minimum length
//!
//! Every check is reported; the blocking ones also produce a [`DataError`]
//! so callers can abort before simulation starts.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::{DataError, PriceSeries};

/// Thresholds for the integrity checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityConfig {
    /// Largest calendar-day distance between consecutive prices before it
    /// counts as a gap. Seven days tolerates weekends plus holidays.
    #[serde(default = "default_max_gap_days")]
    pub max_gap_days: i64,
    /// Minimum number of prices.
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,
}

fn default_max_gap_days() -> i64 {
    7
}

fn default_min_observations() -> usize {
    3
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            max_gap_days: default_max_gap_days(),
            min_observations: default_min_observations(),
        }
    }
}

/// Result of a single validation check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Complete integrity report for one price series.
#[derive(Debug, Clone)]
pub struct DataIntegrityReport {
    pub symbol: String,
    pub observations: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub checks: Vec<CheckResult>,
    /// Blocking problems, in check order.
    pub errors: Vec<DataError>,
}

impl DataIntegrityReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        let total = self.checks.len();
        let range = match (self.first_date, self.last_date) {
            (Some(first), Some(last)) => format!("{} to {}", first, last),
            _ => "empty".to_string(),
        };
        format!(
            "{} ({} prices, {}): {}/{} checks passed",
            self.symbol, self.observations, range, passed, total
        )
    }
}

/// Validator for price series integrity.
pub struct DataIntegrityValidator {
    config: IntegrityConfig,
}

impl DataIntegrityValidator {
    pub fn new(config: IntegrityConfig) -> Self {
        Self { config }
    }

    /// Run all checks.
    pub fn validate(&self, prices: &PriceSeries) -> DataIntegrityReport {
        let mut checks = Vec::new();
        let mut errors = Vec::new();

        let mut record = |(check, error): (CheckResult, Option<DataError>)| {
            checks.push(check);
            errors.extend(error);
        };

        // 1. Chronological order
        record(self.check_order(prices));

        // 2. Duplicates
        record(self.check_duplicates(prices));

        // 3. Price validity
        record(self.check_price_validity(prices));

        // 4. Date continuity
        record(self.check_date_continuity(prices));

        // 5. Length
        record(self.check_length(prices));

        DataIntegrityReport {
            symbol: prices.symbol.clone(),
            observations: prices.len(),
            first_date: prices.first_date(),
            last_date: prices.last_date(),
            checks,
            errors,
        }
    }

    /// Validate and fail on the first blocking problem.
    pub fn ensure_valid(&self, prices: &PriceSeries) -> Result<DataIntegrityReport, DataError> {
        let report = self.validate(prices);
        match report.errors.first() {
            Some(err) => Err(err.clone()),
            None => Ok(report),
        }
    }

    fn check_order(&self, prices: &PriceSeries) -> (CheckResult, Option<DataError>) {
        let mut first_error = None;
        let mut violations = 0;

        for (i, w) in prices.points.windows(2).enumerate() {
            if w[1].date < w[0].date {
                violations += 1;
                first_error.get_or_insert(DataError::NonMonotonic {
                    index: i + 1,
                    previous: w[0].date,
                    current: w[1].date,
                });
            }
        }

        match first_error {
            None => (
                CheckResult::pass("chronological_order", "Dates strictly ordered"),
                None,
            ),
            Some(err) => (
                CheckResult::fail(
                    "chronological_order",
                    &format!("{} out-of-order dates", violations),
                    Some(err.to_string()),
                ),
                Some(err),
            ),
        }
    }

    fn check_duplicates(&self, prices: &PriceSeries) -> (CheckResult, Option<DataError>) {
        let duplicates: Vec<_> = prices
            .points
            .windows(2)
            .enumerate()
            .filter(|(_, w)| w[0].date == w[1].date)
            .map(|(i, w)| (i + 1, w[1].date))
            .collect();

        match duplicates.first() {
            None => (
                CheckResult::pass("duplicate_dates", "No duplicate dates"),
                None,
            ),
            Some(&(index, date)) => {
                let listed: Vec<_> = duplicates.iter().map(|(_, d)| d.to_string()).collect();
                (
                    CheckResult::fail(
                        "duplicate_dates",
                        &format!("{} duplicate dates", duplicates.len()),
                        Some(listed.join(", ")),
                    ),
                    Some(DataError::DuplicateTimestamp { index, date }),
                )
            }
        }
    }

    /// Non-positive prices are fatal; missing (NaN) prices are only a
    /// warning because their returns are dropped before simulation.
    fn check_price_validity(&self, prices: &PriceSeries) -> (CheckResult, Option<DataError>) {
        let missing = prices.points.iter().filter(|p| !p.close.is_finite()).count();
        let non_positive: Vec<_> = prices
            .points
            .iter()
            .filter(|p| p.close.is_finite() && p.close <= 0.0)
            .collect();

        if let Some(bad) = non_positive.first() {
            return (
                CheckResult::fail(
                    "price_validity",
                    &format!("{} non-positive prices", non_positive.len()),
                    Some(format!("first on {}: {}", bad.date, bad.close)),
                ),
                Some(DataError::NonPositivePrice {
                    date: bad.date,
                    price: bad.close,
                }),
            );
        }

        if missing > 0 {
            warn!(
                symbol = %prices.symbol,
                missing,
                "price series has missing values"
            );
            return (
                CheckResult::pass(
                    "price_validity",
                    &format!("Prices positive but {} missing values will be dropped", missing),
                ),
                None,
            );
        }

        (
            CheckResult::pass("price_validity", "All prices positive and finite"),
            None,
        )
    }

    fn check_date_continuity(&self, prices: &PriceSeries) -> (CheckResult, Option<DataError>) {
        let mut gaps = Vec::new();
        let mut first_error = None;

        for w in prices.points.windows(2) {
            let (prev, curr) = (w[0].date, w[1].date);
            let gap_days = (curr - prev).num_days();
            if gap_days > self.config.max_gap_days {
                gaps.push(format!(
                    "{} to {} ({} days, {} trading days missing)",
                    prev,
                    curr,
                    gap_days,
                    missing_trading_days(prev, curr)
                ));
                first_error.get_or_insert(DataError::Gap {
                    from: prev,
                    to: curr,
                    days: gap_days,
                });
            }
        }

        if gaps.is_empty() {
            (
                CheckResult::pass(
                    "date_continuity",
                    &format!("{} prices, no major gaps", prices.len()),
                ),
                None,
            )
        } else {
            (
                CheckResult::fail(
                    "date_continuity",
                    &format!("{} major gaps found", gaps.len()),
                    Some(gaps.join(", ")),
                ),
                first_error,
            )
        }
    }

    fn check_length(&self, prices: &PriceSeries) -> (CheckResult, Option<DataError>) {
        let required = self.config.min_observations;
        if prices.len() >= required {
            (
                CheckResult::pass("minimum_length", &format!("{} prices", prices.len())),
                None,
            )
        } else {
            (
                CheckResult::fail(
                    "minimum_length",
                    &format!("{} prices, need at least {}", prices.len(), required),
                    None,
                ),
                Some(DataError::InsufficientData {
                    required,
                    available: prices.len(),
                }),
            )
        }
    }
}

impl Default for DataIntegrityValidator {
    fn default() -> Self {
        Self::new(IntegrityConfig::default())
    }
}

/// Get the next expected trading day (skip weekends).
fn next_trading_day(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next += Duration::days(1);
    }
    next
}

/// Weekdays strictly between two dates.
fn missing_trading_days(from: NaiveDate, to: NaiveDate) -> usize {
    let mut count = 0;
    let mut day = next_trading_day(from);
    while day < to {
        count += 1;
        day = next_trading_day(day);
    }
    count
}
