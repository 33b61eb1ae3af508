//! Walk-forward simulation engine.
//!
//! Runs the simulation loop over the test segment:
//! 1. Slice the trailing window `[i - train_size, i)`
//! 2. Forecast next-step volatility from the window
//! 3. Pick a position against the volatility threshold
//! 4. Read the realized return at `i` and update the balance
//! 5. Record the balance point
//!
//! The loop is an explicit fold over the step range with a
//! [`BalanceHistory`] accumulator; [`apply_step`] is the fold body.
//! Parallel mode computes every forecast up front on the rayon pool and
//! then folds in index order, so both modes produce the same history.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::{DataError, ReturnSeries};
use crate::volatility::{EstimationError, VolatilityForecaster};

use super::config::{FailurePolicy, SimulationConfig};
use super::position::Position;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Estimation failed at step {index} ({date}) after {completed} completed steps: {source}")]
    Estimation {
        index: usize,
        date: NaiveDate,
        completed: usize,
        #[source]
        source: EstimationError,
    },

    #[error("Simulation cancelled after {completed} completed steps")]
    Cancelled { completed: usize },
}

/// Shared flag for stopping a run between steps.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Balance after one simulated step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub date: NaiveDate,
    pub balance: Decimal,
    pub position: Position,
    /// `None` when the forecaster failed and the fallback was used.
    pub forecast_volatility: Option<f64>,
    pub realized_return: f64,
    pub fallback: bool,
}

impl BalancePoint {
    pub fn balance_f64(&self) -> f64 {
        self.balance.try_into().unwrap_or(0.0)
    }
}

/// Balance per test-segment date, plus the starting balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceHistory {
    pub initial_balance: Decimal,
    pub points: Vec<BalancePoint>,
}

impl BalanceHistory {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            initial_balance,
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Latest balance, or the initial balance before the first step.
    pub fn current_balance(&self) -> Decimal {
        self.points
            .last()
            .map(|p| p.balance)
            .unwrap_or(self.initial_balance)
    }

    pub fn final_balance(&self) -> Decimal {
        self.current_balance()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn balances_f64(&self) -> Vec<f64> {
        self.points.iter().map(BalancePoint::balance_f64).collect()
    }

    pub fn count_position(&self, position: Position) -> usize {
        self.points.iter().filter(|p| p.position == position).count()
    }

    pub fn fallback_count(&self) -> usize {
        self.points.iter().filter(|p| p.fallback).count()
    }
}

/// Resolved inputs for one step of the fold.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub date: NaiveDate,
    pub position: Position,
    pub forecast_volatility: Option<f64>,
    pub realized_return: f64,
    pub fallback: bool,
}

/// `balance + balance * multiplier * r / 100`, i.e. `balance * (1 ± r)`.
pub fn update_balance(balance: Decimal, position: Position, realized_return: f64) -> Decimal {
    // Returns are finite by construction of ReturnSeries.
    let r = Decimal::try_from(realized_return).unwrap_or(Decimal::ZERO);
    let multiplier = Decimal::try_from(position.multiplier()).unwrap_or(Decimal::ZERO);
    balance + balance * multiplier * r / Decimal::ONE_HUNDRED
}

/// Fold body: advance the balance by one step and append it.
pub fn apply_step(mut history: BalanceHistory, step: Step) -> BalanceHistory {
    let balance = update_balance(
        history.current_balance(),
        step.position,
        step.realized_return,
    );
    history.points.push(BalancePoint {
        date: step.date,
        balance,
        position: step.position,
        forecast_volatility: step.forecast_volatility,
        realized_return: step.realized_return,
        fallback: step.fallback,
    });
    history
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub symbol: String,
    pub forecaster: String,
    pub config: SimulationConfig,
    pub train_size: usize,
    pub test_start: Option<NaiveDate>,
    pub test_end: Option<NaiveDate>,
    pub history: BalanceHistory,
    pub long_steps: usize,
    pub short_steps: usize,
    pub fallback_steps: usize,
}

impl SimulationResult {
    pub fn final_balance(&self) -> Decimal {
        self.history.final_balance()
    }

    pub fn total_return_pct(&self) -> f64 {
        let initial: f64 = self.history.initial_balance.try_into().unwrap_or(0.0);
        if initial == 0.0 {
            return 0.0;
        }
        let last: f64 = self.final_balance().try_into().unwrap_or(0.0);
        (last / initial - 1.0) * 100.0
    }
}

/// Walk-forward simulator over a pluggable forecaster.
pub struct WalkForwardSimulator<F: VolatilityForecaster> {
    forecaster: F,
    config: SimulationConfig,
}

impl<F: VolatilityForecaster> WalkForwardSimulator<F> {
    pub fn new(forecaster: F, config: SimulationConfig) -> Self {
        Self { forecaster, config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn forecaster(&self) -> &F {
        &self.forecaster
    }

    pub fn run(&self, series: &ReturnSeries) -> Result<SimulationResult, SimulationError> {
        self.run_with_cancel(series, &CancellationToken::new())
    }

    pub fn run_with_cancel(
        &self,
        series: &ReturnSeries,
        token: &CancellationToken,
    ) -> Result<SimulationResult, SimulationError> {
        self.config.validate()?;

        let n = series.len();
        let train_size = self.config.train_size(n);
        if train_size == 0 || train_size >= n {
            return Err(DataError::InsufficientData {
                required: train_size.max(1) + 1,
                available: n,
            }
            .into());
        }

        let total = n - train_size;
        info!(
            "Starting walk-forward run for {}: {} returns, train size {}, {} steps, forecaster {}",
            series.symbol(),
            n,
            train_size,
            total,
            self.forecaster.name()
        );

        let precomputed = if self.config.parallel {
            Some(self.forecast_parallel(series, train_size, token))
        } else {
            None
        };

        let history = (train_size..n).try_fold(
            BalanceHistory::new(self.config.initial_balance),
            |history, index| -> Result<BalanceHistory, SimulationError> {
                if token.is_cancelled() {
                    return Err(SimulationError::Cancelled {
                        completed: history.len(),
                    });
                }

                let forecast = match &precomputed {
                    Some(forecasts) => match &forecasts[index - train_size] {
                        Some(result) => result.clone(),
                        None => {
                            return Err(SimulationError::Cancelled {
                                completed: history.len(),
                            })
                        }
                    },
                    None => self.forecast_at(series, index, train_size),
                };

                let step = self.resolve_step(series, index, forecast, history.len())?;
                let history = apply_step(history, step);

                debug!(
                    index,
                    date = %step.date,
                    forecast = ?step.forecast_volatility,
                    position = %step.position,
                    balance = %history.current_balance(),
                    "step"
                );

                let done = history.len();
                if precomputed.is_none() && (done % (total / 10).max(1) == 0 || done == total) {
                    info!(
                        "  {:.0}% ({}/{} steps), balance {}",
                        done as f64 / total as f64 * 100.0,
                        done,
                        total,
                        history.current_balance().round_dp(2)
                    );
                }

                Ok(history)
            },
        )?;

        let result = SimulationResult {
            symbol: series.symbol().to_string(),
            forecaster: self.forecaster.name().to_string(),
            config: self.config.clone(),
            train_size,
            test_start: series.get(train_size).map(|p| p.date),
            test_end: series.last_date(),
            long_steps: history.count_position(Position::Long),
            short_steps: history.count_position(Position::Short),
            fallback_steps: history.fallback_count(),
            history,
        };

        info!(
            "Finished {}: final balance {}, {} long / {} short / {} fallback",
            result.symbol,
            result.final_balance().round_dp(2),
            result.long_steps,
            result.short_steps,
            result.fallback_steps
        );

        Ok(result)
    }

    /// Forecast for the return at `index` from the window before it.
    fn forecast_at(
        &self,
        series: &ReturnSeries,
        index: usize,
        train_size: usize,
    ) -> Result<f64, EstimationError> {
        let window = series
            .trailing_window(index, train_size)
            .ok_or(EstimationError::WindowTooShort {
                required: train_size,
                actual: index.min(train_size),
            })?;

        let volatility = self.forecaster.forecast(&window, self.config.order)?;
        if volatility.is_finite() && volatility >= 0.0 {
            Ok(volatility)
        } else {
            Err(EstimationError::InvalidForecast(volatility))
        }
    }

    /// Forecast every step on the rayon pool. `None` marks steps skipped
    /// after cancellation.
    fn forecast_parallel(
        &self,
        series: &ReturnSeries,
        train_size: usize,
        token: &CancellationToken,
    ) -> Vec<Option<Result<f64, EstimationError>>> {
        let total = series.len() - train_size;
        let progress = AtomicUsize::new(0);

        (train_size..series.len())
            .into_par_iter()
            .map(|index| {
                if token.is_cancelled() {
                    return None;
                }
                let forecast = self.forecast_at(series, index, train_size);

                let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
                if done % (total / 10).max(1) == 0 || done == total {
                    info!(
                        "  {:.0}% ({}/{} forecasts)",
                        done as f64 / total as f64 * 100.0,
                        done,
                        total
                    );
                }

                Some(forecast)
            })
            .collect()
    }

    /// Turn a forecast outcome into a step, applying the failure policy.
    /// The realized return is read only after the position is fixed.
    fn resolve_step(
        &self,
        series: &ReturnSeries,
        index: usize,
        forecast: Result<f64, EstimationError>,
        completed: usize,
    ) -> Result<Step, SimulationError> {
        let observation = series.get(index).ok_or(DataError::InsufficientData {
            required: index + 1,
            available: series.len(),
        })?;

        let (position, forecast_volatility, fallback) = match forecast {
            Ok(volatility) => (
                Position::decide(volatility, self.config.volatility_threshold),
                Some(volatility),
                false,
            ),
            Err(source) => match self.config.on_estimation_failure {
                FailurePolicy::Abort => {
                    return Err(SimulationError::Estimation {
                        index,
                        date: observation.date,
                        completed,
                        source,
                    })
                }
                FailurePolicy::Fallback => {
                    warn!(
                        "Estimation failed at step {} ({}): {}; using fallback position {}",
                        index, observation.date, source, self.config.fallback_position
                    );
                    (self.config.fallback_position, None, true)
                }
            },
        };

        Ok(Step {
            date: observation.date,
            position,
            forecast_volatility,
            realized_return: observation.value,
            fallback,
        })
    }
}
