//! End-to-end tests of the walk-forward simulator through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use vol_timing_backtest::backtest::{
    CancellationToken, FailurePolicy, Position, SimulationConfig, SimulationError,
    WalkForwardSimulator,
};
use vol_timing_backtest::data::{
    PricePoint, PriceSeries, PriceSource, ReturnPoint, ReturnSeries, TrailingWindow,
};
use vol_timing_backtest::metrics::MetricsCalculator;
use vol_timing_backtest::volatility::{
    EstimationError, EwmaForecaster, GarchForecaster, ModelOrder, VolatilityForecaster,
};
use vol_timing_backtest::{write_report, DataIntegrityValidator, PriceLoader};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
}

fn returns(values: &[f64]) -> ReturnSeries {
    ReturnSeries::from_points(
        "TEST",
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| ReturnPoint {
                date: start() + Duration::days(i as i64),
                value,
            })
            .collect(),
    )
    .unwrap()
}

/// Deterministic pseudo-random returns with a calm and a turbulent regime.
fn synthetic_returns(n: usize) -> Vec<f64> {
    let mut state: u64 = 7;
    (0..n)
        .map(|i| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let u = ((state >> 11) as f64 + 0.5) / (1u64 << 53) as f64;
            let scale = if (i / 40) % 2 == 0 { 0.008 } else { 0.025 };
            (u - 0.5) * 2.0 * scale
        })
        .collect()
}

struct Constant(f64);

impl VolatilityForecaster for Constant {
    fn name(&self) -> &str {
        "constant"
    }

    fn forecast(
        &self,
        _window: &TrailingWindow<'_>,
        _order: ModelOrder,
    ) -> Result<f64, EstimationError> {
        Ok(self.0)
    }
}

struct AlwaysFails;

impl VolatilityForecaster for AlwaysFails {
    fn name(&self) -> &str {
        "always-fails"
    }

    fn forecast(
        &self,
        _window: &TrailingWindow<'_>,
        _order: ModelOrder,
    ) -> Result<f64, EstimationError> {
        Err(EstimationError::NotConverged { iterations: 0 })
    }
}

/// Records `(last window date, target date, window length, order)` per call.
#[derive(Default)]
struct Recording {
    calls: Mutex<Vec<(NaiveDate, NaiveDate, usize, ModelOrder)>>,
}

impl VolatilityForecaster for Recording {
    fn name(&self) -> &str {
        "recording"
    }

    fn forecast(
        &self,
        window: &TrailingWindow<'_>,
        order: ModelOrder,
    ) -> Result<f64, EstimationError> {
        let last = window
            .last_date()
            .ok_or(EstimationError::WindowTooShort { required: 1, actual: 0 })?;
        self.calls
            .lock()
            .unwrap()
            .push((last, window.target_date(), window.len(), order));
        Ok(1.0)
    }
}

/// Cancels its token once it has been called `after` times.
struct CancelAfter {
    after: usize,
    calls: AtomicUsize,
    token: CancellationToken,
}

impl VolatilityForecaster for CancelAfter {
    fn name(&self) -> &str {
        "cancel-after"
    }

    fn forecast(
        &self,
        _window: &TrailingWindow<'_>,
        _order: ModelOrder,
    ) -> Result<f64, EstimationError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
            self.token.cancel();
        }
        Ok(1.0)
    }
}

#[test]
fn test_history_length_property() {
    for n in [5usize, 10, 23, 57] {
        let series = returns(&synthetic_returns(n));
        let config = SimulationConfig::default();
        let train_size = config.train_size(n);
        let result = WalkForwardSimulator::new(Constant(1.0), config)
            .run(&series)
            .unwrap();
        assert_eq!(result.history.len(), n - train_size);
        let test_dates: Vec<_> = series.points()[train_size..].iter().map(|p| p.date).collect();
        assert_eq!(result.history.dates(), test_dates);
    }
}

#[test]
fn test_forecaster_never_sees_target() {
    let series = returns(&synthetic_returns(50));
    let forecaster = Recording::default();
    let sim = WalkForwardSimulator::new(&forecaster, SimulationConfig::default());
    let result = sim.run(&series).unwrap();

    let calls = forecaster.calls.lock().unwrap();
    assert_eq!(calls.len(), result.history.len());
    for (last, target, len, _) in calls.iter() {
        assert!(last < target);
        assert_eq!(*len, result.train_size);
    }
}

#[test]
fn test_configured_order_reaches_forecaster() {
    let series = returns(&synthetic_returns(40));
    let forecaster = Recording::default();
    let config = SimulationConfig {
        order: ModelOrder::new(2, 1),
        ..Default::default()
    };
    WalkForwardSimulator::new(&forecaster, config)
        .run(&series)
        .unwrap();

    let calls = forecaster.calls.lock().unwrap();
    assert!(!calls.is_empty());
    assert!(calls
        .iter()
        .all(|(_, _, _, order)| *order == ModelOrder::new(2, 1)));
}

#[test]
fn test_all_long_compounds_returns() {
    let values = [0.01, -0.02, 0.015, 0.005, -0.01, 0.02, 0.01, -0.005, 0.003, 0.012];
    let series = returns(&values);
    let config = SimulationConfig {
        train_size_rate: 0.5,
        initial_balance: dec!(1000000),
        ..Default::default()
    };
    let result = WalkForwardSimulator::new(Constant(0.5), config)
        .run(&series)
        .unwrap();

    let expected = values[5..]
        .iter()
        .fold(1_000_000.0, |balance, r| balance * (1.0 + r));
    let actual: f64 = result.final_balance().try_into().unwrap();
    assert_eq!(result.long_steps, 5);
    assert_eq!(result.short_steps, 0);
    assert!((actual - expected).abs() / expected < 1e-12);
}

#[test]
fn test_single_long_step() {
    let series = returns(&[0.01, -0.01, 0.005, -0.005, 0.02]);
    let config = SimulationConfig {
        initial_balance: dec!(1000000),
        ..Default::default()
    };
    let result = WalkForwardSimulator::new(Constant(1.0), config)
        .run(&series)
        .unwrap();
    assert_eq!(result.history.len(), 1);
    assert_eq!(result.history.points[0].position, Position::Long);
    assert_eq!(result.final_balance(), dec!(1020000));
}

#[test]
fn test_drawdown_of_known_history() {
    let drawdowns = MetricsCalculator::drawdowns(&[100.0, 90.0, 120.0, 80.0]);
    let expected = [0.0, 0.1, 0.0, 1.0 / 3.0];
    for (got, want) in drawdowns.iter().zip(expected) {
        assert!((got - want).abs() < 1e-9);
    }
    assert!((MetricsCalculator::max_drawdown(&[100.0, 90.0, 120.0, 80.0]) - 0.3333).abs() < 1e-4);
}

#[test]
fn test_failure_aborts_with_no_history() {
    let series = returns(&synthetic_returns(20));
    let err = WalkForwardSimulator::new(AlwaysFails, SimulationConfig::default())
        .run(&series)
        .unwrap_err();
    match err {
        SimulationError::Estimation {
            index,
            date,
            completed,
            ..
        } => {
            assert_eq!(index, 16);
            assert_eq!(date, series.points()[16].date);
            assert_eq!(completed, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_failure_fallback_uses_default_position() {
    let series = returns(&synthetic_returns(20));
    let config = SimulationConfig {
        on_estimation_failure: FailurePolicy::Fallback,
        ..Default::default()
    };
    let result = WalkForwardSimulator::new(AlwaysFails, config)
        .run(&series)
        .unwrap();
    assert_eq!(result.history.len(), 4);
    assert_eq!(result.fallback_steps, 4);
    assert!(result
        .history
        .points
        .iter()
        .all(|p| p.fallback && p.position == Position::Long && p.forecast_volatility.is_none()));
}

#[test]
fn test_parallel_matches_sequential() {
    let series = returns(&synthetic_returns(120));
    let forecaster = EwmaForecaster::default();
    let sequential = WalkForwardSimulator::new(
        forecaster,
        SimulationConfig {
            volatility_threshold: 1.2,
            ..Default::default()
        },
    )
    .run(&series)
    .unwrap();
    let parallel = WalkForwardSimulator::new(
        forecaster,
        SimulationConfig {
            volatility_threshold: 1.2,
            parallel: true,
            ..Default::default()
        },
    )
    .run(&series)
    .unwrap();

    assert_eq!(sequential.history, parallel.history);
    assert_eq!(sequential.short_steps, parallel.short_steps);
}

#[test]
fn test_parallel_abort_reports_first_failure() {
    let series = returns(&synthetic_returns(20));
    let config = SimulationConfig {
        parallel: true,
        ..Default::default()
    };
    let err = WalkForwardSimulator::new(AlwaysFails, config)
        .run(&series)
        .unwrap_err();
    assert!(matches!(
        err,
        SimulationError::Estimation {
            index: 16,
            completed: 0,
            ..
        }
    ));
}

#[test]
fn test_pre_cancelled_token() {
    let series = returns(&synthetic_returns(30));
    let token = CancellationToken::new();
    token.cancel();

    for parallel in [false, true] {
        let config = SimulationConfig {
            parallel,
            ..Default::default()
        };
        let err = WalkForwardSimulator::new(Constant(1.0), config)
            .run_with_cancel(&series, &token)
            .unwrap_err();
        assert!(matches!(err, SimulationError::Cancelled { completed: 0 }));
    }
}

#[test]
fn test_cancel_between_steps() {
    let series = returns(&synthetic_returns(50));
    let token = CancellationToken::new();
    let forecaster = CancelAfter {
        after: 3,
        calls: AtomicUsize::new(0),
        token: token.clone(),
    };
    let err = WalkForwardSimulator::new(forecaster, SimulationConfig::default())
        .run_with_cancel(&series, &token)
        .unwrap_err();
    assert!(matches!(err, SimulationError::Cancelled { completed: 3 }));
}

#[test]
fn test_sharpe_invariant_to_initial_balance() {
    let series = returns(&synthetic_returns(80));
    let run = |initial: Decimal| {
        let config = SimulationConfig {
            initial_balance: initial,
            ..Default::default()
        };
        let result = WalkForwardSimulator::new(EwmaForecaster::default(), config)
            .run(&series)
            .unwrap();
        MetricsCalculator::default()
            .sharpe_ratio(&result.history.balances_f64())
            .unwrap()
    };
    assert!((run(dec!(1000)) - run(dec!(10000000))).abs() < 1e-6);
}

#[test]
fn test_csv_to_report_with_garch() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("SIM.csv");

    let mut price = 100.0;
    let mut body = String::from("date,adj_close\n");
    let mut prices = Vec::new();
    for (i, r) in std::iter::once(0.0).chain(synthetic_returns(150)).enumerate() {
        price *= f64::exp(r);
        let date = start() + Duration::days(i as i64);
        body.push_str(&format!("{},{}\n", date, price));
        prices.push(PricePoint::new(date, price));
    }
    std::fs::write(&csv_path, body).unwrap();

    let loaded = PriceLoader::new(&csv_path).load_prices().unwrap();
    assert_eq!(loaded.symbol, "SIM");
    assert_eq!(loaded.len(), 151);

    let report = DataIntegrityValidator::default()
        .ensure_valid(&loaded)
        .unwrap();
    assert!(report.all_passed());

    let series = ReturnSeries::from_prices(&loaded).unwrap();
    assert_eq!(series.len(), 150);
    let reference = ReturnSeries::from_prices(&PriceSeries::new("SIM", prices)).unwrap();
    assert!((series.values()[10] - reference.values()[10]).abs() < 1e-9);

    let config = SimulationConfig {
        volatility_threshold: 1.5,
        on_estimation_failure: FailurePolicy::Fallback,
        ..Default::default()
    };
    let result = WalkForwardSimulator::new(GarchForecaster::default(), config)
        .run(&series)
        .unwrap();
    assert_eq!(result.history.len(), 30);
    assert_eq!(result.long_steps + result.short_steps, 30);

    let metrics = MetricsCalculator::default().calculate(&result);
    assert!(metrics.max_drawdown >= 0.0 && metrics.max_drawdown < 1.0);

    let paths = write_report(dir.path().join("report"), &result, &metrics).unwrap();
    let csv = std::fs::read_to_string(paths.history).unwrap();
    assert_eq!(csv.lines().count(), 31);
}
