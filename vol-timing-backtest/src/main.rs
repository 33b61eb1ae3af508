//! Volatility-timing walk-forward backtester.
//!
//! # Usage
//!
//! ```bash
//! # Run a walk-forward backtest
//! vol-timing-backtest run --data data/N225.csv --output results
//!
//! # Return diagnostics (ACF, Ljung-Box)
//! vol-timing-backtest analyze --data data/N225.csv
//!
//! # Check a price file
//! vol-timing-backtest validate --data data/N225.csv
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use vol_timing_backtest::analytics::ReturnDiagnostics;
use vol_timing_backtest::data::{PriceSeries, PriceSource, ReturnSeries};
use vol_timing_backtest::volatility::ForecasterKind;
use vol_timing_backtest::{
    write_report, AppConfig, DataIntegrityValidator, MetricsCalculator, WalkForwardSimulator,
};

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "vol-timing-backtest")]
#[command(about = "Walk-forward backtester for volatility-timing strategies")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a walk-forward backtest
    Run {
        /// Price file (CSV or Parquet); overrides data.path
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Symbol label; defaults to the file stem
        #[arg(short, long)]
        symbol: Option<String>,

        /// Output directory for the report
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Forecaster: garch, ewma or realized
        #[arg(short, long)]
        forecaster: Option<ForecasterKind>,

        /// Volatility threshold in percent
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Forecast all steps in parallel before folding
        #[arg(long)]
        parallel: bool,
    },

    /// Print return diagnostics for a price file
    Analyze {
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Number of ACF lags
        #[arg(short, long)]
        lags: Option<usize>,
    },

    /// Validate a price file
    Validate {
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

/// Load prices and run the integrity checks; fatal problems abort.
fn load_validated(config: &AppConfig) -> Result<PriceSeries> {
    let loader = config.data.loader()?;
    let prices = loader
        .load_prices()
        .with_context(|| format!("Failed to load prices from {}", loader.path().display()))?;

    let validator = DataIntegrityValidator::new(config.validation.clone());
    let report = validator.validate(&prices);
    for check in report.failed_checks() {
        warn!("{}: {}", check.name, check.message);
    }
    if let Some(err) = report.errors.into_iter().next() {
        return Err(anyhow::Error::new(err).context("Price data failed validation"));
    }
    Ok(prices)
}

fn cmd_run(config: AppConfig, output: PathBuf) -> Result<()> {
    let prices = load_validated(&config)?;
    let returns = ReturnSeries::from_prices(&prices).context("Failed to build return series")?;

    let forecaster = config.forecaster.build()?;
    let simulator = WalkForwardSimulator::new(forecaster, config.simulation.clone());
    let result = simulator.run(&returns).context("Simulation failed")?;

    let metrics = MetricsCalculator::new(config.metrics.clone()).calculate(&result);

    println!("{}", SEPARATOR);
    println!(
        "{} | {} | train size {} | test {} to {}",
        result.symbol,
        result.forecaster,
        result.train_size,
        result
            .test_start
            .map(|d| d.to_string())
            .unwrap_or_default(),
        result.test_end.map(|d| d.to_string()).unwrap_or_default()
    );
    println!("{}", SEPARATOR);
    println!("{}", metrics.summary());

    let paths = write_report(&output, &result, &metrics).context("Failed to write report")?;
    println!();
    println!("Summary: {}", paths.summary.display());
    println!("History: {}", paths.history.display());
    Ok(())
}

fn cmd_analyze(config: AppConfig) -> Result<()> {
    let prices = load_validated(&config)?;
    let returns = ReturnSeries::from_prices(&prices).context("Failed to build return series")?;
    let diagnostics = ReturnDiagnostics::analyze(&returns, &config.analytics);
    println!("{}", diagnostics.summary());
    Ok(())
}

fn cmd_validate(config: AppConfig) -> Result<()> {
    let loader = config.data.loader()?;
    let prices = loader
        .load_prices()
        .with_context(|| format!("Failed to load prices from {}", loader.path().display()))?;
    let report = DataIntegrityValidator::new(config.validation.clone()).validate(&prices);
    println!("{}", report.summary());
    if !report.errors.is_empty() {
        anyhow::bail!("{} blocking data problems found", report.errors.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vol_timing_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run {
            data,
            symbol,
            output,
            forecaster,
            threshold,
            parallel,
        } => {
            if let Some(data) = data {
                config.data.path = Some(data);
            }
            if symbol.is_some() {
                config.data.symbol = symbol;
            }
            if let Some(kind) = forecaster {
                config.forecaster.kind = kind;
            }
            if let Some(threshold) = threshold {
                config.simulation.volatility_threshold = threshold;
            }
            config.simulation.parallel |= parallel;
            config.validate()?;
            cmd_run(config, output)?;
        }
        Commands::Analyze { data, lags } => {
            if let Some(data) = data {
                config.data.path = Some(data);
            }
            if let Some(lags) = lags {
                config.analytics.acf_lags = lags;
            }
            cmd_analyze(config)?;
        }
        Commands::Validate { data } => {
            if let Some(data) = data {
                config.data.path = Some(data);
            }
            cmd_validate(config)?;
        }
    }

    Ok(())
}
