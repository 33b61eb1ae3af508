pub mod analytics;
pub mod backtest;
pub mod config;
pub mod data;
pub mod metrics;
pub mod report;
pub mod validation;
pub mod volatility;

// Re-export commonly used types
pub use analytics::{AnalyticsConfig, ReturnDiagnostics};
pub use backtest::{
    CancellationToken, FailurePolicy, Position, SimulationConfig, SimulationError,
    SimulationResult, WalkForwardSimulator,
};
pub use config::{AppConfig, ConfigError};
pub use data::{PriceLoader, PriceSeries, PriceSource, ReturnSeries};
pub use metrics::{MetricsCalculator, MetricsConfig, PerformanceMetrics};
pub use report::{write_report, ReportError};
pub use validation::DataIntegrityValidator;
pub use volatility::{
    EwmaForecaster, ForecasterConfig, GarchForecaster, RealizedVolatilityForecaster,
    VolatilityForecaster,
};
