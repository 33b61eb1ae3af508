//! Walk-forward backtesting for volatility timing.
//!
//! This module provides:
//! - Simulation configuration and the estimation failure policy
//! - Long/short position selection from a volatility forecast
//! - The fold-based walk-forward engine and its balance history
//! - Cooperative cancellation

pub mod config;
pub mod engine;
pub mod position;

pub use config::{FailurePolicy, SimulationConfig};
pub use engine::{
    apply_step, update_balance, BalanceHistory, BalancePoint, CancellationToken, SimulationError,
    SimulationResult, Step, WalkForwardSimulator,
};
pub use position::Position;
