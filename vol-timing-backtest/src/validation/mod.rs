//! Validation module for input price data.
//!
//! Checks ordering, duplicates, price validity, calendar continuity and
//! length before any simulation runs.

pub mod data_integrity;

pub use data_integrity::{CheckResult, DataIntegrityReport, DataIntegrityValidator, IntegrityConfig};
