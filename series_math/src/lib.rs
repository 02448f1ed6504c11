//! # Series Math
//!
//! Numeric building blocks shared by the demand forecasting crates.
//! Everything in here works on plain slices so it can be reused for any
//! monthly series, independent of how the series was keyed or loaded.

use thiserror::Error;

pub mod accuracy;
pub mod moving_averages;
pub mod newsvendor;
pub mod regression;
pub mod stats;

pub use accuracy::{mean_absolute_error, root_mean_squared_error, smape, DEFAULT_SMAPE_EPSILON};
pub use moving_averages::{lag, rolling_mean, trailing_mean, TrailingMean};
pub use newsvendor::{critical_ratio, Newsvendor};
pub use regression::{RidgeFit, RidgeRegression};

/// Errors that can occur in series calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for series math operations
pub type Result<T> = std::result::Result<T, MathError>;
