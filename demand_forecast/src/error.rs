//! Error types for the demand_forecast crate

use polars::prelude::PolarsError;
use series_math::MathError;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for the demand_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A declared column is absent from a source table
    #[error("Missing column '{column}' in {table} table")]
    MissingInputColumn { table: String, column: String },

    /// A region code with no match in the region tables
    #[error("Unmappable region code: {0}")]
    UnmappableRegion(String),

    /// A series too short (or too flat) to be fitted
    #[error("Series {key} has {got} usable months, needs {needed}")]
    InsufficientSeriesHistory {
        key: String,
        needed: usize,
        got: usize,
    },

    /// A required input file does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Error from mathematical operations
    #[error("Math error: {0}")]
    MathError(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV writing
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}
