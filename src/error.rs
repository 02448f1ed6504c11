use demand_forecast::ForecastError;
use pharmacy_plan::PlanError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors of a planning run
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Result type for planning runs
pub type Result<T> = std::result::Result<T, AppError>;
