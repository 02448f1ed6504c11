//! # Demand Forecast
//!
//! Monthly vaccine demand forecasting per (region, age band).
//!
//! ## Features
//!
//! - Declared-schema CSV ingestion with region-code normalisation
//! - Complete monthly panel with seasonal climatology for future exogenous values
//! - Past-only lag and trailing moving-average features
//! - Rolling-origin validation of a ridge demand model, per series
//! - Seasonal-naive baseline and weighted ensemble
//! - Top-down reconciliation and year-over-year scale calibration
//! - Operational forecast table with recommended order quantities
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use demand_forecast::config::ForecastConfig;
//! use demand_forecast::data::InputSources;
//! use demand_forecast::pipeline::DemandForecaster;
//!
//! # fn main() -> demand_forecast::Result<()> {
//! let inputs = InputSources::in_dir("data/raw").load()?;
//! let run = DemandForecaster::new(ForecastConfig::default())?.run(&inputs)?;
//!
//! for row in &run.table {
//!     println!("{} {} {} -> {} doses", row.date, row.region, row.age_band, row.qty);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod calibrate;
pub mod config;
pub mod data;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod proxy;
pub mod reconcile;
pub mod region;
pub mod report;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use crate::aggregate::{Panel, PanelRow};
pub use crate::config::{ForecastConfig, ProxyMode};
pub use crate::error::{ForecastError, Result};
pub use crate::features::{FeatureRow, FeatureTable};
pub use crate::models::{DemandModel, FittedDemandModel, Forecasts};
pub use crate::region::{AgeBand, Region, RegionEncoding, SeriesKey};
pub use crate::report::ForecastTableRow;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
