//! # Vaxplan
//!
//! `vaxplan` wires the forecasting and allocation crates into one batch run:
//!
//! - [`demand_forecast`]: monthly doses per 100k for every (region, age band)
//! - [`pharmacy_plan`]: per-pharmacy monthly quantities and stock levels
//!
//! Settings come from a single TOML file, see [`PlanConfig`].
//!
//! ## Example
//!
//! ```no_run
//! use vaxplan::{pipeline, PlanConfig};
//!
//! let config = PlanConfig::from_file("vaxplan.toml").unwrap();
//! let summary = pipeline::run(&config).unwrap();
//! println!("{} forecast rows", summary.forecast_rows);
//! ```

pub mod config;
pub mod error;
pub mod pipeline;

pub use crate::config::PlanConfig;
pub use crate::error::{AppError, Result};
pub use crate::pipeline::{OutputFiles, RunSummary};
