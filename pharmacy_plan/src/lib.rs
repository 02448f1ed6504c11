//! # Pharmacy Plan
//!
//! `pharmacy_plan` turns regional vaccine demand forecasts into a monthly
//! replenishment plan for individual pharmacies.
//!
//! ## Stages
//!
//! - **Pharmacy table**: reference list of pharmacies with their population
//!   served and optional initial stock
//! - **Allocation**: regional dose totals split pro rata to population with
//!   largest-remainder rounding, so per-pharmacy integers always add up to the
//!   rounded regional total
//! - **Stock simulation**: month-by-month stock roll-forward, no backorders
//! - **Replenishment**: newsvendor order per region and month, bounded per
//!   region and by the monthly shipping capacity
//!
//! ## Usage Example
//!
//! ```no_run
//! use pharmacy_plan::{allocation, AllocationConfig, Allocator, PharmacyTable, StockSimulator};
//! use demand_forecast::report::read_csv;
//! use demand_forecast::ForecastTableRow;
//! use std::collections::BTreeMap;
//!
//! let pharmacies = PharmacyTable::from_csv("data/pharmacies.csv").unwrap();
//! let forecast: Vec<ForecastTableRow> = read_csv("output/forecast.csv").unwrap();
//!
//! let totals = allocation::regional_totals(&forecast, &BTreeMap::new(), 1_000_000.0);
//! let allocations = Allocator::new().allocate(&totals, &pharmacies);
//! let stock = StockSimulator::new(AllocationConfig::default())
//!     .unwrap()
//!     .simulate(&pharmacies, &allocations);
//! println!("{} stock snapshots", stock.len());
//! ```

use demand_forecast::{ForecastError, Region};
use std::path::PathBuf;
use thiserror::Error;

pub mod allocation;
pub mod config;
pub mod pharmacy;
pub mod replenish;
pub mod simulation;

pub use allocation::{largest_remainder, AllocationRow, Allocator};
pub use config::{AllocationConfig, ReplenishmentConfig};
pub use pharmacy::{Pharmacy, PharmacyTable};
pub use replenish::{Replenisher, ReplenishmentRow};
pub use simulation::{StockSimulator, StockSnapshot};

/// Errors that can occur while planning pharmacy replenishment
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Pharmacy '{pharmacy_id}' is listed twice in region {region}")]
    DuplicatePharmacy { region: Region, pharmacy_id: String },

    #[error("Table '{table}' is missing required column '{column}'")]
    MissingInputColumn { table: String, column: String },

    #[error("Input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),
}

/// Result type for planning operations
pub type Result<T> = std::result::Result<T, PlanError>;
