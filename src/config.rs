//! Run configuration file
//!
//! ```toml
//! output_dir = "output"
//! pharmacies = "data/pharmacies.csv"
//!
//! [forecast]
//! regions = ["IDF", "ARA"]
//! horizon_months = 6
//!
//! [forecast.order_costs]
//! understock = 5.0
//! overstock = 1.0
//!
//! [allocation]
//! min_initial_stock = 100
//!
//! [replenishment]
//! monthly_capacity = 50000.0
//! max_demand_ratio = 1.2
//!
//! [inputs.doses]
//! path = "data/doses.csv"
//! table = "doses"
//! date_column = "date"
//! region_column = "region"
//! age_band_column = "age_band"
//! value_columns = ["doses"]
//! ```

use crate::error::{AppError, Result};
use demand_forecast::data::InputSources;
use demand_forecast::ForecastConfig;
use pharmacy_plan::{AllocationConfig, ReplenishmentConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything a run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Source tables of the forecast
    pub inputs: InputSources,
    /// Pharmacy reference table
    pub pharmacies: PathBuf,
    /// Directory receiving every output file
    pub output_dir: PathBuf,
    pub forecast: ForecastConfig,
    pub allocation: AllocationConfig,
    pub replenishment: ReplenishmentConfig,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            inputs: InputSources::in_dir("data"),
            pharmacies: PathBuf::from("data/pharmacies.csv"),
            output_dir: PathBuf::from("output"),
            forecast: ForecastConfig::default(),
            allocation: AllocationConfig::default(),
            replenishment: ReplenishmentConfig::default(),
        }
    }
}

impl PlanConfig {
    /// Parse and validate a TOML configuration
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PlanConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AppError::ConfigNotFound(path.to_path_buf()));
        }
        let config = Self::from_toml(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Check every nested section
    pub fn validate(&self) -> Result<()> {
        self.forecast
            .validate()
            .map_err(|e| AppError::InvalidConfig(e.to_string()))?;
        self.allocation
            .validate()
            .map_err(|e| AppError::InvalidConfig(e.to_string()))?;
        self.replenishment
            .validate()
            .map_err(|e| AppError::InvalidConfig(e.to_string()))?;
        if self.output_dir.as_os_str().is_empty() {
            return Err(AppError::InvalidConfig(
                "output_dir cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
