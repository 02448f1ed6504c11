//! Forecast configuration
//!
//! Every component receives its settings from a [`ForecastConfig`] at
//! construction. Defaults reproduce the production setup; `validate` rejects
//! inconsistent combinations before any data is touched.

use crate::error::{ForecastError, Result};
use crate::region::{AgeBand, Region};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use series_math::Newsvendor;

/// How flat dose series are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyMode {
    /// Flat series stay as observed (and are usually skipped by the forecaster)
    #[default]
    Disabled,
    /// Flat series are replaced by an incidence-driven synthetic series
    FlatSeries,
}

/// Parameters of the flat-series proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub mode: ProxyMode,
    /// Doses per unit of lagged incidence
    pub alpha: f64,
    /// Standard deviation of the multiplicative noise
    pub noise_sd: f64,
    /// Seed of the noise generator
    pub seed: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mode: ProxyMode::Disabled,
            alpha: 5.0,
            noise_sd: 0.05,
            seed: 123,
        }
    }
}

/// Safety band for the calibration multiplier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationBounds {
    pub lower: f64,
    pub upper: f64,
}

impl Default for CalibrationBounds {
    fn default() -> Self {
        Self {
            lower: 0.2,
            upper: 10.0,
        }
    }
}

/// Unit costs of the newsvendor order quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderCosts {
    /// Cost of one dose short
    pub understock: f64,
    /// Cost of one dose left over
    pub overstock: f64,
}

impl Default for OrderCosts {
    fn default() -> Self {
        Self {
            understock: 5.0,
            overstock: 1.0,
        }
    }
}

impl OrderCosts {
    /// Policy for these costs
    pub fn newsvendor(&self) -> Result<Newsvendor> {
        Ok(Newsvendor::new(self.understock, self.overstock)?)
    }
}

/// Forecasting settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Region universe of the panel
    pub regions: Vec<Region>,
    /// Age-band universe of the panel
    pub age_bands: Vec<AgeBand>,
    /// First month of the panel (earliest dose month when unset)
    pub start: Option<NaiveDate>,
    /// First month without ground truth (month after the last dose month when unset)
    pub forecast_start: Option<NaiveDate>,
    /// Number of future months to forecast
    pub horizon_months: usize,
    /// Minimum training length of a rolling-origin split
    pub min_train: usize,
    /// Months predicted by each rolling-origin split
    pub validation_horizon: usize,
    /// Ridge penalty of the demand model
    pub ridge_lambda: f64,
    /// Ensemble weight of the model forecast
    pub model_weight: f64,
    /// Ensemble weight of the seasonal-naive baseline
    pub baseline_weight: f64,
    /// Series with a target standard deviation below this are skipped
    pub min_target_std: f64,
    /// SMAPE denominator floor
    pub smape_epsilon: f64,
    /// Population used when a (region, age band) has none
    pub default_population: f64,
    /// Apply top-down reconciliation to the ensemble forecast
    pub reconcile: bool,
    pub calibration: CalibrationBounds,
    pub proxy: ProxyConfig,
    pub order_costs: OrderCosts,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            regions: Region::ALL.to_vec(),
            age_bands: AgeBand::ALL.to_vec(),
            start: None,
            forecast_start: None,
            horizon_months: 6,
            min_train: 8,
            validation_horizon: 2,
            ridge_lambda: 1.0,
            model_weight: 0.7,
            baseline_weight: 0.3,
            min_target_std: 1e-6,
            smape_epsilon: series_math::DEFAULT_SMAPE_EPSILON,
            default_population: 1_000_000.0,
            reconcile: true,
            calibration: CalibrationBounds::default(),
            proxy: ProxyConfig::default(),
            order_costs: OrderCosts::default(),
        }
    }
}

impl ForecastConfig {
    /// Check that the settings are consistent
    pub fn validate(&self) -> Result<()> {
        if self.regions.is_empty() {
            return Err(ForecastError::ValidationError(
                "At least one region must be configured".to_string(),
            ));
        }
        if self.age_bands.is_empty() {
            return Err(ForecastError::ValidationError(
                "At least one age band must be configured".to_string(),
            ));
        }
        if self.horizon_months == 0 {
            return Err(ForecastError::InvalidParameter(
                "Forecast horizon must be positive".to_string(),
            ));
        }
        if self.min_train == 0 || self.validation_horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Minimum training length and validation horizon must be positive".to_string(),
            ));
        }
        if !self.ridge_lambda.is_finite() || self.ridge_lambda < 0.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Ridge penalty must be non-negative, got {}",
                self.ridge_lambda
            )));
        }
        if self.model_weight < 0.0
            || self.baseline_weight < 0.0
            || (self.model_weight + self.baseline_weight - 1.0).abs() > 1e-9
        {
            return Err(ForecastError::ValidationError(format!(
                "Ensemble weights must be non-negative and sum to 1, got {} + {}",
                self.model_weight, self.baseline_weight
            )));
        }
        if !(self.calibration.lower > 0.0 && self.calibration.lower <= self.calibration.upper) {
            return Err(ForecastError::ValidationError(format!(
                "Calibration bounds must satisfy 0 < lower <= upper, got [{}, {}]",
                self.calibration.lower, self.calibration.upper
            )));
        }
        if self.smape_epsilon <= 0.0 || self.min_target_std < 0.0 {
            return Err(ForecastError::InvalidParameter(
                "SMAPE epsilon must be positive and the variance floor non-negative".to_string(),
            ));
        }
        if self.default_population < 0.0 {
            return Err(ForecastError::InvalidParameter(
                "Default population cannot be negative".to_string(),
            ));
        }
        if self.proxy.noise_sd < 0.0 || self.proxy.alpha < 0.0 {
            return Err(ForecastError::InvalidParameter(
                "Proxy alpha and noise must be non-negative".to_string(),
            ));
        }
        self.order_costs.newsvendor()?;
        Ok(())
    }
}
