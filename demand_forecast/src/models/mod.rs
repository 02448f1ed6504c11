//! Demand models
//!
//! A [`DemandModel`] is an unfitted configuration; fitting it on a design
//! matrix yields a [`FittedDemandModel`] that owns everything it needs to
//! predict. Fitted models are owned per series and never shared.

use crate::error::Result;
use crate::region::SeriesKey;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt::Debug;

pub mod ridge;
pub mod seasonal_naive;

pub use ridge::{FittedRidge, RidgeModel};
pub use seasonal_naive::SeasonalNaive;

/// Forecast values keyed by (series, month)
pub type Forecasts = BTreeMap<(SeriesKey, NaiveDate), f64>;

/// Fitted model able to predict demand for new feature rows
pub trait FittedDemandModel: Debug + Clone + Send + Sync {
    /// Predict one value per feature row
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Demand model that can be fitted on feature rows
pub trait DemandModel: Debug + Clone + Send + Sync {
    /// The type of fitted model produced
    type Fitted: FittedDemandModel;

    /// Fit on a row-major design matrix and its target
    fn fit(&self, features: &[Vec<f64>], target: &[f64]) -> Result<Self::Fitted>;

    /// Get the name of the model
    fn name(&self) -> &str;
}
