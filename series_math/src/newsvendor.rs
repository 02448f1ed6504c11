//! Single-period (newsvendor) order quantity under normal demand
//!
//! With a unit understock cost `cu` and overstock cost `co` the optimal
//! order is the `cu / (cu + co)` quantile of demand. For demand
//! `N(mean, sigma^2)` that is `mean + z * sigma` where `z` is the standard
//! normal quantile of the critical ratio.

use crate::{MathError, Result};
use statrs::distribution::{ContinuousCDF, Normal};

/// Optimal service quantile for a pair of unit costs
pub fn critical_ratio(understock_cost: f64, overstock_cost: f64) -> Result<f64> {
    if !(understock_cost >= 0.0 && understock_cost.is_finite()) {
        return Err(MathError::InvalidInput(format!(
            "Understock cost must be finite and non-negative, got {}",
            understock_cost
        )));
    }
    if !(overstock_cost >= 0.0 && overstock_cost.is_finite()) {
        return Err(MathError::InvalidInput(format!(
            "Overstock cost must be finite and non-negative, got {}",
            overstock_cost
        )));
    }
    let total = understock_cost + overstock_cost;
    if total <= 0.0 {
        return Err(MathError::InvalidInput(
            "Understock and overstock costs cannot both be zero".to_string(),
        ));
    }
    Ok(understock_cost / total)
}

/// Newsvendor policy for fixed unit costs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Newsvendor {
    ratio: f64,
    z: f64,
}

impl Newsvendor {
    /// Create a policy; the quantile is `-inf` when stocking out is free and
    /// `+inf` when overstock is free
    pub fn new(understock_cost: f64, overstock_cost: f64) -> Result<Self> {
        let ratio = critical_ratio(understock_cost, overstock_cost)?;
        let z = if ratio <= 0.0 {
            f64::NEG_INFINITY
        } else if ratio >= 1.0 {
            f64::INFINITY
        } else {
            let normal = Normal::new(0.0, 1.0)
                .map_err(|e| MathError::CalculationError(e.to_string()))?;
            normal.inverse_cdf(ratio)
        };
        Ok(Self { ratio, z })
    }

    /// `cu / (cu + co)`
    pub fn critical_ratio(&self) -> f64 {
        self.ratio
    }

    /// Standard normal quantile of the critical ratio
    pub fn z(&self) -> f64 {
        self.z
    }

    /// Order quantity for demand with the given mean and standard deviation.
    ///
    /// Never negative. A zero ratio orders nothing, a certain demand
    /// (`sigma <= 0`) orders the mean, and a ratio of one with uncertain
    /// demand is unbounded.
    pub fn quantity(&self, mean: f64, sigma: f64) -> f64 {
        if self.ratio <= 0.0 {
            return 0.0;
        }
        let mean = mean.max(0.0);
        if !(sigma > 0.0 && sigma.is_finite()) {
            return mean;
        }
        if self.z.is_infinite() {
            return f64::INFINITY;
        }
        (mean + self.z * sigma).max(0.0)
    }
}
