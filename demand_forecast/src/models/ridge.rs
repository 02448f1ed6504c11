//! Ridge regression demand model

use crate::error::{ForecastError, Result};
use crate::models::{DemandModel, FittedDemandModel};
use series_math::{RidgeFit, RidgeRegression};

/// Ridge regression on standardised features
#[derive(Debug, Clone)]
pub struct RidgeModel {
    /// Name of the model
    name: String,
    /// Penalised regression
    regression: RidgeRegression,
}

/// Fitted ridge demand model
#[derive(Debug, Clone)]
pub struct FittedRidge {
    /// Name of the model
    name: String,
    /// Fitted coefficients
    fit: RidgeFit,
}

impl RidgeModel {
    /// Create a new ridge model with penalty `lambda`
    pub fn new(lambda: f64) -> Result<Self> {
        let regression = RidgeRegression::new(lambda)
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;

        Ok(Self {
            name: format!("Ridge(lambda={})", lambda),
            regression,
        })
    }

    /// Get the penalty
    pub fn lambda(&self) -> f64 {
        self.regression.lambda()
    }
}

impl DemandModel for RidgeModel {
    type Fitted = FittedRidge;

    fn fit(&self, features: &[Vec<f64>], target: &[f64]) -> Result<FittedRidge> {
        let fit = self.regression.fit(features, target)?;

        Ok(FittedRidge {
            name: self.name.clone(),
            fit,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl FittedRidge {
    /// Fitted coefficients
    pub fn coefficients(&self) -> &RidgeFit {
        &self.fit
    }
}

impl FittedDemandModel for FittedRidge {
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        Ok(self.fit.predict(features)?)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_and_predict() {
        let x: Vec<Vec<f64>> = (0..12).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..12).map(|i| 10.0 + 3.0 * i as f64).collect();

        let fitted = RidgeModel::new(1e-6).unwrap().fit(&x, &y).unwrap();
        let pred = fitted.predict(&[vec![12.0]]).unwrap();

        assert_relative_eq!(pred[0], 46.0, epsilon = 1e-3);
        assert!(fitted.name().starts_with("Ridge"));
    }

    #[test]
    fn test_negative_penalty_rejected() {
        assert!(matches!(
            RidgeModel::new(-0.5),
            Err(ForecastError::InvalidParameter(_))
        ));
    }
}
