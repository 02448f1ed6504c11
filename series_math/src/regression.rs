//! Ridge regression on standardised regressors
//!
//! Fits `y = b0 + sum_j b_j * (x_j - m_j) / s_j` by solving the penalised
//! normal equations `(Z'Z + lambda I) b = Z'(y - mean(y))` with a Cholesky
//! factorisation. Standardising first keeps one penalty meaningful across
//! regressors measured on very different scales (temperatures, counts, years).

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Columns with a spread below this are treated as constant
const MIN_SCALE: f64 = 1e-12;
/// Jitter added to the diagonal when no penalty is requested
const JITTER: f64 = 1e-8;

/// Ridge regression configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RidgeRegression {
    lambda: f64,
}

/// Coefficients of a fitted ridge regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeFit {
    /// Mean of the training target
    pub intercept: f64,
    /// Coefficients on the standardised regressors
    pub coefficients: Vec<f64>,
    /// Column means used for standardisation
    pub means: Vec<f64>,
    /// Column scales used for standardisation
    pub scales: Vec<f64>,
}

impl RidgeRegression {
    /// Create a new ridge regression with penalty `lambda >= 0`
    pub fn new(lambda: f64) -> Result<Self> {
        if !lambda.is_finite() || lambda < 0.0 {
            return Err(MathError::InvalidInput(format!(
                "Ridge penalty must be a non-negative finite number, got {}",
                lambda
            )));
        }

        Ok(Self { lambda })
    }

    /// Get the penalty
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Fit on a row-major design matrix
    pub fn fit(&self, rows: &[Vec<f64>], target: &[f64]) -> Result<RidgeFit> {
        let n = rows.len();
        if n == 0 {
            return Err(MathError::InsufficientData(
                "Ridge regression needs at least one observation".to_string(),
            ));
        }
        if target.len() != n {
            return Err(MathError::InvalidInput(format!(
                "Design matrix has {} rows but target has {} values",
                n,
                target.len()
            )));
        }
        if target.iter().any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "Target contains non-finite values".to_string(),
            ));
        }

        let k = rows[0].len();
        if let Some(bad) = rows.iter().position(|r| r.len() != k) {
            return Err(MathError::InvalidInput(format!(
                "Row {} has {} regressors, expected {}",
                bad,
                rows[bad].len(),
                k
            )));
        }

        let intercept = target.iter().sum::<f64>() / n as f64;

        let mut means = vec![0.0; k];
        for row in rows {
            for (m, x) in means.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in &mut means {
            *m /= n as f64;
        }

        let mut scales = vec![0.0; k];
        for row in rows {
            for j in 0..k {
                scales[j] += (row[j] - means[j]).powi(2);
            }
        }
        for s in &mut scales {
            *s = (*s / n as f64).sqrt();
            if !s.is_finite() || *s < MIN_SCALE {
                *s = 1.0;
            }
        }

        let z: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| {
                (0..k)
                    .map(|j| (row[j] - means[j]) / scales[j])
                    .collect()
            })
            .collect();

        let mut ztz = vec![vec![0.0; k]; k];
        let mut zty = vec![0.0; k];
        for (zi, yi) in z.iter().zip(target) {
            let centered = yi - intercept;
            for a in 0..k {
                zty[a] += zi[a] * centered;
                for b in a..k {
                    ztz[a][b] += zi[a] * zi[b];
                }
            }
        }

        let penalty = if self.lambda > 0.0 { self.lambda } else { JITTER };
        for a in 0..k {
            for b in 0..a {
                ztz[a][b] = ztz[b][a];
            }
            ztz[a][a] += penalty;
        }

        let coefficients = cholesky_solve(&ztz, &zty)?;

        Ok(RidgeFit {
            intercept,
            coefficients,
            means,
            scales,
        })
    }
}

impl RidgeFit {
    /// Number of regressors the fit expects
    pub fn num_regressors(&self) -> usize {
        self.coefficients.len()
    }

    /// Predict one observation
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.coefficients.len() {
            return Err(MathError::InvalidInput(format!(
                "Expected {} regressors, got {}",
                self.coefficients.len(),
                row.len()
            )));
        }

        Ok(self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .zip(self.means.iter().zip(&self.scales))
                .map(|((x, b), (m, s))| b * (x - m) / s)
                .sum::<f64>())
    }

    /// Predict a batch of observations
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }
}

/// Solve `A x = b` for a symmetric positive definite `A`
fn cholesky_solve(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>> {
    let n = b.len();
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|p| l[i][p] * l[j][p]).sum();
            if i == j {
                let d = a[i][i] - sum;
                if d <= 0.0 || !d.is_finite() {
                    return Err(MathError::CalculationError(
                        "Normal equations are not positive definite".to_string(),
                    ));
                }
                l[i][j] = d.sqrt();
            } else {
                l[i][j] = (a[i][j] - sum) / l[j][j];
            }
        }
    }

    // forward: L y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let sum: f64 = (0..i).map(|p| l[i][p] * y[p]).sum();
        y[i] = (b[i] - sum) / l[i][i];
    }

    // backward: L' x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|p| l[p][i] * x[p]).sum();
        x[i] = (y[i] - sum) / l[i][i];
    }

    Ok(x)
}
