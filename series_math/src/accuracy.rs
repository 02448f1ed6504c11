//! Forecast accuracy scores

use crate::{MathError, Result};

/// Floor applied to the SMAPE denominator
pub const DEFAULT_SMAPE_EPSILON: f64 = 1e-3;

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() {
        return Err(MathError::InvalidInput(format!(
            "Actual length ({}) doesn't match predicted length ({})",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.is_empty() {
        return Err(MathError::InsufficientData(
            "Accuracy needs at least one (actual, predicted) pair".to_string(),
        ));
    }
    Ok(())
}

/// Symmetric mean absolute percentage error, in percent.
///
/// `100 * mean(|p - a| / max(|a| + |p|, epsilon))`. The floor keeps pairs
/// where both values are near zero from blowing the score up.
pub fn smape(actual: &[f64], predicted: &[f64], epsilon: f64) -> Result<f64> {
    check_lengths(actual, predicted)?;

    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (p - a).abs() / (a.abs() + p.abs()).max(epsilon))
        .sum();

    Ok(100.0 * total / actual.len() as f64)
}

/// Mean absolute error
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;

    let total: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum();

    Ok(total / actual.len() as f64)
}

/// Root mean squared error
pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;

    let total: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();

    Ok((total / actual.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_smape() {
        let actual = [100.0, 200.0];
        let predicted = [110.0, 180.0];
        // 10/210 and 20/380
        let expected = 100.0 * (10.0 / 210.0 + 20.0 / 380.0) / 2.0;
        assert_relative_eq!(smape(&actual, &predicted, DEFAULT_SMAPE_EPSILON).unwrap(), expected);
    }

    #[test]
    fn test_smape_near_zero_uses_floor() {
        let score = smape(&[0.0], &[0.0005], DEFAULT_SMAPE_EPSILON).unwrap();
        assert_relative_eq!(score, 50.0);

        assert_eq!(smape(&[0.0], &[0.0], DEFAULT_SMAPE_EPSILON).unwrap(), 0.0);
    }

    #[test]
    fn test_mae() {
        let mae = mean_absolute_error(&[10.0, 20.0, 30.0], &[12.0, 18.0, 33.0]).unwrap();
        assert_relative_eq!(mae, 7.0 / 3.0);
    }

    #[test]
    fn test_rmse() {
        let rmse = root_mean_squared_error(&[10.0, 20.0], &[13.0, 16.0]).unwrap();
        assert_relative_eq!(rmse, (12.5f64).sqrt());
    }

    #[test]
    fn test_length_checks() {
        assert!(smape(&[1.0], &[1.0, 2.0], DEFAULT_SMAPE_EPSILON).is_err());
        assert!(mean_absolute_error(&[], &[]).is_err());
        assert!(root_mean_squared_error(&[1.0, 2.0], &[1.0]).is_err());
    }
}
