//! Descriptive statistics used across the pipeline
//!
//! Non-finite inputs are ignored by every function in this module so callers
//! can pass raw columns that still contain NaN sentinels.

use statrs::statistics::{Data, Median, Statistics};

fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Arithmetic mean, `None` for an empty input
pub fn mean(values: &[f64]) -> Option<f64> {
    let values = finite(values);
    if values.is_empty() {
        return None;
    }
    Some(values.iter().mean())
}

/// Median, `None` for an empty input
pub fn median(values: &[f64]) -> Option<f64> {
    let values = finite(values);
    if values.is_empty() {
        return None;
    }
    Some(Data::new(values).median())
}

/// Sample standard deviation (n - 1 denominator), `None` below two values
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    let values = finite(values);
    if values.len() < 2 {
        return None;
    }
    let sd = values.iter().std_dev();
    if sd.is_finite() {
        Some(sd)
    } else {
        None
    }
}

/// True when the series carries no usable variation.
///
/// A series with fewer than two finite values is treated as constant.
pub fn is_near_constant(values: &[f64], tolerance: f64) -> bool {
    sample_std_dev(values).map_or(true, |sd| sd < tolerance)
}

/// Clamp into `[lower, upper]`, mapping NaN to `lower`
pub fn clip(value: f64, lower: f64, upper: f64) -> f64 {
    if value.is_nan() {
        lower
    } else {
        value.max(lower).min(upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_relative_eq!(median(&[4.0, 1.0, 3.0, 2.0]).unwrap(), 2.5);
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_non_finite_values_ignored() {
        assert_eq!(mean(&[f64::NAN, 2.0, 4.0]), Some(3.0));
        assert_relative_eq!(mean(&[0.1, 0.2, 0.3]).unwrap(), 0.2, epsilon = 1e-12);
        assert_eq!(mean(&[f64::NAN]), None);
        assert_eq!(median(&[f64::INFINITY, 5.0]), Some(5.0));
    }

    #[test]
    fn test_sample_std_dev() {
        let sd = sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_relative_eq!(sd, 2.138_089_935, epsilon = 1e-6);
        assert_eq!(sample_std_dev(&[1.0]), None);
    }

    #[test]
    fn test_is_near_constant() {
        assert!(is_near_constant(&[5.0; 10], 1e-6));
        assert!(is_near_constant(&[5.0], 1e-6));
        assert!(!is_near_constant(&[5.0, 6.0], 1e-6));
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip(50.0, 0.2, 10.0), 10.0);
        assert_eq!(clip(0.01, 0.2, 10.0), 0.2);
        assert_eq!(clip(f64::NAN, 0.2, 10.0), 0.2);
        assert_eq!(clip(f64::INFINITY, 0.2, 10.0), 10.0);
    }
}
