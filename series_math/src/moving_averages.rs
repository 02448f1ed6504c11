//! Lag and moving-average transforms over possibly-incomplete series
//!
//! Series are passed as `&[Option<f64>]` where `None` marks a period whose
//! value is unknown. Two window flavours are provided:
//! - trailing windows that end at the previous period (`trailing_mean`)
//! - inclusive windows that end at the current period (`rolling_mean`)

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Streaming mean over the last `period` positions of a series.
///
/// Missing positions still occupy a slot in the window but do not count
/// towards the mean, so the value is defined as soon as one known value is
/// inside the window (minimum periods of 1).
#[derive(Debug, Clone)]
pub struct TrailingMean {
    period: usize,
    window: VecDeque<Option<f64>>,
}

impl TrailingMean {
    /// Create a new trailing mean with the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            window: VecDeque::with_capacity(period + 1),
        })
    }

    /// Push the next position of the series
    pub fn update(&mut self, value: Option<f64>) {
        self.window.push_back(value.filter(|v| v.is_finite()));

        if self.window.len() > self.period {
            self.window.pop_front();
        }
    }

    /// Mean of the known values currently inside the window
    pub fn value(&self) -> Option<f64> {
        let (sum, count) = self
            .window
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));

        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// Get the current period
    pub fn period(&self) -> usize {
        self.period
    }

    /// Reset the window, clearing all values
    pub fn reset(&mut self) {
        self.window.clear();
    }
}

/// Value `k` positions earlier, `None` for the first `k` positions.
pub fn lag(values: &[Option<f64>], k: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|t| if t >= k { values[t - k] } else { None })
        .collect()
}

/// Mean over the `window` positions strictly before each position.
///
/// Position `t` only ever sees `values[t - window..t]`, never `values[t]`.
pub fn trailing_mean(values: &[Option<f64>], window: usize) -> Result<Vec<Option<f64>>> {
    let mut ma = TrailingMean::new(window)?;
    let mut out = Vec::with_capacity(values.len());

    for value in values {
        out.push(ma.value());
        ma.update(*value);
    }

    Ok(out)
}

/// Mean over the `window` positions ending at (and including) each position.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Result<Vec<Option<f64>>> {
    let mut ma = TrailingMean::new(window)?;
    let mut out = Vec::with_capacity(values.len());

    for value in values {
        ma.update(*value);
        out.push(ma.value());
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_trailing_mean_excludes_current_position() {
        let series = known(&[2.0, 4.0, 6.0, 8.0]);
        let ma = trailing_mean(&series, 2).unwrap();

        assert_eq!(ma, vec![None, Some(2.0), Some(3.0), Some(5.0)]);
    }

    #[test]
    fn test_rolling_mean_includes_current_position() {
        let series = known(&[2.0, 4.0, 6.0, 8.0]);
        let ma = rolling_mean(&series, 2).unwrap();

        assert_eq!(ma, vec![Some(2.0), Some(3.0), Some(5.0), Some(7.0)]);
    }

    #[test]
    fn test_missing_values_do_not_count() {
        let series = vec![Some(10.0), None, Some(20.0), None, None, None];
        let ma = trailing_mean(&series, 3).unwrap();

        assert_eq!(ma[1], Some(10.0));
        assert_eq!(ma[3], Some(15.0));
        // window [None, None, Some(20)] ending at position 4
        assert_eq!(ma[5], Some(20.0));
    }

    #[test]
    fn test_lag() {
        let series = known(&[1.0, 2.0, 3.0]);
        assert_eq!(lag(&series, 1), vec![None, Some(1.0), Some(2.0)]);
        assert_eq!(lag(&series, 5), vec![None, None, None]);
        assert_eq!(lag(&series, 0), series);
    }

    #[test]
    fn test_zero_period_rejected() {
        assert!(TrailingMean::new(0).is_err());
        assert!(trailing_mean(&[Some(1.0)], 0).is_err());
    }

    #[test]
    fn test_reset() {
        let mut ma = TrailingMean::new(3).unwrap();
        ma.update(Some(4.0));
        assert_eq!(ma.value(), Some(4.0));

        ma.reset();
        assert_eq!(ma.value(), None);
        assert_eq!(ma.period(), 3);
    }
}
