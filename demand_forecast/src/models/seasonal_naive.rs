//! Seasonal-naive baseline
//!
//! For every future month: the value one season earlier when it is known
//! history, otherwise the mean of the latest known values.

use crate::error::{ForecastError, Result};
use crate::features::{FeatureRow, FeatureTable};
use crate::models::Forecasts;
use series_math::stats::mean;

/// Seasonal-naive forecaster
#[derive(Debug, Clone)]
pub struct SeasonalNaive {
    /// Season length in months
    season: usize,
    /// Number of recent values averaged when the seasonal value is unknown
    fallback_window: usize,
}

impl Default for SeasonalNaive {
    fn default() -> Self {
        Self {
            season: 12,
            fallback_window: 3,
        }
    }
}

impl SeasonalNaive {
    /// Create a new baseline
    pub fn new(season: usize, fallback_window: usize) -> Result<Self> {
        if season == 0 || fallback_window == 0 {
            return Err(ForecastError::InvalidParameter(
                "Season and fallback window must be positive".to_string(),
            ));
        }

        Ok(Self {
            season,
            fallback_window,
        })
    }

    /// Forecast the future rows of one series
    pub fn forecast_series(&self, rows: &[FeatureRow], forecast_start: chrono::NaiveDate) -> Vec<f64> {
        let history: Vec<f64> = rows
            .iter()
            .filter(|r| r.date < forecast_start)
            .filter_map(|r| r.target)
            .collect();
        let recent = &history[history.len().saturating_sub(self.fallback_window)..];
        let fallback = mean(recent).unwrap_or(0.0);

        rows.iter()
            .enumerate()
            .filter(|(_, r)| r.date >= forecast_start)
            .map(|(t, _)| {
                t.checked_sub(self.season)
                    .and_then(|s| rows[s].target)
                    .unwrap_or(fallback)
            })
            .collect()
    }

    /// Forecast every future row of the table
    pub fn forecast(&self, table: &FeatureTable) -> Forecasts {
        let forecast_start = table.forecast_start();
        let mut out = Forecasts::new();

        for (key, rows) in table.series() {
            let values = self.forecast_series(rows, forecast_start);
            let dates = rows.iter().filter(|r| r.date >= forecast_start).map(|r| r.date);
            for (date, value) in dates.zip(values) {
                out.insert((key, date), value);
            }
        }
        out
    }
}
