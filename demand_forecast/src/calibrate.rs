//! Year-over-year scale calibration
//!
//! Each forecast is compared with the realized value of the same series one
//! year earlier. Valid ratios (realized / forecast, forecast > 0, both finite,
//! ratio > 0) are reduced to a median per age band, falling back to the global
//! median and then to 1.0. The multiplier is clipped to the configured bounds
//! and applied to every forecast of the age band. Nothing is persisted between
//! calls.

use crate::config::CalibrationBounds;
use crate::error::{ForecastError, Result};
use crate::models::Forecasts;
use crate::region::{AgeBand, SeriesKey};
use crate::utils::add_months;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use series_math::stats::{clip, median};
use std::collections::BTreeMap;
use tracing::info;

/// Where a multiplier came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplierSource {
    /// Median of the age band's own ratios
    AgeBand,
    /// Median over every age band
    Global,
    /// No valid ratio anywhere
    Default,
}

/// Multiplier applied to one age band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandMultiplier {
    /// Multiplier after clipping
    pub multiplier: f64,
    /// Median before clipping
    pub unclipped: f64,
    /// Number of valid ratios of the band
    pub ratios: usize,
    pub source: MultiplierSource,
}

/// Multipliers chosen by one calibration call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub multipliers: BTreeMap<AgeBand, BandMultiplier>,
    pub global_median: Option<f64>,
}

/// Stateless year-over-year calibrator
#[derive(Debug, Clone, Copy)]
pub struct ScaleCalibrator {
    bounds: CalibrationBounds,
}

impl Default for ScaleCalibrator {
    fn default() -> Self {
        Self {
            bounds: CalibrationBounds::default(),
        }
    }
}

impl ScaleCalibrator {
    /// Create a new calibrator
    pub fn new(bounds: CalibrationBounds) -> Result<Self> {
        if !(bounds.lower > 0.0 && bounds.lower <= bounds.upper && bounds.upper.is_finite()) {
            return Err(ForecastError::InvalidParameter(format!(
                "Calibration bounds must satisfy 0 < lower <= upper, got [{}, {}]",
                bounds.lower, bounds.upper
            )));
        }
        Ok(Self { bounds })
    }

    /// Multiplier of each age band present in the forecasts
    pub fn multipliers(
        &self,
        forecasts: &Forecasts,
        history: &BTreeMap<(SeriesKey, NaiveDate), f64>,
    ) -> CalibrationReport {
        let mut ratios: BTreeMap<AgeBand, Vec<f64>> = BTreeMap::new();
        for ((key, date), forecast) in forecasts {
            let band = ratios.entry(key.age_band).or_default();
            let Some(realized) = history.get(&(*key, add_months(*date, -12))) else {
                continue;
            };
            if !(forecast.is_finite() && realized.is_finite() && *forecast > 0.0) {
                continue;
            }
            let ratio = realized / forecast;
            if ratio.is_finite() && ratio > 0.0 {
                band.push(ratio);
            }
        }

        let all: Vec<f64> = ratios.values().flatten().copied().collect();
        let global_median = median(&all).filter(|m| m.is_finite() && *m > 0.0);

        let multipliers = ratios
            .into_iter()
            .map(|(band, values)| {
                let (unclipped, source) = match (median(&values), global_median) {
                    (Some(m), _) => (m, MultiplierSource::AgeBand),
                    (None, Some(g)) => (g, MultiplierSource::Global),
                    (None, None) => (1.0, MultiplierSource::Default),
                };
                let multiplier = BandMultiplier {
                    multiplier: clip(unclipped, self.bounds.lower, self.bounds.upper),
                    unclipped,
                    ratios: values.len(),
                    source,
                };
                (band, multiplier)
            })
            .collect();

        CalibrationReport {
            multipliers,
            global_median,
        }
    }

    /// Apply the age-band multipliers to every forecast
    pub fn calibrate(
        &self,
        forecasts: &Forecasts,
        history: &BTreeMap<(SeriesKey, NaiveDate), f64>,
    ) -> (Forecasts, CalibrationReport) {
        let report = self.multipliers(forecasts, history);
        let calibrated = forecasts
            .iter()
            .map(|((key, date), value)| {
                let factor = report
                    .multipliers
                    .get(&key.age_band)
                    .map_or(1.0, |m| m.multiplier);
                ((*key, *date), value * factor)
            })
            .collect();

        for (band, m) in &report.multipliers {
            info!(
                age_band = %band,
                multiplier = m.multiplier,
                source = ?m.source,
                ratios = m.ratios,
                "calibration multiplier"
            );
        }
        (calibrated, report)
    }
}
