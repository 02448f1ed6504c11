//! Weighted blend of model and baseline forecasts

use crate::error::{ForecastError, Result};
use crate::models::Forecasts;
use crate::region::SeriesKey;
use crate::utils::add_months;
use crate::validation::OofRecord;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Combines model and seasonal-naive forecasts
#[derive(Debug, Clone, Copy)]
pub struct EnsembleCombiner {
    model_weight: f64,
    baseline_weight: f64,
}

impl Default for EnsembleCombiner {
    fn default() -> Self {
        Self {
            model_weight: 0.7,
            baseline_weight: 0.3,
        }
    }
}

impl EnsembleCombiner {
    /// Create a new combiner
    pub fn new(model_weight: f64, baseline_weight: f64) -> Result<Self> {
        if !(model_weight >= 0.0 && baseline_weight >= 0.0)
            || !(model_weight + baseline_weight).is_finite()
        {
            return Err(ForecastError::InvalidParameter(format!(
                "Ensemble weights must be non-negative, got {} and {}",
                model_weight, baseline_weight
            )));
        }

        Ok(Self {
            model_weight,
            baseline_weight,
        })
    }

    fn blend(&self, model: f64, baseline: f64) -> f64 {
        self.model_weight * model + self.baseline_weight * baseline
    }

    /// Blend on the keys both sources share; a source is used alone only when
    /// the other produced nothing
    pub fn combine(&self, model: &Forecasts, baseline: &Forecasts) -> Forecasts {
        if model.is_empty() {
            return baseline.clone();
        }
        if baseline.is_empty() {
            return model.clone();
        }

        let combined: Forecasts = model
            .iter()
            .filter_map(|(key, m)| baseline.get(key).map(|b| (*key, self.blend(*m, *b))))
            .collect();
        debug!(
            model = model.len(),
            baseline = baseline.len(),
            combined = combined.len(),
            "ensemble combined"
        );
        combined
    }

    /// Blend out-of-fold model predictions with the value one year earlier,
    /// keeping the model prediction where that value is unknown
    pub fn blend_oof(
        &self,
        oof: &[OofRecord],
        history: &BTreeMap<(SeriesKey, NaiveDate), f64>,
    ) -> Vec<OofRecord> {
        oof.iter()
            .map(|record| {
                let last_year = history
                    .get(&(record.key(), add_months(record.date, -12)))
                    .copied()
                    .unwrap_or(record.predicted);
                OofRecord {
                    predicted: self.blend(record.predicted, last_year),
                    ..record.clone()
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{AgeBand, Region};
    use approx::assert_relative_eq;

    fn date(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, 1).unwrap()
    }

    #[test]
    fn test_intersection_only() {
        let a = SeriesKey::new(Region::IDF, AgeBand::Adult);
        let b = SeriesKey::new(Region::ARA, AgeBand::Adult);
        let model: Forecasts = [((a, date(1)), 10.0)].into_iter().collect();
        let baseline: Forecasts = [((a, date(1)), 20.0), ((b, date(1)), 5.0)].into_iter().collect();

        let combined = EnsembleCombiner::default().combine(&model, &baseline);

        assert_eq!(combined.len(), 1);
        assert_relative_eq!(combined[&(a, date(1))], 13.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_source_fallback() {
        let a = SeriesKey::new(Region::IDF, AgeBand::Adult);
        let baseline: Forecasts = [((a, date(2)), 7.0)].into_iter().collect();

        let combined = EnsembleCombiner::default().combine(&Forecasts::new(), &baseline);
        assert_eq!(combined, baseline);
    }

    #[test]
    fn test_oof_blend_uses_last_year() {
        let key = SeriesKey::new(Region::BRE, AgeBand::Young);
        let history: BTreeMap<(SeriesKey, NaiveDate), f64> =
            [((key, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()), 100.0)]
                .into_iter()
                .collect();
        let record = |m| OofRecord {
            date: date(m),
            region: Region::BRE,
            age_band: AgeBand::Young,
            actual: 50.0,
            predicted: 40.0,
        };

        let blended = EnsembleCombiner::default().blend_oof(&[record(3), record(4)], &history);

        assert_relative_eq!(blended[0].predicted, 58.0, epsilon = 1e-12);
        assert_relative_eq!(blended[1].predicted, 40.0, epsilon = 1e-12);
    }

    #[test]
    fn test_negative_weight_rejected() {
        assert!(EnsembleCombiner::new(-0.1, 1.1).is_err());
    }
}
