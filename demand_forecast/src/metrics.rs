//! Accuracy metrics over out-of-fold records

use crate::error::Result;
use crate::region::{AgeBand, Region, SeriesKey};
use crate::validation::OofRecord;
use serde::{Deserialize, Serialize};
use series_math::{mean_absolute_error, root_mean_squared_error, smape};
use std::collections::BTreeMap;

/// Out-of-fold accuracy of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMetrics {
    pub region: Region,
    pub age_band: AgeBand,
    pub smape: f64,
    pub mae: f64,
}

/// Accuracy averaged over series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracySummary {
    pub series: usize,
    pub mean_smape: Option<f64>,
    pub mean_mae: Option<f64>,
}

/// SMAPE and MAE per series, in key order
pub fn series_accuracy(oof: &[OofRecord], epsilon: f64) -> Result<Vec<SeriesMetrics>> {
    let mut grouped: BTreeMap<SeriesKey, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for record in oof {
        let entry = grouped.entry(record.key()).or_default();
        entry.0.push(record.actual);
        entry.1.push(record.predicted);
    }

    grouped
        .into_iter()
        .map(|(key, (actual, predicted))| {
            Ok(SeriesMetrics {
                region: key.region,
                age_band: key.age_band,
                smape: smape(&actual, &predicted, epsilon)?,
                mae: mean_absolute_error(&actual, &predicted)?,
            })
        })
        .collect()
}

/// Root mean squared out-of-fold error per series, the demand spread used by
/// the newsvendor quantity
pub fn residual_sigma(oof: &[OofRecord]) -> Result<BTreeMap<SeriesKey, f64>> {
    let mut grouped: BTreeMap<SeriesKey, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for record in oof {
        let entry = grouped.entry(record.key()).or_default();
        entry.0.push(record.actual);
        entry.1.push(record.predicted);
    }

    grouped
        .into_iter()
        .map(|(key, (actual, predicted))| Ok((key, root_mean_squared_error(&actual, &predicted)?)))
        .collect()
}

/// Mean SMAPE and MAE over series
pub fn summarize(metrics: &[SeriesMetrics]) -> AccuracySummary {
    let smapes: Vec<f64> = metrics.iter().map(|m| m.smape).collect();
    let maes: Vec<f64> = metrics.iter().map(|m| m.mae).collect();

    AccuracySummary {
        series: metrics.len(),
        mean_smape: series_math::stats::mean(&smapes),
        mean_mae: series_math::stats::mean(&maes),
    }
}
