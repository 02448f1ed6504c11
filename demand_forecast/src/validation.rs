//! Rolling-origin validation and final forecasting
//!
//! Each series is walked forward independently: a split at `s` fits on the
//! first `s` history months and predicts the next `horizon` months, so every
//! out-of-fold prediction only ever saw strictly earlier data. The model is
//! then refitted on the full history to forecast the future months.
//!
//! Series with a flat target or a history shorter than `min_train + horizon`
//! are skipped and reported, never force-fitted.

use crate::config::ForecastConfig;
use crate::error::{ForecastError, Result};
use crate::features::{FeatureRow, FeatureTable};
use crate::metrics::{series_accuracy, SeriesMetrics};
use crate::models::{DemandModel, FittedDemandModel, Forecasts};
use crate::region::{AgeBand, Region, SeriesKey};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use series_math::stats::sample_std_dev;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One out-of-fold (actual, predicted) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OofRecord {
    pub date: NaiveDate,
    pub region: Region,
    pub age_band: AgeBand,
    pub actual: f64,
    pub predicted: f64,
}

impl OofRecord {
    /// Series the record belongs to
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(self.region, self.age_band)
    }
}

/// Why a series was left out
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Target standard deviation below the floor
    FlatTarget { std_dev: f64 },
    /// Not enough history months
    TooShort { needed: usize, got: usize },
}

/// A series left out of fitting and outputs
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSeries {
    pub key: SeriesKey,
    pub reason: SkipReason,
}

impl SkippedSeries {
    /// The skip as an error value, for logging
    pub fn to_error(&self, needed: usize) -> ForecastError {
        let got = match self.reason {
            SkipReason::TooShort { got, .. } => got,
            SkipReason::FlatTarget { .. } => 0,
        };
        ForecastError::InsufficientSeriesHistory {
            key: self.key.to_string(),
            needed,
            got,
        }
    }
}

/// Everything the forecaster produced
#[derive(Debug, Clone)]
pub struct ForecasterOutput<F> {
    /// Out-of-fold pairs of every fitted series
    pub oof: Vec<OofRecord>,
    /// Model forecasts for the future months
    pub future: Forecasts,
    /// Final fitted model of each series
    pub models: BTreeMap<SeriesKey, F>,
    /// Out-of-fold accuracy of each series
    pub metrics: Vec<SeriesMetrics>,
    pub skipped: Vec<SkippedSeries>,
}

enum SeriesOutcome<F> {
    Fitted {
        key: SeriesKey,
        oof: Vec<OofRecord>,
        future: Vec<(NaiveDate, f64)>,
        model: F,
    },
    Skipped(SkippedSeries),
}

/// Walk-forward forecaster over every series of a feature table
#[derive(Debug, Clone)]
pub struct RollingOriginForecaster<M: DemandModel> {
    model: M,
    min_train: usize,
    horizon: usize,
    min_target_std: f64,
    smape_epsilon: f64,
}

impl<M: DemandModel> RollingOriginForecaster<M> {
    /// Create a new forecaster
    pub fn new(model: M, min_train: usize, horizon: usize) -> Result<Self> {
        if min_train == 0 {
            return Err(ForecastError::InvalidParameter(
                "Minimum training length must be positive".to_string(),
            ));
        }
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Validation horizon must be positive".to_string(),
            ));
        }

        Ok(Self {
            model,
            min_train,
            horizon,
            min_target_std: 1e-6,
            smape_epsilon: series_math::DEFAULT_SMAPE_EPSILON,
        })
    }

    /// Create a forecaster from the forecast settings
    pub fn from_config(model: M, config: &ForecastConfig) -> Result<Self> {
        Ok(Self::new(model, config.min_train, config.validation_horizon)?
            .with_min_target_std(config.min_target_std)
            .with_smape_epsilon(config.smape_epsilon))
    }

    /// Set the variance floor below which a series is skipped
    pub fn with_min_target_std(mut self, min_target_std: f64) -> Self {
        self.min_target_std = min_target_std;
        self
    }

    /// Set the SMAPE denominator floor
    pub fn with_smape_epsilon(mut self, epsilon: f64) -> Self {
        self.smape_epsilon = epsilon;
        self
    }

    /// History length a series needs to be fitted
    pub fn required_history(&self) -> usize {
        self.min_train + self.horizon
    }

    /// Validate and forecast every series
    pub fn run(&self, table: &FeatureTable) -> Result<ForecasterOutput<M::Fitted>> {
        let forecast_start = table.forecast_start();
        let outcomes: Vec<SeriesOutcome<M::Fitted>> = table
            .series()
            .into_par_iter()
            .map(|(key, rows)| self.run_series(key, rows, forecast_start))
            .collect::<Result<Vec<_>>>()?;

        let mut output = ForecasterOutput {
            oof: Vec::new(),
            future: Forecasts::new(),
            models: BTreeMap::new(),
            metrics: Vec::new(),
            skipped: Vec::new(),
        };

        for outcome in outcomes {
            match outcome {
                SeriesOutcome::Fitted {
                    key,
                    oof,
                    future,
                    model,
                } => {
                    output.oof.extend(oof);
                    for (date, value) in future {
                        output.future.insert((key, date), value);
                    }
                    output.models.insert(key, model);
                }
                SeriesOutcome::Skipped(skipped) => {
                    debug!(
                        error = %skipped.to_error(self.required_history()),
                        reason = ?skipped.reason,
                        "series skipped"
                    );
                    output.skipped.push(skipped);
                }
            }
        }

        output.metrics = series_accuracy(&output.oof, self.smape_epsilon)?;
        info!(
            model = self.model.name(),
            fitted = output.models.len(),
            skipped = output.skipped.len(),
            oof_pairs = output.oof.len(),
            "rolling-origin validation complete"
        );
        Ok(output)
    }

    fn run_series(
        &self,
        key: SeriesKey,
        rows: &[FeatureRow],
        forecast_start: NaiveDate,
    ) -> Result<SeriesOutcome<M::Fitted>> {
        let history: Vec<&FeatureRow> = rows
            .iter()
            .filter(|r| r.date < forecast_start && r.target.is_some())
            .collect();
        let targets: Vec<f64> = history.iter().filter_map(|r| r.target).collect();

        let std_dev = sample_std_dev(&targets).unwrap_or(0.0);
        if std_dev < self.min_target_std {
            return Ok(SeriesOutcome::Skipped(SkippedSeries {
                key,
                reason: SkipReason::FlatTarget { std_dev },
            }));
        }
        if history.len() < self.required_history() {
            return Ok(SeriesOutcome::Skipped(SkippedSeries {
                key,
                reason: SkipReason::TooShort {
                    needed: self.required_history(),
                    got: history.len(),
                },
            }));
        }

        let design: Vec<Vec<f64>> = history.iter().map(|r| r.features.clone()).collect();

        let mut oof = Vec::new();
        for split in self.min_train..=(history.len() - self.horizon) {
            let fitted = self.model.fit(&design[..split], &targets[..split])?;
            let test = split..split + self.horizon;
            let predicted = fitted.predict(&design[test.clone()])?;

            for (i, p) in test.zip(predicted) {
                oof.push(OofRecord {
                    date: history[i].date,
                    region: key.region,
                    age_band: key.age_band,
                    actual: targets[i],
                    predicted: p,
                });
            }
        }

        let model = self.model.fit(&design, &targets)?;
        let future_rows: Vec<&FeatureRow> =
            rows.iter().filter(|r| r.date >= forecast_start).collect();
        let future = if future_rows.is_empty() {
            Vec::new()
        } else {
            let x: Vec<Vec<f64>> = future_rows.iter().map(|r| r.features.clone()).collect();
            let predicted = model.predict(&x)?;
            future_rows.iter().map(|r| r.date).zip(predicted).collect()
        };

        Ok(SeriesOutcome::Fitted {
            key,
            oof,
            future,
            model,
        })
    }
}
