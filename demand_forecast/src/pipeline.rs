//! End-to-end forecasting run
//!
//! raw inputs -> panel -> (proxy) -> features -> {ridge, seasonal naive}
//! -> ensemble -> (reconciliation) -> calibration -> operational table

use crate::aggregate::{Panel, SeriesAggregator};
use crate::calibrate::{CalibrationReport, ScaleCalibrator};
use crate::config::ForecastConfig;
use crate::data::RawInputs;
use crate::ensemble::EnsembleCombiner;
use crate::error::Result;
use crate::features::{FeatureBuilder, FeatureTable};
use crate::metrics::{residual_sigma, series_accuracy, SeriesMetrics};
use crate::models::{FittedRidge, Forecasts, RidgeModel, SeasonalNaive};
use crate::proxy::ProxyGenerator;
use crate::reconcile::reconcile_forecasts;
use crate::region::SeriesKey;
use crate::report::{build_forecast_table, ForecastTableRow};
use crate::validation::{ForecasterOutput, OofRecord, RollingOriginForecaster};
use std::collections::BTreeMap;
use tracing::info;

/// Everything produced by one forecasting run
#[derive(Debug, Clone)]
pub struct ForecastRun {
    pub panel: Panel,
    pub features: FeatureTable,
    /// Series rewritten by proxy mode
    pub proxy_series: Vec<SeriesKey>,
    pub model: ForecasterOutput<FittedRidge>,
    pub baseline: Forecasts,
    pub ensemble: Forecasts,
    /// Out-of-fold pairs of the ensemble
    pub ensemble_oof: Vec<OofRecord>,
    /// Out-of-fold accuracy of the ensemble per series
    pub ensemble_metrics: Vec<SeriesMetrics>,
    /// Root mean squared out-of-fold error of the ensemble per series
    pub residual_sigma: BTreeMap<SeriesKey, f64>,
    /// Top-down reconciled forecasts, when enabled
    pub reconciled: Option<Forecasts>,
    pub calibrated: Forecasts,
    pub calibration: CalibrationReport,
    pub table: Vec<ForecastTableRow>,
}

/// Runs the forecasting chain with one configuration
#[derive(Debug, Clone)]
pub struct DemandForecaster {
    config: ForecastConfig,
}

impl DemandForecaster {
    /// Create a new forecaster
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Settings of the run
    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Forecast from raw inputs
    pub fn run(&self, inputs: &RawInputs) -> Result<ForecastRun> {
        let mut panel = SeriesAggregator::new(self.config.clone())?.aggregate(inputs)?;
        let proxy_series = ProxyGenerator::new(self.config.proxy.clone())?.apply(&mut panel)?;
        self.run_panel(panel, proxy_series)
    }

    /// Forecast from an already aggregated panel
    pub fn run_panel(&self, panel: Panel, proxy_series: Vec<SeriesKey>) -> Result<ForecastRun> {
        let features = FeatureBuilder::default().build(&panel)?;
        let history = panel.history();

        let forecaster = RollingOriginForecaster::from_config(
            RidgeModel::new(self.config.ridge_lambda)?,
            &self.config,
        )?;
        let model = forecaster.run(&features)?;
        let baseline = SeasonalNaive::default().forecast(&features);

        let combiner = EnsembleCombiner::new(self.config.model_weight, self.config.baseline_weight)?;
        let ensemble = combiner.combine(&model.future, &baseline);
        let ensemble_oof = combiner.blend_oof(&model.oof, &history);
        let ensemble_metrics = series_accuracy(&ensemble_oof, self.config.smape_epsilon)?;
        let residual_sigma = residual_sigma(&ensemble_oof)?;

        let reconciled = if self.config.reconcile {
            Some(reconcile_forecasts(&ensemble, &history)?)
        } else {
            None
        };

        let calibrator = ScaleCalibrator::new(self.config.calibration)?;
        let (calibrated, calibration) =
            calibrator.calibrate(reconciled.as_ref().unwrap_or(&ensemble), &history);
        let policy = self.config.order_costs.newsvendor()?;
        let table = build_forecast_table(&calibrated, &history, &residual_sigma, &policy);

        info!(
            forecast_rows = table.len(),
            fitted_series = model.models.len(),
            proxy_series = proxy_series.len(),
            "forecasting run complete"
        );

        Ok(ForecastRun {
            panel,
            features,
            proxy_series,
            model,
            baseline,
            ensemble,
            ensemble_oof,
            ensemble_metrics,
            residual_sigma,
            reconciled,
            calibrated,
            calibration,
            table,
        })
    }
}
