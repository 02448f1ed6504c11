//! Batch stages behind the `forecast`, `allocate` and `run` commands

use crate::config::PlanConfig;
use crate::error::Result;
use chrono::NaiveDate;
use demand_forecast::calibrate::CalibrationReport;
use demand_forecast::data::PopulationRecord;
use demand_forecast::metrics::{residual_sigma, summarize, AccuracySummary};
use demand_forecast::pipeline::{DemandForecaster, ForecastRun};
use demand_forecast::report::{read_csv, write_csv};
use demand_forecast::validation::OofRecord;
use demand_forecast::{ForecastTableRow, SeriesKey};
use pharmacy_plan::replenish::regional_sigma;
use pharmacy_plan::{
    allocation, AllocationRow, Allocator, PharmacyTable, Replenisher, ReplenishmentRow, StockSimulator,
    StockSnapshot,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Output file locations under the output directory
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFiles {
    pub forecast: PathBuf,
    pub allocation: PathBuf,
    pub stock: PathBuf,
    pub replenishment: PathBuf,
    pub metrics: PathBuf,
    pub oof: PathBuf,
    pub summary: PathBuf,
}

impl OutputFiles {
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            forecast: dir.join("forecast.csv"),
            allocation: dir.join("allocation.csv"),
            stock: dir.join("stock.csv"),
            replenishment: dir.join("replenishment.csv"),
            metrics: dir.join("metrics_by_series.csv"),
            oof: dir.join("oof.csv"),
            summary: dir.join("run_summary.json"),
        }
    }
}

/// Counts and accuracy of a full run, written as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub forecast_start: NaiveDate,
    pub fitted_series: usize,
    pub skipped_series: usize,
    pub proxy_series: usize,
    pub forecast_rows: usize,
    /// Out-of-fold accuracy of the ridge model
    pub model_accuracy: AccuracySummary,
    /// Out-of-fold accuracy of the model/baseline blend
    pub ensemble_accuracy: AccuracySummary,
    pub calibration: CalibrationReport,
    pub allocation_rows: usize,
    pub stock_rows: usize,
    pub replenishment_rows: usize,
}

/// Result of the allocation stage
#[derive(Debug, Clone)]
pub struct AllocationPlan {
    pub allocations: Vec<AllocationRow>,
    pub stock: Vec<StockSnapshot>,
    pub replenishment: Vec<ReplenishmentRow>,
}

/// Load the inputs, forecast, and write the forecast, metrics and oof tables
pub fn forecast(config: &PlanConfig) -> Result<ForecastRun> {
    let inputs = config.inputs.load()?;
    let run = DemandForecaster::new(config.forecast.clone())?.run(&inputs)?;

    let files = OutputFiles::in_dir(&config.output_dir);
    write_csv(&files.forecast, &run.table)?;
    write_csv(&files.metrics, &run.ensemble_metrics)?;
    write_csv(&files.oof, &run.ensemble_oof)?;

    info!(
        rows = run.table.len(),
        output = %files.forecast.display(),
        "forecast written"
    );
    Ok(run)
}

/// Allocate forecast rows to pharmacies, simulate stock and plan regional
/// replenishment.
///
/// `sigma` is the out-of-fold error spread per series, per 100k.
pub fn allocate(
    config: &PlanConfig,
    forecast: &[ForecastTableRow],
    populations: &BTreeMap<SeriesKey, f64>,
    sigma: &BTreeMap<SeriesKey, f64>,
) -> Result<AllocationPlan> {
    let pharmacies = PharmacyTable::from_csv(&config.pharmacies)?;
    let default_population = config.forecast.default_population;
    let totals = allocation::regional_totals(forecast, populations, default_population);

    let allocations = Allocator::new().allocate(&totals, &pharmacies);
    let stock = StockSimulator::new(config.allocation)?.simulate(&pharmacies, &allocations);

    let spread = regional_sigma(forecast, sigma, populations, default_population);
    let replenisher = Replenisher::new(
        config.forecast.order_costs.newsvendor()?,
        config.replenishment.clone(),
    )?;
    let replenishment = replenisher.plan(&totals, &spread);

    let files = OutputFiles::in_dir(&config.output_dir);
    write_csv(&files.allocation, &allocations)?;
    write_csv(&files.stock, &stock)?;
    write_csv(&files.replenishment, &replenishment)?;

    info!(
        pharmacies = pharmacies.len(),
        allocation_rows = allocations.len(),
        stock_rows = stock.len(),
        replenishment_rows = replenishment.len(),
        "allocation written"
    );
    Ok(AllocationPlan {
        allocations,
        stock,
        replenishment,
    })
}

/// Allocate from a forecast table written by an earlier run
pub fn allocate_from_files(config: &PlanConfig) -> Result<AllocationPlan> {
    let files = OutputFiles::in_dir(&config.output_dir);
    let forecast: Vec<ForecastTableRow> = read_csv(&files.forecast)?;

    let populations = match &config.inputs.population {
        Some(spec) => {
            let value = spec.schema.value_columns.first().map_or("population", |c| c.as_str());
            population_map(&spec.load()?.population(value)?)
        }
        None => BTreeMap::new(),
    };

    let sigma = if files.oof.exists() {
        let oof: Vec<OofRecord> = read_csv(&files.oof)?;
        residual_sigma(&oof)?
    } else {
        warn!(path = %files.oof.display(), "no out-of-fold table, demand treated as certain");
        BTreeMap::new()
    };
    allocate(config, &forecast, &populations, &sigma)
}

/// Total population per series
pub fn population_map(records: &[PopulationRecord]) -> BTreeMap<SeriesKey, f64> {
    let mut map = BTreeMap::new();
    for record in records {
        *map.entry(SeriesKey::new(record.region, record.age_band))
            .or_insert(0.0) += record.population;
    }
    map
}

/// Forecast, allocate, and write the run summary
pub fn run(config: &PlanConfig) -> Result<RunSummary> {
    let forecast_run = forecast(config)?;
    let plan = allocate(
        config,
        &forecast_run.table,
        &forecast_run.panel.populations(),
        &forecast_run.residual_sigma,
    )?;

    let summary = RunSummary {
        forecast_start: forecast_run.panel.forecast_start(),
        fitted_series: forecast_run.model.models.len(),
        skipped_series: forecast_run.model.skipped.len(),
        proxy_series: forecast_run.proxy_series.len(),
        forecast_rows: forecast_run.table.len(),
        model_accuracy: summarize(&forecast_run.model.metrics),
        ensemble_accuracy: summarize(&forecast_run.ensemble_metrics),
        calibration: forecast_run.calibration,
        allocation_rows: plan.allocations.len(),
        stock_rows: plan.stock.len(),
        replenishment_rows: plan.replenishment.len(),
    };

    let files = OutputFiles::in_dir(&config.output_dir);
    std::fs::write(&files.summary, serde_json::to_string_pretty(&summary)?)?;
    info!(output = %files.summary.display(), "run summary written");
    Ok(summary)
}
