use chrono::{Datelike, NaiveDate};
use demand_forecast::data::InputSources;
use demand_forecast::report::read_csv;
use demand_forecast::{AgeBand, ForecastConfig, ForecastError, ForecastTableRow, Region};
use pharmacy_plan::{AllocationRow, ReplenishmentRow, StockSnapshot};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tempfile::{tempdir, TempDir};
use vaxplan::pipeline::{self, OutputFiles};
use vaxplan::{AppError, PlanConfig, RunSummary};

const MONTHS: usize = 30;

fn month(t: usize) -> NaiveDate {
    let year = 2022 + (t / 12) as i32;
    NaiveDate::from_ymd_opt(year, (t % 12) as u32 + 1, 1).unwrap()
}

fn write_inputs(dir: &Path) {
    let season = |t: usize| (2.0 * std::f64::consts::PI * (t % 12) as f64 / 12.0).cos();

    let mut doses = String::from("date,region,age_band,doses\n");
    let mut incidence = String::from("date,region,incidence_per_100k\n");
    let mut temperature = String::from("date,region,tmean\n");
    let mut emergency = String::from("date,region,age_band,er_visits,admissions\n");
    for t in 0..MONTHS {
        let d = month(t);
        let s = season(t);
        writeln!(doses, "{},IDF,18-64,{:.1}", d, 300.0 + 4.0 * t as f64 + 80.0 * s).unwrap();
        writeln!(doses, "{},BRE,65+,{:.1}", d, 120.0 + 2.0 * t as f64 + 40.0 * s).unwrap();
        for region in ["IDF", "BRE"] {
            writeln!(incidence, "{},{},{:.2}", d, region, 60.0 + 30.0 * s).unwrap();
            writeln!(temperature, "{},{},{:.1}", d, region, 12.0 - 7.0 * s).unwrap();
        }
        writeln!(emergency, "{},IDF,18-64,{},{}", d, 40 + t, 5 + t % 3).unwrap();
        writeln!(emergency, "{},BRE,65+,{},{}", d, 15 + t, 2 + d.month() % 2).unwrap();
    }

    let write = |name: &str, body: &str| std::fs::write(dir.join(name), body).unwrap();
    write("doses.csv", &doses);
    write("incidence.csv", &incidence);
    write("temperature.csv", &temperature);
    write("emergency.csv", &emergency);
    write(
        "population.csv",
        "region,age_band,population\nIDF,18-64,100000\nBRE,65+,200000\n",
    );
    write(
        "pharmacies.csv",
        "pharmacy_id,region,population,initial_stock\n\
         idf-1,IDF,6000,400\n\
         idf-2,IDF,3000,\n\
         idf-3,IDF,1000,50\n\
         bre-1,BRE,2500,300\n\
         ara-1,ARA,9000,300\n",
    );
}

fn setup() -> (TempDir, PlanConfig) {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    let config = PlanConfig {
        inputs: InputSources::in_dir(dir.path()),
        pharmacies: dir.path().join("pharmacies.csv"),
        output_dir: dir.path().join("out"),
        forecast: ForecastConfig {
            regions: vec![Region::IDF, Region::BRE],
            age_bands: vec![AgeBand::Adult, AgeBand::Senior],
            ..Default::default()
        },
        ..Default::default()
    };
    (dir, config)
}

#[test]
fn test_full_run_writes_every_output() {
    let (_dir, config) = setup();

    let summary = pipeline::run(&config).unwrap();

    assert_eq!(summary.forecast_start, month(MONTHS));
    assert_eq!(summary.fitted_series, 2);
    assert_eq!(summary.skipped_series, 2);
    assert_eq!(summary.forecast_rows, 2 * 6);
    // three IDF and one BRE pharmacy over six months
    assert_eq!(summary.allocation_rows, 4 * 6);
    // every pharmacy gets an opening snapshot, ARA included
    assert_eq!(summary.stock_rows, 5 + 4 * 6);
    // two regions over six months
    assert_eq!(summary.replenishment_rows, 2 * 6);

    let files = OutputFiles::in_dir(&config.output_dir);
    for path in [
        &files.forecast,
        &files.allocation,
        &files.stock,
        &files.replenishment,
        &files.metrics,
        &files.oof,
    ] {
        assert!(path.exists(), "{} missing", path.display());
    }
    let json = std::fs::read_to_string(&files.summary).unwrap();
    let back: RunSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(back, summary);
}

#[test]
fn test_allocations_match_regional_totals() {
    let (_dir, config) = setup();
    pipeline::run(&config).unwrap();
    let files = OutputFiles::in_dir(&config.output_dir);

    let forecast: Vec<ForecastTableRow> = read_csv(&files.forecast).unwrap();
    let allocations: Vec<AllocationRow> = read_csv(&files.allocation).unwrap();
    let stock: Vec<StockSnapshot> = read_csv(&files.stock).unwrap();

    let population = |region| if region == Region::IDF { 100_000.0 } else { 200_000.0 };
    let mut expected: BTreeMap<(NaiveDate, Region), f64> = BTreeMap::new();
    for row in &forecast {
        *expected.entry((row.date, row.region)).or_insert(0.0) +=
            row.forecast * population(row.region) / 100_000.0;
    }
    let mut allocated: BTreeMap<(NaiveDate, Region), u64> = BTreeMap::new();
    for row in &allocations {
        *allocated.entry((row.date, row.region)).or_insert(0) += row.consumption;
    }

    assert_eq!(allocated.len(), expected.len());
    for (key, total) in &expected {
        assert_eq!(allocated[key], total.max(0.0).round() as u64);
    }
    assert!(stock
        .iter()
        .all(|s| s.closing_stock == s.opening_stock.saturating_sub(s.consumption)));
    // idf-3 declared 50, below the minimum of 100
    let opening = stock.iter().find(|s| s.pharmacy_id == "idf-3").unwrap();
    assert_eq!(opening.opening_stock, 100);
}

#[test]
fn test_allocate_reuses_written_forecast() {
    let (_dir, config) = setup();
    pipeline::run(&config).unwrap();
    let files = OutputFiles::in_dir(&config.output_dir);
    let first: Vec<AllocationRow> = read_csv(&files.allocation).unwrap();

    let replenishment: Vec<ReplenishmentRow> = read_csv(&files.replenishment).unwrap();

    let plan = pipeline::allocate_from_files(&config).unwrap();

    assert_eq!(plan.allocations, first);
    assert_eq!(plan.replenishment, replenishment);
}

#[test]
fn test_replenishment_covers_demand_within_bounds() {
    let (_dir, config) = setup();
    pipeline::run(&config).unwrap();
    let files = OutputFiles::in_dir(&config.output_dir);

    let forecast: Vec<ForecastTableRow> = read_csv(&files.forecast).unwrap();
    let rows: Vec<ReplenishmentRow> = read_csv(&files.replenishment).unwrap();

    // every fitted series carries a newsvendor quantity next to qty
    assert!(forecast.iter().all(|r| r.newsvendor_qty.is_some()));
    for row in &rows {
        // critical ratio 5/6 orders at least the mean, never above 1.2x
        assert!(row.sigma >= 0.0);
        assert!(row.target >= row.demand - 1e-9);
        assert!(row.target <= 1.2 * row.demand + 1e-9);
    }
    let mut by_month: BTreeMap<NaiveDate, (f64, u64)> = BTreeMap::new();
    for row in &rows {
        let entry = by_month.entry(row.date).or_insert((0.0, 0));
        entry.0 += row.target;
        entry.1 += row.order;
    }
    for (target, order) in by_month.values() {
        assert_eq!(*order, target.round() as u64);
    }
}

#[test]
fn test_monthly_capacity_caps_replenishment() {
    let (_dir, config) = setup();
    let mut config = config;
    config.replenishment.monthly_capacity = Some(100.0);

    pipeline::run(&config).unwrap();
    let rows: Vec<ReplenishmentRow> =
        read_csv(OutputFiles::in_dir(&config.output_dir).replenishment).unwrap();

    let mut by_month: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for row in &rows {
        *by_month.entry(row.date).or_insert(0) += row.order;
    }
    assert_eq!(by_month.len(), 6);
    assert!(by_month.values().all(|total| *total == 100));
    assert!(rows.iter().all(|r| r.capped));
}

#[test]
fn test_allocate_without_forecast_fails() {
    let (dir, config) = setup();
    let config = PlanConfig {
        output_dir: dir.path().join("empty"),
        ..config
    };

    let err = pipeline::allocate_from_files(&config).unwrap_err();

    assert!(matches!(
        err,
        AppError::Forecast(ForecastError::FileNotFound(_))
    ));
}

#[test]
fn test_config_file_round_trip() {
    let (dir, _) = setup();
    let path = dir.path().join("vaxplan.toml");
    std::fs::write(
        &path,
        "output_dir = \"reports\"\n\n[forecast]\nhorizon_months = 4\n",
    )
    .unwrap();

    let config = PlanConfig::from_file(&path).unwrap();
    assert_eq!(config.forecast.horizon_months, 4);
    assert_eq!(config.output_dir, Path::new("reports"));

    let missing = PlanConfig::from_file(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(missing, AppError::ConfigNotFound(_)));
}
