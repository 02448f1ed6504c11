//! Operational forecast table and CSV output
//!
//! Each calibrated forecast is reported next to the mean of up to 12
//! historical months before its date, the ratio between the two, a
//! recommended order quantity (10% buffer, rounded up to the next hundred,
//! at least one hundred) and the newsvendor quantity for the series'
//! out-of-fold error spread.

use crate::error::{ForecastError, Result};
use crate::models::Forecasts;
use crate::region::{AgeBand, Region, SeriesKey};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use series_math::stats::mean;
use series_math::Newsvendor;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Months averaged into the historical reference
pub const HISTORY_WINDOW: usize = 12;
/// Safety buffer on order quantities
pub const ORDER_BUFFER: f64 = 1.10;
/// Order quantities are multiples of this
pub const ORDER_LOT: f64 = 100.0;

/// One row of the operational forecast table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastTableRow {
    pub date: NaiveDate,
    pub region: Region,
    pub age_band: AgeBand,
    /// Calibrated doses per 100k
    pub forecast: f64,
    /// Mean of up to 12 historical months before the date
    pub mean_hist: Option<f64>,
    /// 100 * forecast / mean_hist, infinite when the mean is zero
    pub forecast_vs_hist_pct: Option<f64>,
    /// Recommended order quantity
    pub qty: u64,
    /// Newsvendor quantity, rounded up; unset without out-of-fold errors or
    /// when the quantity is unbounded
    pub newsvendor_qty: Option<u64>,
}

impl ForecastTableRow {
    /// Series the row belongs to
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(self.region, self.age_band)
    }
}

/// Recommended order: `max(ceil(forecast * 1.10 / 100) * 100, 100)`
pub fn order_quantity(forecast: f64) -> u64 {
    let lots = (forecast * ORDER_BUFFER / ORDER_LOT).ceil();
    if lots.is_finite() && lots >= 1.0 {
        (lots * ORDER_LOT) as u64
    } else {
        ORDER_LOT as u64
    }
}

/// Percentage of the historical mean, `None` without history
pub fn ratio_to_history(forecast: f64, mean_hist: Option<f64>) -> Option<f64> {
    mean_hist.map(|m| {
        if m == 0.0 {
            f64::INFINITY
        } else {
            100.0 * forecast / m
        }
    })
}

/// `policy.quantity(forecast, sigma)` rounded up, `None` when unbounded
pub fn newsvendor_quantity(policy: &Newsvendor, forecast: f64, sigma: f64) -> Option<u64> {
    let q = policy.quantity(forecast, sigma);
    if q.is_finite() {
        Some(q.ceil() as u64)
    } else {
        None
    }
}

/// Mean of the last `HISTORY_WINDOW` known values strictly before `date`
pub fn trailing_history_mean(
    history: &BTreeMap<(SeriesKey, NaiveDate), f64>,
    key: SeriesKey,
    date: NaiveDate,
) -> Option<f64> {
    let values: Vec<f64> = history
        .range((key, NaiveDate::MIN)..(key, date))
        .rev()
        .take(HISTORY_WINDOW)
        .map(|(_, v)| *v)
        .collect();
    mean(&values)
}

/// Build the operational table, sorted by (date, region, age band).
///
/// `sigma` holds the out-of-fold error spread of each series.
pub fn build_forecast_table(
    forecasts: &Forecasts,
    history: &BTreeMap<(SeriesKey, NaiveDate), f64>,
    sigma: &BTreeMap<SeriesKey, f64>,
    policy: &Newsvendor,
) -> Vec<ForecastTableRow> {
    let mut rows: Vec<ForecastTableRow> = forecasts
        .iter()
        .map(|((key, date), forecast)| {
            let mean_hist = trailing_history_mean(history, *key, *date);
            ForecastTableRow {
                date: *date,
                region: key.region,
                age_band: key.age_band,
                forecast: *forecast,
                mean_hist,
                forecast_vs_hist_pct: ratio_to_history(*forecast, mean_hist),
                qty: order_quantity(*forecast),
                newsvendor_qty: sigma
                    .get(key)
                    .and_then(|s| newsvendor_quantity(policy, *forecast, *s)),
            }
        })
        .collect();
    rows.sort_by(|a, b| (a.date, a.key()).cmp(&(b.date, b.key())));
    rows
}

/// Write serializable rows to a CSV file with a header
pub fn write_csv<T: Serialize, P: AsRef<Path>>(path: P, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = rows.len(), "wrote table");
    Ok(())
}

/// Read rows written by [`write_csv`]
pub fn read_csv<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ForecastError::FileNotFound(path.to_path_buf()));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, csv::Error>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::add_months;

    #[test]
    fn test_order_quantity() {
        assert_eq!(order_quantity(0.0), 100);
        assert_eq!(order_quantity(-5.0), 100);
        assert_eq!(order_quantity(90.0), 100);
        assert_eq!(order_quantity(100.0), 200);
        assert_eq!(order_quantity(1000.0), 1100);
        assert_eq!(order_quantity(f64::NAN), 100);
    }

    #[test]
    fn test_ratio_sentinels() {
        assert_eq!(ratio_to_history(50.0, Some(100.0)), Some(50.0));
        assert_eq!(ratio_to_history(50.0, Some(0.0)), Some(f64::INFINITY));
        assert_eq!(ratio_to_history(50.0, None), None);
    }

    #[test]
    fn test_trailing_mean_is_strictly_before() {
        let key = SeriesKey::new(Region::PDL, AgeBand::Adult);
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let history: BTreeMap<(SeriesKey, NaiveDate), f64> = (0..24)
            .map(|i| ((key, add_months(start, i)), i as f64))
            .collect();

        // 12 months before 2024-01 are 0..=11
        let m = trailing_history_mean(&history, key, add_months(start, 12)).unwrap();
        assert_eq!(m, 5.5);

        let other = SeriesKey::new(Region::PDL, AgeBand::Senior);
        assert_eq!(trailing_history_mean(&history, other, add_months(start, 12)), None);
        assert_eq!(trailing_history_mean(&history, key, start), None);
    }

    #[test]
    fn test_newsvendor_column() {
        let fitted = SeriesKey::new(Region::NOR, AgeBand::Senior);
        let unscored = SeriesKey::new(Region::NOR, AgeBand::Adult);
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let forecasts: Forecasts = [((fitted, date), 100.0), ((unscored, date), 100.0)]
            .into_iter()
            .collect();
        let sigma: BTreeMap<SeriesKey, f64> = [(fitted, 10.0)].into_iter().collect();
        let policy = Newsvendor::new(5.0, 1.0).unwrap();

        let table = build_forecast_table(&forecasts, &BTreeMap::new(), &sigma, &policy);

        // 100 + 0.9674 * 10, rounded up
        assert_eq!(table[0].key(), unscored);
        assert_eq!(table[0].newsvendor_qty, None);
        assert_eq!(table[1].newsvendor_qty, Some(110));
        assert_eq!(table[1].qty, 200);

        let free_overstock = Newsvendor::new(1.0, 0.0).unwrap();
        assert_eq!(newsvendor_quantity(&free_overstock, 100.0, 10.0), None);
        let free_stockout = Newsvendor::new(0.0, 1.0).unwrap();
        assert_eq!(newsvendor_quantity(&free_stockout, 100.0, 10.0), Some(0));
    }
}
