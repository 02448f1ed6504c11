#![allow(dead_code)]

use chrono::NaiveDate;
use demand_forecast::aggregate::{Panel, PanelRow};
use demand_forecast::utils::add_months;
use demand_forecast::{AgeBand, Region, SeriesKey};

pub fn ym(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap()
}

pub fn key(region: Region, age_band: AgeBand) -> SeriesKey {
    SeriesKey::new(region, age_band)
}

/// Metric values of one synthetic month
pub struct Month {
    pub doses: f64,
    pub incidence: f64,
    pub tmean: f64,
    pub er_visits: f64,
    pub admissions: f64,
}

/// Seasonal, trending month `t` of a series
pub fn seasonal_month(series: usize, t: usize) -> Month {
    let phase = (t % 12) as f64;
    let season = (2.0 * std::f64::consts::PI * phase / 12.0).cos();
    Month {
        doses: 200.0 + 40.0 * series as f64 + 3.0 * t as f64 + 60.0 * season,
        incidence: 50.0 + 30.0 * season,
        tmean: 12.0 - 8.0 * season,
        er_visits: 20.0 + t as f64,
        admissions: 5.0 + (t % 4) as f64,
    }
}

/// Panel over `months` months from `start`, the last `months - history`
/// being future. Population is 100 000 so doses equal doses per 100k.
pub fn synthetic_panel<F>(
    keys: &[SeriesKey],
    start: NaiveDate,
    months: usize,
    history: usize,
    value: F,
) -> Panel
where
    F: Fn(usize, usize) -> Month,
{
    let mut rows = Vec::new();
    for (s, k) in keys.iter().enumerate() {
        for t in 0..months {
            let m = value(s, t);
            rows.push(PanelRow {
                date: add_months(start, t as i32),
                region: k.region,
                age_band: k.age_band,
                doses: m.doses,
                population: 100_000.0,
                doses_per_100k: Some(m.doses),
                incidence_per_100k: Some(m.incidence),
                tmean: Some(m.tmean),
                er_visits: m.er_visits,
                admissions: m.admissions,
            });
        }
    }
    Panel::new(rows, add_months(start, history as i32)).unwrap()
}
