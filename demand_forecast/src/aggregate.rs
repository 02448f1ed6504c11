//! Series aggregation onto a complete monthly grid
//!
//! Raw observations are grouped to (month, region, age band), duplicates are
//! summed (counts) or averaged (rates), and the grid is completed over the
//! configured region and age universe from the first month up to the end of
//! the forecast horizon.
//!
//! Fill policy:
//! - temperature: forward then backward fill inside observed history
//! - counts (doses, emergency visits, admissions): zero
//! - incidence inside observed history: zero
//! - incidence and temperature past the last observed month: region ×
//!   calendar-month climatology; incidence is scaled by a clipped recent-trend
//!   factor

use crate::config::ForecastConfig;
use crate::data::{Observation, RawInputs};
use crate::error::{ForecastError, Result};
use crate::region::{AgeBand, Region, SeriesKey};
use crate::utils::{add_months, month_range, month_start};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use series_math::stats::{clip, mean};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Population unit of the per-100k rates
pub const PER_100K: f64 = 100_000.0;
/// Number of recent months in the incidence trend factor
const TREND_MONTHS: usize = 3;
/// Bounds of the incidence trend factor
const TREND_BOUNDS: (f64, f64) = (0.7, 1.3);

/// One month of one (region, age band) series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelRow {
    pub date: NaiveDate,
    pub region: Region,
    pub age_band: AgeBand,
    /// Doses administered
    pub doses: f64,
    /// Population of the (region, age band)
    pub population: f64,
    /// Doses per 100 000 inhabitants, `None` when the population is zero
    pub doses_per_100k: Option<f64>,
    /// Regional incidence, `None` when the region was never observed
    pub incidence_per_100k: Option<f64>,
    /// Regional mean temperature, `None` when the region was never observed
    pub tmean: Option<f64>,
    pub er_visits: f64,
    pub admissions: f64,
}

impl PanelRow {
    /// Series the row belongs to
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(self.region, self.age_band)
    }
}

/// Doses per 100k for a dose count and population
pub fn per_100k(doses: f64, population: f64) -> Option<f64> {
    if population > 0.0 {
        Some(doses / (population / PER_100K))
    } else {
        None
    }
}

/// Complete monthly grid sorted by (region, age band, date)
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    rows: Vec<PanelRow>,
    dates: Vec<NaiveDate>,
    forecast_start: NaiveDate,
}

impl Panel {
    /// Build a panel, checking that every series covers the same months
    pub fn new(mut rows: Vec<PanelRow>, forecast_start: NaiveDate) -> Result<Self> {
        if rows.is_empty() {
            return Err(ForecastError::DataError("Panel has no rows".to_string()));
        }
        rows.sort_by(|a, b| (a.key(), a.date).cmp(&(b.key(), b.date)));

        let first_key = rows[0].key();
        let dates: Vec<NaiveDate> = rows
            .iter()
            .take_while(|r| r.key() == first_key)
            .map(|r| r.date)
            .collect();
        if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
            if dates != month_range(*first, *last) {
                return Err(ForecastError::DataError(format!(
                    "Series {} does not cover consecutive months",
                    first_key
                )));
            }
        }

        let panel = Self {
            rows,
            dates,
            forecast_start: month_start(forecast_start),
        };
        for (key, series) in panel.series() {
            if series.len() != panel.dates.len()
                || series.iter().zip(&panel.dates).any(|(r, d)| r.date != *d)
            {
                return Err(ForecastError::DataError(format!(
                    "Series {} does not match the panel months",
                    key
                )));
            }
        }
        Ok(panel)
    }

    /// All rows
    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    /// Mutable access for in-place series rewrites
    pub(crate) fn rows_mut(&mut self) -> &mut [PanelRow] {
        &mut self.rows
    }

    /// Months covered by every series
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// First month without ground truth
    pub fn forecast_start(&self) -> NaiveDate {
        self.forecast_start
    }

    /// Number of history months per series
    pub fn history_len(&self) -> usize {
        self.dates.iter().filter(|d| **d < self.forecast_start).count()
    }

    /// Known target of a row: doses per 100k before the forecast start
    pub fn target(&self, row: &PanelRow) -> Option<f64> {
        if row.date < self.forecast_start {
            row.doses_per_100k
        } else {
            None
        }
    }

    /// Contiguous rows of each series, in key order
    pub fn series(&self) -> Vec<(SeriesKey, &[PanelRow])> {
        let mut out = Vec::new();
        let mut begin = 0;
        for i in 1..=self.rows.len() {
            if i == self.rows.len() || self.rows[i].key() != self.rows[begin].key() {
                out.push((self.rows[begin].key(), &self.rows[begin..i]));
                begin = i;
            }
        }
        out
    }

    /// Historical targets keyed by (series, date)
    pub fn history(&self) -> BTreeMap<(SeriesKey, NaiveDate), f64> {
        self.rows
            .iter()
            .filter_map(|r| self.target(r).map(|y| ((r.key(), r.date), y)))
            .collect()
    }

    /// Population per series
    pub fn populations(&self) -> BTreeMap<SeriesKey, f64> {
        self.rows.iter().map(|r| (r.key(), r.population)).collect()
    }
}

/// Monthly calendar averages of one region's observations
#[derive(Debug, Clone)]
struct Climatology {
    by_month: [Option<f64>; 12],
    overall: Option<f64>,
}

impl Climatology {
    fn from_observed(observed: &BTreeMap<NaiveDate, f64>) -> Self {
        let mut buckets: [Vec<f64>; 12] = Default::default();
        for (date, value) in observed {
            buckets[date.month0() as usize].push(*value);
        }
        let values: Vec<f64> = observed.values().copied().collect();
        Self {
            by_month: buckets.map(|b| mean(&b)),
            overall: mean(&values),
        }
    }

    fn value(&self, date: NaiveDate) -> Option<f64> {
        self.by_month[date.month0() as usize].or(self.overall)
    }
}

/// Groups raw observations onto the panel grid
#[derive(Debug, Clone)]
pub struct SeriesAggregator {
    config: ForecastConfig,
}

impl SeriesAggregator {
    /// Create a new aggregator
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Build the complete panel
    pub fn aggregate(&self, inputs: &RawInputs) -> Result<Panel> {
        let regions: BTreeSet<Region> = self.config.regions.iter().copied().collect();
        let ages: BTreeSet<AgeBand> = self.config.age_bands.iter().copied().collect();

        let doses: Vec<&Observation> = inputs
            .doses
            .iter()
            .filter(|o| regions.contains(&o.region))
            .collect();
        let (first_dose, last_dose) = match (
            doses.iter().map(|o| o.date).min(),
            doses.iter().map(|o| o.date).max(),
        ) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(ForecastError::DataError(
                    "No dose observations for the configured regions".to_string(),
                ))
            }
        };

        let forecast_start = self
            .config
            .forecast_start
            .map(month_start)
            .unwrap_or_else(|| add_months(last_dose, 1));
        let start = self.config.start.map(month_start).unwrap_or(first_dose);
        if start >= forecast_start {
            return Err(ForecastError::ValidationError(format!(
                "Panel start {} is not before the forecast start {}",
                start, forecast_start
            )));
        }
        let end = add_months(forecast_start, self.config.horizon_months as i32 - 1);
        let dates = month_range(start, end);

        let dose_sums = sum_by_series("doses", &doses);
        let er_visits = sum_by_series("er_visits", &inputs.er_visits.iter().collect::<Vec<_>>());
        let admissions =
            sum_by_series("admissions", &inputs.admissions.iter().collect::<Vec<_>>());
        let incidence = mean_by_region(&inputs.incidence);
        let temperature = mean_by_region(&inputs.temperature);

        let mut population: HashMap<SeriesKey, f64> = HashMap::new();
        for record in &inputs.population {
            *population
                .entry(SeriesKey::new(record.region, record.age_band))
                .or_insert(0.0) += record.population;
        }

        let empty = BTreeMap::new();
        let mut rows = Vec::with_capacity(regions.len() * ages.len() * dates.len());
        for region in &regions {
            let tmean = fill_temperature(&dates, temperature.get(region).unwrap_or(&empty));
            let inc = fill_incidence(&dates, incidence.get(region).unwrap_or(&empty));
            if !temperature.contains_key(region) || !incidence.contains_key(region) {
                debug!(%region, "region lacks temperature or incidence observations");
            }

            for age_band in &ages {
                let key = SeriesKey::new(*region, *age_band);
                let pop = match population.get(&key) {
                    Some(p) => *p,
                    None => self.config.default_population,
                };

                for (i, date) in dates.iter().enumerate() {
                    let doses = dose_sums.get(&(key, *date)).copied().unwrap_or(0.0);
                    rows.push(PanelRow {
                        date: *date,
                        region: *region,
                        age_band: *age_band,
                        doses,
                        population: pop,
                        doses_per_100k: per_100k(doses, pop),
                        incidence_per_100k: inc[i],
                        tmean: tmean[i],
                        er_visits: er_visits.get(&(key, *date)).copied().unwrap_or(0.0),
                        admissions: admissions.get(&(key, *date)).copied().unwrap_or(0.0),
                    });
                }
            }
        }

        info!(
            series = regions.len() * ages.len(),
            months = dates.len(),
            %start,
            %forecast_start,
            "aggregated panel"
        );
        Panel::new(rows, forecast_start)
    }
}

/// Sum age-keyed observations per (series, month)
fn sum_by_series(metric: &str, observations: &[&Observation]) -> HashMap<(SeriesKey, NaiveDate), f64> {
    let mut sums = HashMap::new();
    let mut without_age = 0usize;
    for o in observations {
        match o.age_band {
            Some(age) => {
                *sums
                    .entry((SeriesKey::new(o.region, age), month_start(o.date)))
                    .or_insert(0.0) += o.value;
            }
            None => without_age += 1,
        }
    }
    if without_age > 0 {
        warn!(metric, rows = without_age, "observations without an age band excluded");
    }
    sums
}

/// Average observations per (region, month)
fn mean_by_region(observations: &[Observation]) -> HashMap<Region, BTreeMap<NaiveDate, f64>> {
    let mut acc: HashMap<Region, BTreeMap<NaiveDate, (f64, usize)>> = HashMap::new();
    for o in observations {
        let slot = acc
            .entry(o.region)
            .or_default()
            .entry(month_start(o.date))
            .or_insert((0.0, 0));
        slot.0 += o.value;
        slot.1 += 1;
    }
    acc.into_iter()
        .map(|(region, months)| {
            let means = months
                .into_iter()
                .map(|(date, (sum, count))| (date, sum / count as f64))
                .collect();
            (region, means)
        })
        .collect()
}

/// Forward then backward fill inside history, climatology beyond it
fn fill_temperature(dates: &[NaiveDate], observed: &BTreeMap<NaiveDate, f64>) -> Vec<Option<f64>> {
    let Some(last_observed) = observed.keys().next_back().copied() else {
        return vec![None; dates.len()];
    };
    let climatology = Climatology::from_observed(observed);

    let mut values: Vec<Option<f64>> = dates.iter().map(|d| observed.get(d).copied()).collect();
    let history = dates.iter().take_while(|d| **d <= last_observed).count();

    let mut carry = None;
    for v in values.iter_mut().take(history) {
        match v {
            Some(x) => carry = Some(*x),
            None => *v = carry,
        }
    }
    let mut carry = None;
    for v in values.iter_mut().take(history).rev() {
        match v {
            Some(x) => carry = Some(*x),
            None => *v = carry,
        }
    }
    // a region observed only after the panel start still has nothing to carry
    for (v, d) in values.iter_mut().zip(dates).take(history) {
        if v.is_none() {
            *v = climatology.value(*d);
        }
    }

    for (v, d) in values.iter_mut().zip(dates).skip(history) {
        *v = climatology.value(*d);
    }
    values
}

/// Zero fill inside history, trend-scaled climatology beyond it
fn fill_incidence(dates: &[NaiveDate], observed: &BTreeMap<NaiveDate, f64>) -> Vec<Option<f64>> {
    let Some(last_observed) = observed.keys().next_back().copied() else {
        return vec![None; dates.len()];
    };
    let climatology = Climatology::from_observed(observed);
    let trend = incidence_trend(observed, &climatology);

    dates
        .iter()
        .map(|d| {
            if *d <= last_observed {
                Some(observed.get(d).copied().unwrap_or(0.0))
            } else {
                climatology.value(*d).map(|c| c * trend)
            }
        })
        .collect()
}

/// Recent level relative to its climatology, clipped
fn incidence_trend(observed: &BTreeMap<NaiveDate, f64>, climatology: &Climatology) -> f64 {
    let recent: Vec<(NaiveDate, f64)> = observed
        .iter()
        .rev()
        .take(TREND_MONTHS)
        .map(|(d, v)| (*d, *v))
        .collect();
    let recent_values: Vec<f64> = recent.iter().map(|(_, v)| *v).collect();
    let expected: Vec<f64> = recent.iter().filter_map(|(d, _)| climatology.value(*d)).collect();

    match (mean(&recent_values), mean(&expected)) {
        (Some(level), Some(base)) if base > 0.0 => clip(level / base, TREND_BOUNDS.0, TREND_BOUNDS.1),
        _ => 1.0,
    }
}
