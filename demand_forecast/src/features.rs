//! Leakage-safe feature construction
//!
//! For a row dated `t` every lag and moving-average feature is computed from
//! values dated strictly before `t`: lag-k reads `t - k`, MA-w averages the
//! window `[t - w, t - 1]`. Target values dated at or after the forecast start
//! are treated as unknown, so future rows never see ground truth through the
//! target lags either.
//!
//! Residual gaps (the first months of a series) are filled with the median of
//! the column's known values in earlier rows of the same series, then with the
//! median of the metric's own earlier values, then with 0.0. A fill at `t`
//! therefore never reads anything dated at or after `t`.

use crate::aggregate::{Panel, PanelRow};
use crate::error::{ForecastError, Result};
use crate::region::SeriesKey;
use crate::utils::{is_campaign_month, is_winter_month};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use series_math::moving_averages::{lag, trailing_mean};
use series_math::stats::median;

/// Lags, in months
pub const LAGS: [usize; 5] = [1, 2, 3, 6, 12];
/// Trailing moving-average windows, in months
pub const WINDOWS: [usize; 4] = [2, 3, 6, 12];
/// Calendar features appended after the lag and MA features
pub const CALENDAR_FEATURES: [&str; 4] = ["month", "year", "is_campaign", "is_winter"];

/// Panel metrics that feed the lag and MA features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMetric {
    DosesPer100k,
    IncidencePer100k,
    Tmean,
    ErVisits,
    Admissions,
}

impl SourceMetric {
    /// Metrics in feature order
    pub const ALL: [SourceMetric; 5] = [
        SourceMetric::DosesPer100k,
        SourceMetric::IncidencePer100k,
        SourceMetric::Tmean,
        SourceMetric::ErVisits,
        SourceMetric::Admissions,
    ];

    /// Column name of the metric
    pub fn name(&self) -> &'static str {
        match self {
            SourceMetric::DosesPer100k => "doses_per_100k",
            SourceMetric::IncidencePer100k => "incidence_per_100k",
            SourceMetric::Tmean => "tmean",
            SourceMetric::ErVisits => "er_visits",
            SourceMetric::Admissions => "admissions",
        }
    }

    fn value(&self, row: &PanelRow) -> Option<f64> {
        match self {
            SourceMetric::DosesPer100k => row.doses_per_100k,
            SourceMetric::IncidencePer100k => row.incidence_per_100k,
            SourceMetric::Tmean => row.tmean,
            SourceMetric::ErVisits => Some(row.er_visits),
            SourceMetric::Admissions => Some(row.admissions),
        }
    }
}

/// Names that must never be used as features: same-period raw values
const CONTEMPORANEOUS: [&str; 8] = [
    "doses",
    "doses_per_100k",
    "incidence_per_100k",
    "tmean",
    "er_visits",
    "admissions",
    "population",
    "y",
];

/// Reject any feature that would expose a same-period value
pub fn check_feature_names(names: &[String]) -> Result<()> {
    match names.iter().find(|n| CONTEMPORANEOUS.contains(&n.as_str())) {
        Some(name) => Err(ForecastError::ValidationError(format!(
            "Contemporaneous column '{}' cannot be used as a feature",
            name
        ))),
        None => Ok(()),
    }
}

/// Features and target of one (series, month)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub key: SeriesKey,
    pub date: NaiveDate,
    /// Values in the order of [`FeatureTable::names`]
    pub features: Vec<f64>,
    /// Doses per 100k, `None` from the forecast start on
    pub target: Option<f64>,
}

/// Feature rows sorted by (series, date)
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    names: Vec<String>,
    rows: Vec<FeatureRow>,
    forecast_start: NaiveDate,
}

impl FeatureTable {
    /// Ordered feature names
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// All rows
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// First month without ground truth
    pub fn forecast_start(&self) -> NaiveDate {
        self.forecast_start
    }

    /// Index of a named feature
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Contiguous rows of each series, in key order
    pub fn series(&self) -> Vec<(SeriesKey, &[FeatureRow])> {
        let mut out = Vec::new();
        let mut begin = 0;
        for i in 1..=self.rows.len() {
            if i == self.rows.len() || self.rows[i].key != self.rows[begin].key {
                out.push((self.rows[begin].key, &self.rows[begin..i]));
                begin = i;
            }
        }
        out
    }
}

/// Builds the feature table from a panel
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    lags: Vec<usize>,
    windows: Vec<usize>,
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self {
            lags: LAGS.to_vec(),
            windows: WINDOWS.to_vec(),
        }
    }
}

impl FeatureBuilder {
    /// Create a builder with custom lags and windows
    pub fn new(lags: Vec<usize>, windows: Vec<usize>) -> Result<Self> {
        if lags.iter().any(|k| *k == 0) {
            return Err(ForecastError::InvalidParameter(
                "Lags must be at least one month".to_string(),
            ));
        }
        if windows.iter().any(|w| *w == 0) {
            return Err(ForecastError::InvalidParameter(
                "Moving-average windows must be positive".to_string(),
            ));
        }
        Ok(Self { lags, windows })
    }

    /// Ordered feature names
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for metric in SourceMetric::ALL {
            for k in &self.lags {
                names.push(format!("{}_lag{}", metric.name(), k));
            }
            for w in &self.windows {
                names.push(format!("{}_ma{}", metric.name(), w));
            }
        }
        names.extend(CALENDAR_FEATURES.iter().map(|c| c.to_string()));
        names
    }

    /// Build features for every series of the panel
    pub fn build(&self, panel: &Panel) -> Result<FeatureTable> {
        let names = self.feature_names();
        check_feature_names(&names)?;

        let mut rows = Vec::with_capacity(panel.rows().len());
        for (key, series) in panel.series() {
            rows.extend(self.build_series(panel, key, series)?);
        }

        Ok(FeatureTable {
            names,
            rows,
            forecast_start: panel.forecast_start(),
        })
    }

    fn build_series(
        &self,
        panel: &Panel,
        key: SeriesKey,
        series: &[PanelRow],
    ) -> Result<Vec<FeatureRow>> {
        let mut filled: Vec<Vec<f64>> = Vec::new();

        for metric in SourceMetric::ALL {
            let values: Vec<Option<f64>> = series
                .iter()
                .map(|row| match metric {
                    SourceMetric::DosesPer100k => panel.target(row),
                    _ => metric.value(row),
                })
                .collect();

            for k in &self.lags {
                filled.push(fill_from_past(lag(&values, *k), &values));
            }
            for w in &self.windows {
                filled.push(fill_from_past(trailing_mean(&values, *w)?, &values));
            }
        }

        Ok(series
            .iter()
            .enumerate()
            .map(|(t, row)| {
                let mut features: Vec<f64> = filled.iter().map(|column| column[t]).collect();
                let month = row.date.month();
                features.push(month as f64);
                features.push(row.date.year() as f64);
                features.push(if is_campaign_month(month) { 1.0 } else { 0.0 });
                features.push(if is_winter_month(month) { 1.0 } else { 0.0 });

                FeatureRow {
                    key,
                    date: row.date,
                    features,
                    target: panel.target(row),
                }
            })
            .collect())
    }
}

/// Fill gaps at `t` from the column's known values before `t`, else from the
/// metric's known values before `t`, else 0.0
fn fill_from_past(column: Vec<Option<f64>>, values: &[Option<f64>]) -> Vec<f64> {
    let earlier = |xs: &[Option<f64>], t: usize| -> Option<f64> {
        let known: Vec<f64> = xs[..t].iter().flatten().copied().collect();
        median(&known)
    };

    column
        .iter()
        .enumerate()
        .map(|(t, v)| match v {
            Some(v) => *v,
            None => earlier(&column, t)
                .or_else(|| earlier(values, t))
                .unwrap_or(0.0),
        })
        .collect()
}
