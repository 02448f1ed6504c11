//! Top-down hierarchical reconciliation
//!
//! National -> (region, age band). Each node's share is its mean historical
//! target over the sum of all node means, held constant over time; a national
//! total is split with those shares so reconciled nodes always add back up to
//! it.

use crate::error::{ForecastError, Result};
use crate::models::Forecasts;
use crate::region::SeriesKey;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Share of each node, summing to one
pub type Proportions = BTreeMap<SeriesKey, f64>;

/// Historical proportions of the given nodes.
///
/// Nodes with no history get a zero mean; when every mean is zero the
/// shares are equal.
pub fn historical_proportions(
    history: &BTreeMap<(SeriesKey, NaiveDate), f64>,
    nodes: &BTreeSet<SeriesKey>,
) -> Result<Proportions> {
    if nodes.is_empty() {
        return Err(ForecastError::ValidationError(
            "Reconciliation needs at least one node".to_string(),
        ));
    }

    let mut sums: BTreeMap<SeriesKey, (f64, usize)> =
        nodes.iter().map(|k| (*k, (0.0, 0))).collect();
    for ((key, _), value) in history {
        if let Some(slot) = sums.get_mut(key) {
            slot.0 += value;
            slot.1 += 1;
        }
    }

    let means: BTreeMap<SeriesKey, f64> = sums
        .into_iter()
        .map(|(k, (sum, n))| (k, if n > 0 { sum / n as f64 } else { 0.0 }))
        .collect();
    let total: f64 = means.values().sum();

    let shares = if total == 0.0 || !total.is_finite() {
        let equal = 1.0 / means.len() as f64;
        means.keys().map(|k| (*k, equal)).collect()
    } else {
        means.into_iter().map(|(k, m)| (k, m / total)).collect()
    };
    Ok(shares)
}

/// Sum of node forecasts per date
pub fn national_totals(forecasts: &Forecasts) -> BTreeMap<NaiveDate, f64> {
    let mut totals = BTreeMap::new();
    for ((_, date), value) in forecasts {
        *totals.entry(*date).or_insert(0.0) += value;
    }
    totals
}

/// Split each national total across nodes with constant shares
pub fn reconcile_top_down(
    national: &BTreeMap<NaiveDate, f64>,
    proportions: &Proportions,
) -> Forecasts {
    let mut out = Forecasts::new();
    for (date, total) in national {
        for (key, share) in proportions {
            out.insert((*key, *date), total * share);
        }
    }
    out
}

/// Reconcile node forecasts against their own national total
pub fn reconcile_forecasts(
    forecasts: &Forecasts,
    history: &BTreeMap<(SeriesKey, NaiveDate), f64>,
) -> Result<Forecasts> {
    if forecasts.is_empty() {
        return Ok(Forecasts::new());
    }
    let nodes: BTreeSet<SeriesKey> = forecasts.keys().map(|(k, _)| *k).collect();
    let proportions = historical_proportions(history, &nodes)?;
    let national = national_totals(forecasts);

    debug!(nodes = nodes.len(), dates = national.len(), "top-down reconciliation");
    Ok(reconcile_top_down(&national, &proportions))
}
