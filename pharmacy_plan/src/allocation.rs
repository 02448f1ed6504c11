//! Pro-rata allocation of regional totals to pharmacies
//!
//! Shares are proportional to the population each pharmacy serves. Rounding
//! uses the largest-remainder (Hamilton) method: every pharmacy gets the floor
//! of its exact share, then the units still missing to reach the rounded
//! regional total go one by one to the largest fractional remainders. Ties
//! keep input order.

use crate::pharmacy::{Pharmacy, PharmacyTable};
use chrono::NaiveDate;
use demand_forecast::aggregate::PER_100K;
use demand_forecast::{ForecastTableRow, Region, SeriesKey};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Dose quantity allocated to one pharmacy for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRow {
    pub date: NaiveDate,
    pub region: Region,
    pub pharmacy_id: String,
    pub population: f64,
    pub consumption: u64,
}

/// Split `total` across `populations` into integers summing to `round(total)`.
///
/// Every allocation is zero when the total is not positive or the population
/// sums to zero.
pub fn largest_remainder(total: f64, populations: &[f64]) -> Vec<u64> {
    let n = populations.len();
    let total_population: f64 = populations.iter().sum();
    if !(total > 0.0 && total.is_finite()) || !(total_population > 0.0) || n == 0 {
        return vec![0; n];
    }

    let shares: Vec<f64> = populations
        .iter()
        .map(|p| p / total_population * total)
        .collect();
    let mut allocation: Vec<u64> = shares.iter().map(|s| s.floor() as u64).collect();

    let target = total.round() as u64;
    let floors: u64 = allocation.iter().sum();
    let shortfall = target.saturating_sub(floors) as usize;

    // stable sort: equal remainders keep input order
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        let ra = shares[a] - shares[a].floor();
        let rb = shares[b] - shares[b].floor();
        rb.total_cmp(&ra)
    });
    for &i in order.iter().take(shortfall) {
        allocation[i] += 1;
    }
    allocation
}

/// Regional dose totals per month from per-100k forecasts.
///
/// Each (region, age band) forecast is scaled by its population; bands
/// without a known population use `default_population`.
pub fn regional_totals(
    forecasts: &[ForecastTableRow],
    populations: &BTreeMap<SeriesKey, f64>,
    default_population: f64,
) -> BTreeMap<(NaiveDate, Region), f64> {
    let mut totals = BTreeMap::new();
    for row in forecasts {
        let population = populations
            .get(&row.key())
            .copied()
            .unwrap_or(default_population);
        *totals.entry((row.date, row.region)).or_insert(0.0) += row.forecast * population / PER_100K;
    }
    totals
}

/// Splits regional totals across the pharmacies of each region
#[derive(Debug, Clone, Copy, Default)]
pub struct Allocator;

impl Allocator {
    /// Create a new allocator
    pub fn new() -> Self {
        Self
    }

    /// Allocate one regional total to the pharmacies of that region
    pub fn allocate_region(
        &self,
        date: NaiveDate,
        region: Region,
        total: f64,
        pharmacies: &[&Pharmacy],
    ) -> Vec<AllocationRow> {
        let populations: Vec<f64> = pharmacies.iter().map(|p| p.population).collect();
        let quantities = largest_remainder(total, &populations);

        pharmacies
            .iter()
            .zip(quantities)
            .map(|(pharmacy, consumption)| AllocationRow {
                date,
                region,
                pharmacy_id: pharmacy.pharmacy_id.clone(),
                population: pharmacy.population,
                consumption,
            })
            .collect()
    }

    /// Allocate every (month, region) total.
    ///
    /// Regions without pharmacies are logged and skipped. Rows come out
    /// sorted by month, region, then pharmacy table order.
    pub fn allocate(
        &self,
        totals: &BTreeMap<(NaiveDate, Region), f64>,
        pharmacies: &PharmacyTable,
    ) -> Vec<AllocationRow> {
        let by_region = pharmacies.by_region();

        let uncovered: BTreeSet<Region> = totals
            .keys()
            .map(|(_, region)| *region)
            .filter(|region| !by_region.contains_key(region))
            .collect();
        for region in &uncovered {
            warn!(region = %region, "no pharmacy in region, allocation skipped");
        }

        let groups: Vec<(NaiveDate, Region, f64, &Vec<&Pharmacy>)> = totals
            .iter()
            .filter_map(|((date, region), total)| {
                by_region
                    .get(region)
                    .map(|list| (*date, *region, *total, list))
            })
            .collect();

        let rows: Vec<AllocationRow> = groups
            .into_par_iter()
            .map(|(date, region, total, list)| self.allocate_region(date, region, total, list))
            .flatten()
            .collect();

        debug!(
            groups = totals.len(),
            skipped_regions = uncovered.len(),
            rows = rows.len(),
            "allocation complete"
        );
        rows
    }
}
