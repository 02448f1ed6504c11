//! Regional replenishment orders
//!
//! Each (month, region) order is the newsvendor quantity of the regional
//! demand, cut to the region's bound. When the orders of a month exceed the
//! shipping capacity, the capacity is shared in proportion to the orders with
//! the same largest-remainder rounding as the pharmacy allocation.

use crate::allocation::largest_remainder;
use crate::config::ReplenishmentConfig;
use crate::Result;
use chrono::NaiveDate;
use demand_forecast::aggregate::PER_100K;
use demand_forecast::{ForecastTableRow, Region, SeriesKey};
use serde::{Deserialize, Serialize};
use series_math::Newsvendor;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Replenishment order of one region for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplenishmentRow {
    pub date: NaiveDate,
    pub region: Region,
    /// Mean demand, doses
    pub demand: f64,
    /// Demand standard deviation, doses
    pub sigma: f64,
    /// Newsvendor quantity after the regional bound
    pub target: f64,
    /// Whole doses ordered once the monthly capacity is shared
    pub order: u64,
    /// A regional bound or the monthly capacity cut the order
    pub capped: bool,
}

/// Demand standard deviation per (month, region), in doses.
///
/// Band errors are scaled by their population and combined as independent:
/// `sqrt(sum(sigma_band^2))`. Bands without a spread count as certain.
pub fn regional_sigma(
    forecasts: &[ForecastTableRow],
    sigma: &BTreeMap<SeriesKey, f64>,
    populations: &BTreeMap<SeriesKey, f64>,
    default_population: f64,
) -> BTreeMap<(NaiveDate, Region), f64> {
    let mut variances: BTreeMap<(NaiveDate, Region), f64> = BTreeMap::new();
    for row in forecasts {
        let population = populations
            .get(&row.key())
            .copied()
            .unwrap_or(default_population);
        let band_sigma = sigma.get(&row.key()).copied().unwrap_or(0.0) * population / PER_100K;
        *variances.entry((row.date, row.region)).or_insert(0.0) += band_sigma * band_sigma;
    }
    variances.into_iter().map(|(k, v)| (k, v.sqrt())).collect()
}

/// Turns regional demand into capacity-bounded orders
#[derive(Debug, Clone)]
pub struct Replenisher {
    policy: Newsvendor,
    config: ReplenishmentConfig,
}

impl Replenisher {
    /// Create a new replenisher
    pub fn new(policy: Newsvendor, config: ReplenishmentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { policy, config })
    }

    /// Orders for every (month, region) demand, sorted by month then region.
    ///
    /// `sigma` is keyed like `demand`; a missing entry means certain demand.
    pub fn plan(
        &self,
        demand: &BTreeMap<(NaiveDate, Region), f64>,
        sigma: &BTreeMap<(NaiveDate, Region), f64>,
    ) -> Vec<ReplenishmentRow> {
        let mut months: BTreeMap<NaiveDate, Vec<(Region, f64)>> = BTreeMap::new();
        for ((date, region), mean) in demand {
            months.entry(*date).or_default().push((*region, *mean));
        }

        let mut rows = Vec::with_capacity(demand.len());
        let mut capped_months = 0;
        for (date, regions) in months {
            let mut month_rows: Vec<ReplenishmentRow> = regions
                .into_iter()
                .map(|(region, mean)| {
                    let spread = sigma.get(&(date, region)).copied().unwrap_or(0.0);
                    let quantity = self.policy.quantity(mean, spread);
                    let bound = self.config.region_bound(region, mean);
                    ReplenishmentRow {
                        date,
                        region,
                        demand: mean,
                        sigma: spread,
                        target: quantity.min(bound),
                        order: 0,
                        capped: quantity > bound,
                    }
                })
                .collect();

            let targets: Vec<f64> = month_rows.iter().map(|r| r.target).collect();
            let requested: f64 = targets.iter().sum();
            let available = match self.config.monthly_capacity {
                Some(capacity) if capacity < requested => {
                    capped_months += 1;
                    debug!(%date, requested, capacity, "monthly capacity binds");
                    for row in month_rows.iter_mut() {
                        row.capped |= row.target > 0.0;
                    }
                    capacity
                }
                _ => requested,
            };

            for (row, order) in month_rows.iter_mut().zip(largest_remainder(available, &targets)) {
                row.order = order;
            }
            rows.extend(month_rows);
        }

        info!(
            rows = rows.len(),
            capped_months,
            critical_ratio = self.policy.critical_ratio(),
            "replenishment planned"
        );
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use demand_forecast::AgeBand;

    fn ym(month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, 1).unwrap()
    }

    fn demand(values: &[(u32, Region, f64)]) -> BTreeMap<(NaiveDate, Region), f64> {
        values.iter().map(|(m, r, v)| ((ym(*m), *r), *v)).collect()
    }

    fn replenisher(cu: f64, co: f64, config: ReplenishmentConfig) -> Replenisher {
        Replenisher::new(Newsvendor::new(cu, co).unwrap(), config).unwrap()
    }

    #[test]
    fn test_certain_demand_is_ordered_as_is() {
        let plan = replenisher(5.0, 1.0, ReplenishmentConfig::default()).plan(
            &demand(&[(1, Region::IDF, 120.4), (1, Region::BRE, 30.0)]),
            &BTreeMap::new(),
        );

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].region, Region::BRE);
        assert_eq!(plan[0].order, 30);
        assert_eq!(plan[1].order, 120);
        assert!(plan.iter().all(|r| !r.capped));
    }

    #[test]
    fn test_safety_stock_is_cut_by_region_bound() {
        let demand = demand(&[(1, Region::IDF, 100.0), (1, Region::BRE, 100.0)]);
        let sigma: BTreeMap<_, _> = [((ym(1), Region::IDF), 10.0), ((ym(1), Region::BRE), 50.0)]
            .into_iter()
            .collect();

        let plan = replenisher(5.0, 1.0, ReplenishmentConfig::default()).plan(&demand, &sigma);

        // BRE: 100 + 0.967 * 50 exceeds 1.2 * 100
        assert_relative_eq!(plan[0].target, 120.0);
        assert!(plan[0].capped);
        assert_eq!(plan[0].order, 120);
        // IDF: 100 + 0.967 * 10 stays inside the bound
        assert_relative_eq!(plan[1].target, 109.674, epsilon = 1e-3);
        assert!(!plan[1].capped);
        assert_eq!(plan[1].order, 110);
    }

    #[test]
    fn test_monthly_capacity_is_shared() {
        let config = ReplenishmentConfig {
            monthly_capacity: Some(200.0),
            ..Default::default()
        };
        let plan = replenisher(5.0, 1.0, config).plan(
            &demand(&[
                (1, Region::IDF, 300.0),
                (1, Region::BRE, 100.0),
                (2, Region::IDF, 150.0),
            ]),
            &BTreeMap::new(),
        );

        let january: Vec<u64> = plan.iter().filter(|r| r.date == ym(1)).map(|r| r.order).collect();
        assert_eq!(january, vec![50, 150]);
        assert!(plan.iter().filter(|r| r.date == ym(1)).all(|r| r.capped));
        // February fits
        assert_eq!(plan[2].order, 150);
        assert!(!plan[2].capped);
    }

    #[test]
    fn test_free_stockout_orders_nothing() {
        let sigma: BTreeMap<_, _> = [((ym(1), Region::IDF), 20.0)].into_iter().collect();
        let plan = replenisher(0.0, 1.0, ReplenishmentConfig::default())
            .plan(&demand(&[(1, Region::IDF, 100.0)]), &sigma);

        assert_eq!(plan[0].target, 0.0);
        assert_eq!(plan[0].order, 0);
        assert!(!plan[0].capped);
    }

    #[test]
    fn test_free_overstock_fills_the_bound() {
        let sigma: BTreeMap<_, _> = [((ym(1), Region::IDF), 20.0)].into_iter().collect();
        let plan = replenisher(1.0, 0.0, ReplenishmentConfig::default())
            .plan(&demand(&[(1, Region::IDF, 100.0)]), &sigma);

        assert_relative_eq!(plan[0].target, 120.0);
        assert_eq!(plan[0].order, 120);
        assert!(plan[0].capped);
    }

    #[test]
    fn test_regional_sigma_combines_bands() {
        let date = ym(1);
        let row = |age_band| ForecastTableRow {
            date,
            region: Region::OCC,
            age_band,
            forecast: 50.0,
            mean_hist: None,
            forecast_vs_hist_pct: None,
            qty: 100,
            newsvendor_qty: None,
        };
        let adult = SeriesKey::new(Region::OCC, AgeBand::Adult);
        let senior = SeriesKey::new(Region::OCC, AgeBand::Senior);
        let sigma: BTreeMap<_, _> = [(adult, 3.0), (senior, 2.0)].into_iter().collect();
        let populations: BTreeMap<_, _> = [(adult, 100_000.0), (senior, 200_000.0)]
            .into_iter()
            .collect();

        let combined = regional_sigma(
            &[row(AgeBand::Adult), row(AgeBand::Senior), row(AgeBand::Young)],
            &sigma,
            &populations,
            1_000_000.0,
        );

        // sqrt(3^2 + 4^2); the young band has no spread
        assert_relative_eq!(combined[&(date, Region::OCC)], 5.0);
    }
}
