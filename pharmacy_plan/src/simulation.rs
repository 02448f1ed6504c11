//! Monthly stock roll-forward per pharmacy
//!
//! Each pharmacy starts the month before the first planned month with its
//! initial stock. Every month the planned consumption is deducted in full;
//! stock never goes below zero and unmet demand is dropped, not carried as a
//! backorder. The closing stock of a month opens the next one.

use crate::allocation::AllocationRow;
use crate::config::AllocationConfig;
use crate::pharmacy::PharmacyTable;
use crate::Result;
use chrono::NaiveDate;
use demand_forecast::utils::add_months;
use demand_forecast::Region;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Stock of one pharmacy over one month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub pharmacy_id: String,
    pub region: Region,
    pub date: NaiveDate,
    pub opening_stock: u64,
    pub consumption: u64,
    pub closing_stock: u64,
}

impl StockSnapshot {
    fn roll(pharmacy_id: &str, region: Region, date: NaiveDate, opening: u64, consumption: u64) -> Self {
        Self {
            pharmacy_id: pharmacy_id.to_string(),
            region,
            date,
            opening_stock: opening,
            consumption,
            closing_stock: opening.saturating_sub(consumption),
        }
    }
}

/// Rolls pharmacy stock forward through the allocation plan
#[derive(Debug, Clone)]
pub struct StockSimulator {
    config: AllocationConfig,
}

impl StockSimulator {
    /// Create a new simulator
    pub fn new(config: AllocationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Simulate every pharmacy of the table.
    ///
    /// Snapshots are sorted by (date, region, pharmacy id). Nothing is
    /// produced when the plan is empty.
    pub fn simulate(
        &self,
        pharmacies: &PharmacyTable,
        allocations: &[AllocationRow],
    ) -> Vec<StockSnapshot> {
        let Some(first_month) = allocations.iter().map(|a| a.date).min() else {
            warn!("empty allocation plan, no stock simulated");
            return Vec::new();
        };
        let opening_month = add_months(first_month, -1);

        let mut plan: BTreeMap<(Region, &str), Vec<&AllocationRow>> = BTreeMap::new();
        for row in allocations {
            plan.entry((row.region, row.pharmacy_id.as_str()))
                .or_default()
                .push(row);
        }

        let mut snapshots = Vec::new();
        for pharmacy in pharmacies.pharmacies() {
            let initial = self.config.initial_stock(pharmacy.initial_stock);
            let id = pharmacy.pharmacy_id.as_str();
            snapshots.push(StockSnapshot::roll(id, pharmacy.region, opening_month, initial, 0));

            let Some(rows) = plan.get_mut(&(pharmacy.region, id)) else {
                continue;
            };
            rows.sort_by_key(|r| r.date);

            let mut stock = initial;
            for row in rows.iter() {
                let snapshot = StockSnapshot::roll(id, pharmacy.region, row.date, stock, row.consumption);
                stock = snapshot.closing_stock;
                snapshots.push(snapshot);
            }
        }

        snapshots.sort_by(|a, b| {
            (a.date, a.region, &a.pharmacy_id).cmp(&(b.date, b.region, &b.pharmacy_id))
        });
        debug!(
            pharmacies = pharmacies.len(),
            snapshots = snapshots.len(),
            opening_month = %opening_month,
            "stock simulated"
        );
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pharmacy::Pharmacy;

    fn ym(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, 1).unwrap()
    }

    fn allocation(m: u32, id: &str, consumption: u64) -> AllocationRow {
        AllocationRow {
            date: ym(m),
            region: Region::NAQ,
            pharmacy_id: id.to_string(),
            population: 1000.0,
            consumption,
        }
    }

    #[test]
    fn test_stock_chain_without_backorder() {
        let table = PharmacyTable::new(vec![Pharmacy {
            pharmacy_id: "p1".to_string(),
            region: Region::NAQ,
            population: 1000.0,
            initial_stock: Some(150),
        }])
        .unwrap();
        let plan = vec![
            allocation(12, "p1", 200),
            allocation(11, "p1", 100),
        ];

        let stock = StockSimulator::new(AllocationConfig::default())
            .unwrap()
            .simulate(&table, &plan);

        let closing: Vec<(NaiveDate, u64, u64)> = stock
            .iter()
            .map(|s| (s.date, s.opening_stock, s.closing_stock))
            .collect();
        assert_eq!(
            closing,
            vec![(ym(10), 150, 150), (ym(11), 150, 50), (ym(12), 50, 0)]
        );
    }

    #[test]
    fn test_empty_plan() {
        let stock = StockSimulator::new(AllocationConfig::default())
            .unwrap()
            .simulate(&PharmacyTable::default(), &[]);
        assert!(stock.is_empty());
    }
}
