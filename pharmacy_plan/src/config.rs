//! Allocation, stock and replenishment settings

use crate::{PlanError, Result};
use demand_forecast::Region;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Settings of the allocation and stock simulation stages
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Floor applied to every initial stock
    pub min_initial_stock: u64,
    /// Initial stock of pharmacies that do not declare one
    pub default_initial_stock: u64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            min_initial_stock: 100,
            default_initial_stock: 100,
        }
    }
}

impl AllocationConfig {
    /// Check that the settings are consistent
    pub fn validate(&self) -> Result<()> {
        if self.default_initial_stock < self.min_initial_stock {
            return Err(PlanError::InvalidParameter(format!(
                "Default initial stock {} is below the minimum {}",
                self.default_initial_stock, self.min_initial_stock
            )));
        }
        Ok(())
    }

    /// Initial stock of a pharmacy, defaulted then clamped to the minimum
    pub fn initial_stock(&self, declared: Option<u64>) -> u64 {
        declared
            .unwrap_or(self.default_initial_stock)
            .max(self.min_initial_stock)
    }
}

/// Bounds of the regional replenishment orders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplenishmentConfig {
    /// Doses that can be shipped across all regions in one month, unlimited
    /// when unset
    pub monthly_capacity: Option<f64>,
    /// A regional order never exceeds this multiple of its mean demand
    pub max_demand_ratio: f64,
    /// Fixed upper bound of a region's monthly order, in doses
    pub region_capacity: BTreeMap<Region, f64>,
}

impl Default for ReplenishmentConfig {
    fn default() -> Self {
        Self {
            monthly_capacity: None,
            max_demand_ratio: 1.2,
            region_capacity: BTreeMap::new(),
        }
    }
}

impl ReplenishmentConfig {
    /// Check that the settings are consistent
    pub fn validate(&self) -> Result<()> {
        if !(self.max_demand_ratio >= 1.0 && self.max_demand_ratio.is_finite()) {
            return Err(PlanError::InvalidParameter(format!(
                "Maximum demand ratio must be finite and at least 1, got {}",
                self.max_demand_ratio
            )));
        }
        if let Some(capacity) = self.monthly_capacity {
            if !(capacity >= 0.0 && capacity.is_finite()) {
                return Err(PlanError::InvalidParameter(format!(
                    "Monthly capacity must be finite and non-negative, got {}",
                    capacity
                )));
            }
        }
        if let Some((region, capacity)) = self
            .region_capacity
            .iter()
            .find(|(_, c)| !(**c >= 0.0 && c.is_finite()))
        {
            return Err(PlanError::InvalidParameter(format!(
                "Capacity of region {} must be finite and non-negative, got {}",
                region, capacity
            )));
        }
        Ok(())
    }

    /// Largest order a region may receive for a given mean demand
    pub fn region_bound(&self, region: Region, demand: f64) -> f64 {
        let ratio_bound = self.max_demand_ratio * demand.max(0.0);
        match self.region_capacity.get(&region) {
            Some(capacity) => ratio_bound.min(*capacity),
            None => ratio_bound,
        }
    }
}
