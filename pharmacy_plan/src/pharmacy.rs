//! Pharmacy reference table

use crate::{PlanError, Result};
use demand_forecast::utils::parse_number;
use demand_forecast::{Region, RegionEncoding};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

const TABLE: &str = "pharmacies";
const REQUIRED_COLUMNS: [&str; 3] = ["pharmacy_id", "region", "population"];
const INITIAL_STOCK_COLUMN: &str = "initial_stock";

/// One pharmacy of the reference table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pharmacy {
    pub pharmacy_id: String,
    pub region: Region,
    /// Population served
    pub population: f64,
    /// Declared stock at the opening month, if any
    pub initial_stock: Option<u64>,
}

/// Pharmacies in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PharmacyTable {
    pharmacies: Vec<Pharmacy>,
}

impl PharmacyTable {
    /// Create a table, rejecting negative populations and pharmacies listed
    /// twice in the same region
    pub fn new(pharmacies: Vec<Pharmacy>) -> Result<Self> {
        if let Some(bad) = pharmacies
            .iter()
            .find(|p| !(p.population >= 0.0 && p.population.is_finite()))
        {
            return Err(PlanError::InvalidData(format!(
                "Pharmacy '{}' has invalid population {}",
                bad.pharmacy_id, bad.population
            )));
        }

        let mut seen = BTreeSet::new();
        for p in &pharmacies {
            if !seen.insert((p.region, p.pharmacy_id.as_str())) {
                return Err(PlanError::DuplicatePharmacy {
                    region: p.region,
                    pharmacy_id: p.pharmacy_id.clone(),
                });
            }
        }
        Ok(Self { pharmacies })
    }

    /// Load the table from a CSV file with a header row.
    ///
    /// `pharmacy_id`, `region` and `population` are required, `initial_stock`
    /// is optional. Rows whose region cannot be mapped are logged and dropped.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PlanError::FileNotFound(path.to_path_buf()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        let headers = reader.headers()?.clone();
        let position = |name: &str| headers.iter().position(|h| h == name);

        let mut columns = Vec::with_capacity(REQUIRED_COLUMNS.len());
        for column in REQUIRED_COLUMNS {
            let index = position(column).ok_or_else(|| PlanError::MissingInputColumn {
                table: TABLE.to_string(),
                column: column.to_string(),
            })?;
            columns.push(index);
        }
        let (id_col, region_col, population_col) = (columns[0], columns[1], columns[2]);
        let stock_col = position(INITIAL_STOCK_COLUMN);

        let mut pharmacies = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |i: usize| record.get(i).unwrap_or("");

            let raw_region = field(region_col);
            let Some(region) = RegionEncoding::Auto.resolve(raw_region) else {
                warn!(
                    pharmacy = field(id_col),
                    region = raw_region,
                    "unmappable region, pharmacy excluded"
                );
                continue;
            };

            pharmacies.push(Pharmacy {
                pharmacy_id: field(id_col).to_string(),
                region,
                population: parse_number(field(population_col)).unwrap_or(0.0),
                initial_stock: stock_col
                    .and_then(|i| parse_number(field(i)))
                    .map(|v| v.max(0.0).round() as u64),
            });
        }

        info!(path = %path.display(), pharmacies = pharmacies.len(), "pharmacy table loaded");
        Self::new(pharmacies)
    }

    /// All pharmacies
    pub fn pharmacies(&self) -> &[Pharmacy] {
        &self.pharmacies
    }

    pub fn len(&self) -> usize {
        self.pharmacies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pharmacies.is_empty()
    }

    /// Pharmacies of each region, file order kept within a region
    pub fn by_region(&self) -> BTreeMap<Region, Vec<&Pharmacy>> {
        let mut groups: BTreeMap<Region, Vec<&Pharmacy>> = BTreeMap::new();
        for pharmacy in &self.pharmacies {
            groups.entry(pharmacy.region).or_default().push(pharmacy);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pharmacy(id: &str, region: Region, population: f64) -> Pharmacy {
        Pharmacy {
            pharmacy_id: id.to_string(),
            region,
            population,
            initial_stock: None,
        }
    }

    #[test]
    fn test_duplicate_pharmacy_rejected() {
        let err = PlanError::DuplicatePharmacy {
            region: Region::IDF,
            pharmacy_id: "a".to_string(),
        };
        let result = PharmacyTable::new(vec![
            pharmacy("a", Region::IDF, 10.0),
            pharmacy("b", Region::IDF, 10.0),
            pharmacy("a", Region::IDF, 30.0),
        ]);
        assert_eq!(result.unwrap_err().to_string(), err.to_string());

        // the same id in another region is a different pharmacy
        let table = PharmacyTable::new(vec![
            pharmacy("a", Region::IDF, 10.0),
            pharmacy("a", Region::BRE, 10.0),
        ])
        .unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_by_region_keeps_order() {
        let table = PharmacyTable::new(vec![
            pharmacy("b", Region::IDF, 10.0),
            pharmacy("x", Region::BRE, 5.0),
            pharmacy("a", Region::IDF, 20.0),
        ])
        .unwrap();

        let groups = table.by_region();
        let idf: Vec<&str> = groups[&Region::IDF]
            .iter()
            .map(|p| p.pharmacy_id.as_str())
            .collect();
        assert_eq!(idf, vec!["b", "a"]);
        assert_eq!(groups[&Region::BRE].len(), 1);
    }

    #[test]
    fn test_negative_population_rejected() {
        let result = PharmacyTable::new(vec![pharmacy("a", Region::IDF, -1.0)]);
        assert!(matches!(result, Err(PlanError::InvalidData(_))));
    }
}
