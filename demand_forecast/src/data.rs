//! Source-table ingestion
//!
//! Each input table is described by a declared [`SourceSchema`]. The file is
//! read with polars, the declared columns are checked once, and every row is
//! parsed into a typed [`Observation`]. Rows that cannot be parsed are skipped
//! and counted; rows whose region cannot be mapped are excluded with a warning.

use crate::error::{ForecastError, Result};
use crate::region::{AgeBand, Region, RegionEncoding};
use crate::utils::{parse_month, parse_number};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Declared layout of one source table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSchema {
    /// Table name used in messages
    pub table: String,
    /// Date column, `None` for static tables
    #[serde(default)]
    pub date_column: Option<String>,
    /// Region column
    pub region_column: String,
    /// Age-band column, `None` for region-level tables
    #[serde(default)]
    pub age_band_column: Option<String>,
    /// Value columns, in the order they are returned
    pub value_columns: Vec<String>,
    #[serde(default)]
    pub region_encoding: RegionEncoding,
}

impl SourceSchema {
    /// Doses administered per month, region and age band
    pub fn doses() -> Self {
        Self::keyed("doses", Some("date"), Some("age_band"), &["doses"])
    }

    /// Static population per region and age band
    pub fn population() -> Self {
        Self::keyed("population", None, Some("age_band"), &["population"])
    }

    /// Regional incidence rate
    pub fn incidence() -> Self {
        Self::keyed("incidence", Some("date"), None, &["incidence_per_100k"])
    }

    /// Regional mean temperature
    pub fn temperature() -> Self {
        Self::keyed("temperature", Some("date"), None, &["tmean"])
    }

    /// Emergency visits and admissions per region and age band
    pub fn emergency() -> Self {
        Self::keyed(
            "emergency",
            Some("date"),
            Some("age_band"),
            &["er_visits", "admissions"],
        )
    }

    fn keyed(table: &str, date: Option<&str>, age_band: Option<&str>, values: &[&str]) -> Self {
        Self {
            table: table.to_string(),
            date_column: date.map(str::to_string),
            region_column: "region".to_string(),
            age_band_column: age_band.map(str::to_string),
            value_columns: values.iter().map(|v| v.to_string()).collect(),
            region_encoding: RegionEncoding::Auto,
        }
    }

    /// Every column the table must carry
    pub fn required_columns(&self) -> Vec<&str> {
        let mut columns = Vec::with_capacity(self.value_columns.len() + 3);
        if let Some(date) = &self.date_column {
            columns.push(date.as_str());
        }
        columns.push(self.region_column.as_str());
        if let Some(age) = &self.age_band_column {
            columns.push(age.as_str());
        }
        columns.extend(self.value_columns.iter().map(String::as_str));
        columns
    }
}

/// One parsed row of a source table
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// Month start, `None` for static tables
    pub date: Option<NaiveDate>,
    pub region: Region,
    pub age_band: Option<AgeBand>,
    /// One entry per declared value column
    pub values: Vec<Option<f64>>,
}

/// A source table after parsing
#[derive(Debug, Clone)]
pub struct SourceTable {
    schema: SourceSchema,
    records: Vec<SourceRecord>,
    /// Rows dropped for an unparseable date or age band
    skipped: usize,
    /// Rows dropped for an unmappable region
    unmapped: usize,
}

/// One measurement of one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub region: Region,
    pub age_band: Option<AgeBand>,
    pub value: f64,
}

/// Static population of a (region, age band)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PopulationRecord {
    pub region: Region,
    pub age_band: AgeBand,
    pub population: f64,
}

/// Loader for source tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a source table from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, schema: &SourceSchema) -> Result<SourceTable> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ForecastError::FileNotFound(path.to_path_buf()));
        }

        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        let table = Self::from_dataframe(df, schema)?;
        info!(
            table = %schema.table,
            path = %path.display(),
            rows = table.records.len(),
            skipped = table.skipped,
            unmapped = table.unmapped,
            "loaded source table"
        );
        Ok(table)
    }

    /// Parse an existing DataFrame against a declared schema
    pub fn from_dataframe(df: DataFrame, schema: &SourceSchema) -> Result<SourceTable> {
        let names = df.get_column_names();
        for column in schema.required_columns() {
            if !names.contains(&column) {
                return Err(ForecastError::MissingInputColumn {
                    table: schema.table.clone(),
                    column: column.to_string(),
                });
            }
        }

        let dates = match &schema.date_column {
            Some(name) => Some(Self::string_column(&df, name)?),
            None => None,
        };
        let regions = Self::string_column(&df, &schema.region_column)?;
        let ages = match &schema.age_band_column {
            Some(name) => Some(Self::string_column(&df, name)?),
            None => None,
        };
        let values = schema
            .value_columns
            .iter()
            .map(|name| Self::string_column(&df, name))
            .collect::<Result<Vec<_>>>()?;

        let mut records = Vec::with_capacity(df.height());
        let mut skipped = 0;
        let mut unmapped = 0;

        for i in 0..df.height() {
            let Some(raw_region) = regions[i].as_deref() else {
                skipped += 1;
                continue;
            };
            let Some(region) = schema.region_encoding.resolve(raw_region) else {
                warn!(table = %schema.table, code = raw_region, "unmappable region, row excluded");
                unmapped += 1;
                continue;
            };

            let date = match &dates {
                Some(column) => match column[i].as_deref().and_then(parse_month) {
                    Some(date) => Some(date),
                    None => {
                        skipped += 1;
                        continue;
                    }
                },
                None => None,
            };

            let age_band = match &ages {
                Some(column) => match column[i].as_deref() {
                    Some(raw_band) => match raw_band.parse::<AgeBand>() {
                        Ok(band) => Some(band),
                        Err(_) => {
                            warn!(table = %schema.table, code = raw_band, "unmappable age band, row excluded");
                            unmapped += 1;
                            continue;
                        }
                    },
                    None => {
                        skipped += 1;
                        continue;
                    }
                },
                None => None,
            };

            let row_values = values
                .iter()
                .map(|column| column[i].as_deref().and_then(parse_number))
                .collect();

            records.push(SourceRecord {
                date,
                region,
                age_band,
                values: row_values,
            });
        }

        if skipped > 0 {
            warn!(table = %schema.table, skipped, "rows with unparseable date or missing age band skipped");
        }

        Ok(SourceTable {
            schema: schema.clone(),
            records,
            skipped,
            unmapped,
        })
    }

    /// Read a column as optional strings, whatever dtype polars inferred
    fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
        let series = df.column(name)?.cast(&DataType::Utf8)?;
        let values = series
            .utf8()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();
        Ok(values)
    }
}

impl SourceTable {
    /// Schema the table was parsed with
    pub fn schema(&self) -> &SourceSchema {
        &self.schema
    }

    /// Parsed rows
    pub fn records(&self) -> &[SourceRecord] {
        &self.records
    }

    /// Rows dropped for an unparseable date or a missing age band
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Rows dropped for an unmappable region or age band
    pub fn unmapped(&self) -> usize {
        self.unmapped
    }

    fn value_index(&self, column: &str) -> Result<usize> {
        self.schema
            .value_columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| ForecastError::MissingInputColumn {
                table: self.schema.table.clone(),
                column: column.to_string(),
            })
    }

    /// Dated observations of one value column; rows without a value are dropped
    pub fn observations(&self, column: &str) -> Result<Vec<Observation>> {
        let index = self.value_index(column)?;
        let observations: Vec<Observation> = self
            .records
            .iter()
            .filter_map(|r| {
                Some(Observation {
                    date: r.date?,
                    region: r.region,
                    age_band: r.age_band,
                    value: r.values[index]?,
                })
            })
            .collect();

        debug!(
            table = %self.schema.table,
            column,
            kept = observations.len(),
            "extracted observations"
        );
        Ok(observations)
    }

    /// Population rows of a static table; rows without an age band or a
    /// population value are dropped with a warning
    pub fn population(&self, column: &str) -> Result<Vec<PopulationRecord>> {
        let index = self.value_index(column)?;
        let mut records = Vec::with_capacity(self.records.len());
        for r in &self.records {
            match (r.age_band, r.values[index]) {
                (Some(age_band), Some(population)) => records.push(PopulationRecord {
                    region: r.region,
                    age_band,
                    population,
                }),
                (None, _) => {
                    warn!(table = %self.schema.table, region = %r.region, "population row without age band excluded")
                }
                (Some(age_band), None) => {
                    warn!(table = %self.schema.table, region = %r.region, age_band = %age_band, "population row without value excluded")
                }
            }
        }
        Ok(records)
    }
}

/// A source file and its declared layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub path: PathBuf,
    #[serde(flatten)]
    pub schema: SourceSchema,
}

impl SourceSpec {
    /// Load the table
    pub fn load(&self) -> Result<SourceTable> {
        DataLoader::from_csv(&self.path, &self.schema)
    }
}

/// Input files of a forecasting run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSources {
    pub doses: SourceSpec,
    #[serde(default)]
    pub population: Option<SourceSpec>,
    #[serde(default)]
    pub incidence: Option<SourceSpec>,
    #[serde(default)]
    pub temperature: Option<SourceSpec>,
    #[serde(default)]
    pub emergency: Option<SourceSpec>,
}

impl InputSources {
    /// Default layout with every table under `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        let spec = |file: &str, schema: SourceSchema| SourceSpec {
            path: dir.join(file),
            schema,
        };
        Self {
            doses: spec("doses.csv", SourceSchema::doses()),
            population: Some(spec("population.csv", SourceSchema::population())),
            incidence: Some(spec("incidence.csv", SourceSchema::incidence())),
            temperature: Some(spec("temperature.csv", SourceSchema::temperature())),
            emergency: Some(spec("emergency.csv", SourceSchema::emergency())),
        }
    }

    /// Load every configured table
    pub fn load(&self) -> Result<RawInputs> {
        let doses = self.doses.load()?;
        let first_value = |spec: &SourceSpec| -> Result<String> {
            spec.schema.value_columns.first().cloned().ok_or_else(|| {
                ForecastError::ValidationError(format!(
                    "{} table declares no value column",
                    spec.schema.table
                ))
            })
        };

        let mut inputs = RawInputs {
            doses: doses.observations(&first_value(&self.doses)?)?,
            ..Default::default()
        };

        if let Some(spec) = &self.population {
            inputs.population = spec.load()?.population(&first_value(spec)?)?;
        }
        if let Some(spec) = &self.incidence {
            inputs.incidence = spec.load()?.observations(&first_value(spec)?)?;
        }
        if let Some(spec) = &self.temperature {
            inputs.temperature = spec.load()?.observations(&first_value(spec)?)?;
        }
        if let Some(spec) = &self.emergency {
            let table = spec.load()?;
            let columns = &spec.schema.value_columns;
            if columns.len() < 2 {
                return Err(ForecastError::ValidationError(
                    "emergency table must declare visit and admission columns".to_string(),
                ));
            }
            inputs.er_visits = table.observations(&columns[0])?;
            inputs.admissions = table.observations(&columns[1])?;
        }

        Ok(inputs)
    }
}

/// Typed observations of every source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInputs {
    pub doses: Vec<Observation>,
    pub population: Vec<PopulationRecord>,
    pub incidence: Vec<Observation>,
    pub temperature: Vec<Observation>,
    pub er_visits: Vec<Observation>,
    pub admissions: Vec<Observation>,
}
