//! Region and age-band vocabulary
//!
//! Regions are the 13 metropolitan and 5 overseas French regions identified
//! by their three-letter short code. Raw tables may instead carry the INSEE
//! region code or a department number; both are resolved through static
//! tables.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// French region, ordered by short code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    ARA,
    BFC,
    BRE,
    COR,
    CVL,
    GES,
    GUA,
    GUY,
    HDF,
    IDF,
    MAR,
    MAY,
    NAQ,
    NOR,
    OCC,
    PAC,
    PDL,
    REU,
}

/// Department numbers per region
const DEPARTMENTS: [(Region, &[&str]); 18] = [
    (
        Region::ARA,
        &["01", "03", "07", "15", "26", "38", "42", "43", "63", "69", "73", "74"],
    ),
    (Region::BFC, &["21", "25", "39", "58", "70", "71", "89", "90"]),
    (Region::BRE, &["22", "29", "35", "56"]),
    (Region::COR, &["2A", "2B", "20"]),
    (Region::CVL, &["18", "28", "36", "37", "41", "45"]),
    (
        Region::GES,
        &["08", "10", "51", "52", "54", "55", "57", "67", "68", "88"],
    ),
    (Region::GUA, &["971"]),
    (Region::GUY, &["973"]),
    (Region::HDF, &["02", "59", "60", "62", "80"]),
    (Region::IDF, &["75", "77", "78", "91", "92", "93", "94", "95"]),
    (Region::MAR, &["972"]),
    (Region::MAY, &["976"]),
    (
        Region::NAQ,
        &["16", "17", "19", "23", "24", "33", "40", "47", "64", "79", "86", "87"],
    ),
    (Region::NOR, &["14", "27", "50", "61", "76"]),
    (
        Region::OCC,
        &["09", "11", "12", "30", "31", "32", "34", "46", "48", "65", "66", "81", "82"],
    ),
    (Region::PAC, &["04", "05", "06", "13", "83", "84"]),
    (Region::PDL, &["44", "49", "53", "72", "85"]),
    (Region::REU, &["974"]),
];

impl Region {
    /// All regions in short-code order
    pub const ALL: [Region; 18] = [
        Region::ARA,
        Region::BFC,
        Region::BRE,
        Region::COR,
        Region::CVL,
        Region::GES,
        Region::GUA,
        Region::GUY,
        Region::HDF,
        Region::IDF,
        Region::MAR,
        Region::MAY,
        Region::NAQ,
        Region::NOR,
        Region::OCC,
        Region::PAC,
        Region::PDL,
        Region::REU,
    ];

    /// Three-letter short code
    pub fn code(&self) -> &'static str {
        match self {
            Region::ARA => "ARA",
            Region::BFC => "BFC",
            Region::BRE => "BRE",
            Region::COR => "COR",
            Region::CVL => "CVL",
            Region::GES => "GES",
            Region::GUA => "GUA",
            Region::GUY => "GUY",
            Region::HDF => "HDF",
            Region::IDF => "IDF",
            Region::MAR => "MAR",
            Region::MAY => "MAY",
            Region::NAQ => "NAQ",
            Region::NOR => "NOR",
            Region::OCC => "OCC",
            Region::PAC => "PAC",
            Region::PDL => "PDL",
            Region::REU => "REU",
        }
    }

    /// INSEE region code
    pub fn insee_code(&self) -> u32 {
        match self {
            Region::ARA => 84,
            Region::BFC => 27,
            Region::BRE => 53,
            Region::COR => 94,
            Region::CVL => 24,
            Region::GES => 44,
            Region::GUA => 1,
            Region::GUY => 3,
            Region::HDF => 32,
            Region::IDF => 11,
            Region::MAR => 2,
            Region::MAY => 6,
            Region::NAQ => 75,
            Region::NOR => 28,
            Region::OCC => 76,
            Region::PAC => 93,
            Region::PDL => 52,
            Region::REU => 4,
        }
    }

    /// Look up a short code, case-insensitive
    pub fn from_short_code(code: &str) -> Option<Region> {
        let code = code.trim();
        Region::ALL
            .iter()
            .copied()
            .find(|r| r.code().eq_ignore_ascii_case(code))
    }

    /// Look up an INSEE region code ("11", "011" and "11.0" all match IDF)
    pub fn from_insee(code: &str) -> Option<Region> {
        let number = parse_code_number(code)?;
        Region::ALL.iter().copied().find(|r| r.insee_code() == number)
    }

    /// Look up a department number ("1", "01", "2A", "974", ...)
    pub fn from_department(code: &str) -> Option<Region> {
        let code = code.trim().to_ascii_uppercase();
        let normalized = match parse_code_number(&code) {
            Some(n) if n < 10 => format!("0{}", n),
            Some(n) => n.to_string(),
            None => code,
        };

        DEPARTMENTS
            .iter()
            .find(|(_, departments)| departments.contains(&normalized.as_str()))
            .map(|(region, _)| *region)
    }
}

/// Parse a numeric code that a spreadsheet may have turned into "11.0"
fn parse_code_number(code: &str) -> Option<u32> {
    let code = code.trim();
    let integral = code.strip_suffix(".0").unwrap_or(code);
    integral.parse::<u32>().ok()
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        Region::from_short_code(s).ok_or_else(|| ForecastError::UnmappableRegion(s.to_string()))
    }
}

/// How a source table encodes its region column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionEncoding {
    /// Three-letter short codes (IDF, ARA, ...)
    ShortCode,
    /// Numeric INSEE region codes
    InseeRegion,
    /// Department numbers
    Department,
    /// Short code first, then INSEE region code
    #[default]
    Auto,
}

impl RegionEncoding {
    /// Resolve a raw code, `None` when it has no match
    pub fn resolve(&self, raw: &str) -> Option<Region> {
        match self {
            RegionEncoding::ShortCode => Region::from_short_code(raw),
            RegionEncoding::InseeRegion => Region::from_insee(raw),
            RegionEncoding::Department => Region::from_department(raw),
            RegionEncoding::Auto => {
                Region::from_short_code(raw).or_else(|| Region::from_insee(raw))
            }
        }
    }

    /// Resolve a raw code, failing with `UnmappableRegion`
    pub fn resolve_strict(&self, raw: &str) -> Result<Region> {
        self.resolve(raw)
            .ok_or_else(|| ForecastError::UnmappableRegion(raw.to_string()))
    }
}

/// Coarse demographic bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeBand {
    #[serde(rename = "0-17")]
    Young,
    #[serde(rename = "18-64")]
    Adult,
    #[serde(rename = "65+")]
    Senior,
}

impl AgeBand {
    /// All age bands, youngest first
    pub const ALL: [AgeBand; 3] = [AgeBand::Young, AgeBand::Adult, AgeBand::Senior];

    /// Label used in tables
    pub fn label(&self) -> &'static str {
        match self {
            AgeBand::Young => "0-17",
            AgeBand::Adult => "18-64",
            AgeBand::Senior => "65+",
        }
    }
}

impl fmt::Display for AgeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AgeBand {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        AgeBand::ALL
            .iter()
            .copied()
            .find(|band| band.label() == compact)
            .ok_or_else(|| ForecastError::DataError(format!("Unknown age band: {}", s)))
    }
}

/// Identifies one (region, age band) series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub region: Region,
    pub age_band: AgeBand,
}

impl SeriesKey {
    /// Create a new series key
    pub fn new(region: Region, age_band: AgeBand) -> Self {
        Self { region, age_band }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.age_band)
    }
}
