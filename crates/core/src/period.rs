use std::fmt;

use serde::{Deserialize, Serialize};

/// A reporting period (month/year) as printed on ledger and emission files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    year: u16,
    month: u8,
}

impl Period {
    pub fn new(month: u32, year: u32) -> Option<Self> {
        if !(1..=12).contains(&month) || !(1900..=9999).contains(&year) {
            return None;
        }
        Some(Self { year: year as u16, month: month as u8 })
    }

    /// Parse from separate digit strings, e.g. `("06", "2024")`.
    pub fn from_digits(month: &str, year: &str) -> Option<Self> {
        let month = month.trim().parse().ok()?;
        let year = year.trim().parse().ok()?;
        Self::new(month, year)
    }

    /// Parse the `M/YYYY` form used in emission metadata cells.
    pub fn parse_slashed(raw: &str) -> Option<Self> {
        let (month, year) = raw.trim().split_once('/')?;
        if year.trim().len() != 4 {
            return None;
        }
        Self::from_digits(month, year)
    }

    pub fn month(&self) -> u32 {
        self.month as u32
    }

    pub fn year(&self) -> u32 {
        self.year as u32
    }

    /// Even months carry the bimonthly housing/retirement sub-schema.
    pub fn variant(&self) -> SchemaVariant {
        SchemaVariant::for_month(self.month())
    }

    /// `MM-YYYY`, the form embedded in structured file names.
    pub fn dashed(&self) -> String {
        format!("{:02}-{}", self.month, self.year)
    }

    /// `MM_YYYY`, the form used by reconciliation outputs.
    pub fn underscored(&self) -> String {
        format!("{:02}_{}", self.month, self.year)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

// ---------------------------------------------------------------------------
// Schema variant
// ---------------------------------------------------------------------------

/// Which sub-schemas a period produces. Computed once per period and passed
/// down explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    Monthly,
    MonthlyPlusBimonthly,
}

impl SchemaVariant {
    pub fn for_month(month: u32) -> Self {
        if month % 2 == 0 {
            Self::MonthlyPlusBimonthly
        } else {
            Self::Monthly
        }
    }

    pub fn has_bimonthly(self) -> bool {
        matches!(self, Self::MonthlyPlusBimonthly)
    }

    pub fn sub_schemas(self) -> &'static [SubSchema] {
        match self {
            Self::Monthly => &[SubSchema::Monthly],
            Self::MonthlyPlusBimonthly => &[SubSchema::Monthly, SubSchema::Bimonthly],
        }
    }
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monthly => write!(f, "monthly"),
            Self::MonthlyPlusBimonthly => write!(f, "monthly+bimonthly"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubSchema {
    Monthly,
    Bimonthly,
}

impl fmt::Display for SubSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monthly => write!(f, "monthly"),
            Self::Bimonthly => write!(f, "bimonthly"),
        }
    }
}
