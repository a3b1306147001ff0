use std::collections::BTreeMap;
use std::fmt;

use confronta_core::{
    BimonthlyRow, CellMap, Column, MonthlyRow, Period, SchemaVariant, SubSchema, Table, Value,
};
use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One side of a reconciliation: the period plus its typed tables.
#[derive(Debug, Clone, Copy)]
pub struct ReconInput<'a> {
    pub period: Period,
    pub monthly: &'a Table<MonthlyRow>,
    pub bimonthly: Option<&'a Table<BimonthlyRow>>,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Which side(s) a worker appeared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Both,
    LeftOnly,
    RightOnly,
}

/// Written into the observations column when a row has no findings.
pub const NO_DIFFERENCES: &str = "NO DIFFERENCES";

/// Separator between observation codes in the observations column.
pub const OBSERVATION_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Observation {
    MoreDaysInDeclaration,
    MoreDaysInEmission,
    DifferentWage,
    DifferentCreditNumber,
    Differences,
    /// The total delta matches what the declared disability and absence
    /// days would account for.
    ExplainedByDisability,
    NotInEmission,
    NotInDeclaration,
}

impl Observation {
    pub fn code(self) -> &'static str {
        match self {
            Self::MoreDaysInDeclaration => "MORE DAYS IN DECLARATION",
            Self::MoreDaysInEmission => "MORE DAYS IN EMISSION",
            Self::DifferentWage => "DIFFERENT SALARY",
            Self::DifferentCreditNumber => "DIFFERENT CREDIT NUMBER",
            Self::Differences => "DIFFERENCES",
            Self::ExplainedByDisability => "NO DIFFERENCES DUE TO DISABILITY/ABSENCE",
            Self::NotInEmission => "NOT IN EMISSION",
            Self::NotInDeclaration => "NOT IN DECLARATION",
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for Observation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconciledRow {
    /// Join key. Not written to reports.
    pub key: String,
    pub registration: String,
    pub name: String,
    pub disposition: Disposition,
    pub cells: CellMap,
    /// `left - right` for every compared column. Empty unless matched.
    pub deltas: BTreeMap<Column, f64>,
    pub observations: Vec<Observation>,
}

impl ReconciledRow {
    pub fn has(&self, observation: Observation) -> bool {
        self.observations.contains(&observation)
    }

    pub fn delta(&self, column: Column) -> Option<f64> {
        self.deltas.get(&column).copied()
    }

    /// Observation codes joined, or `NO DIFFERENCES` when there are none.
    pub fn observation_text(&self) -> String {
        if self.observations.is_empty() {
            return NO_DIFFERENCES.to_string();
        }
        self.observations
            .iter()
            .map(|o| o.code())
            .collect::<Vec<_>>()
            .join(OBSERVATION_SEPARATOR)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconSummary {
    pub total: usize,
    pub both: usize,
    pub left_only: usize,
    pub right_only: usize,
    /// Matched rows with no observation at all.
    pub clean: usize,
    pub explained: usize,
    pub observation_counts: BTreeMap<String, usize>,
}

/// Reconciled rows of one sub-schema.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub sub_schema: SubSchema,
    /// Output column order. Always ends with the observations column.
    pub columns: Vec<Column>,
    pub rows: Vec<ReconciledRow>,
    pub summary: ReconSummary,
}

impl Reconciliation {
    /// Row cells in column order, observations rendered as text.
    pub fn cells(&self, row: &ReconciledRow) -> Vec<Value> {
        self.columns
            .iter()
            .map(|c| match c {
                Column::Observations => Value::Text(row.observation_text()),
                other => row.cells.get(other).cloned().unwrap_or_default(),
            })
            .collect()
    }

    pub fn find(&self, key: &str) -> Option<&ReconciledRow> {
        self.rows.iter().find(|r| r.key == key)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconOutput {
    pub period: Period,
    pub variant: SchemaVariant,
    pub monthly: Reconciliation,
    pub bimonthly: Option<Reconciliation>,
}

impl ReconOutput {
    pub fn sub_schemas(&self) -> impl Iterator<Item = &Reconciliation> {
        std::iter::once(&self.monthly).chain(self.bimonthly.as_ref())
    }
}
