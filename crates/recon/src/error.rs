use std::fmt;

use confronta_core::{Column, Period};

#[derive(Debug, Clone, PartialEq)]
pub enum ReconError {
    /// The two inputs cover different periods.
    PeriodMismatch { left: Period, right: Period },
    /// The inputs do not carry the same sub-schemas (e.g. only one side has a
    /// bimonthly table for an even month).
    SchemaMismatch(String),
    /// A table lacks a column every comparison needs.
    MissingColumn { side: String, column: Column },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeriodMismatch { left, right } => {
                write!(f, "inputs are for different periods: {left} vs {right}")
            }
            Self::SchemaMismatch(msg) => write!(f, "schema mismatch: {msg}"),
            Self::MissingColumn { side, column } => {
                write!(f, "{side} table: missing column '{column}'")
            }
        }
    }
}

impl std::error::Error for ReconError {}
