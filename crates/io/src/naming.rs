// Output naming conventions and period detection from file names.

use std::path::Path;
use std::sync::OnceLock;

use confronta_core::{Period, SubSchema};
use regex::Regex;

/// Every kind of workbook the tool writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    /// Structured ledger declaration.
    Declaration,
    /// Structured emission spreadsheet.
    Emission,
    /// Structured emission-viewer export.
    Viewer,
    /// Declaration vs emission.
    Reconciliation,
    /// Declaration vs declaration.
    DeclarationReconciliation,
}

impl Artifact {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Declaration => "CEDULA",
            Self::Emission => "EMISION",
            Self::Viewer => "VISOR_EMISION",
            Self::Reconciliation => "CONFRONTA",
            Self::DeclarationReconciliation => "CONFRONTA_SUAS",
        }
    }

    pub fn sheet_name(self, sub: SubSchema) -> &'static str {
        match (self, sub) {
            (Self::Declaration | Self::DeclarationReconciliation, SubSchema::Monthly) => "SUA_MENSUAL",
            (Self::Declaration | Self::DeclarationReconciliation, SubSchema::Bimonthly) => "SUA_BIMESTRAL",
            (Self::Emission | Self::Viewer, SubSchema::Monthly) => "EMA",
            (Self::Emission | Self::Viewer, SubSchema::Bimonthly) => "EBA",
            (Self::Reconciliation, SubSchema::Monthly) => "MENSUAL",
            (Self::Reconciliation, SubSchema::Bimonthly) => "BIMESTRAL",
        }
    }

    /// File name for this artifact.
    ///
    /// Structuring outputs embed `MM-YYYY` so they can be fed back to the
    /// reconciler; `registration` is `None` for combined (bulk) runs.
    /// Reconciliation outputs use `MM_YYYY`.
    pub fn file_name(self, period: &Period, registration: Option<&str>) -> String {
        match self {
            Self::Declaration | Self::Emission => {
                let scope = registration.map(sanitize).unwrap_or_else(|| "MULTI".to_string());
                format!("{}_{}_{}.xlsx", period.dashed(), scope, self.suffix())
            }
            Self::Viewer => format!("{}_{}.xlsx", period.dashed(), self.suffix()),
            Self::Reconciliation | Self::DeclarationReconciliation => {
                format!("{}_{}.xlsx", period.underscored(), self.suffix())
            }
        }
    }
}

fn sanitize(registration: &str) -> String {
    registration
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn period_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d{2})-(\d{4})").unwrap())
}

/// First `MM-YYYY` in the file name that forms a valid period.
pub fn period_from_file_name(path: &Path) -> Option<Period> {
    let name = path.file_name()?.to_string_lossy();
    period_pattern()
        .captures_iter(&name)
        .find_map(|caps| Period::from_digits(&caps[1], &caps[2]))
}
