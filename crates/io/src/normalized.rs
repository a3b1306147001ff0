use std::path::{Path, PathBuf};

use confronta_config::Settings;
use confronta_core::{BimonthlyRow, MonthlyRow, Period, SchemaVariant, SubSchema, Table};

use crate::error::SourceError;
use crate::naming::Artifact;
use crate::report::{self, HeaderStyle, Sheet};

/// One structured source (or a combined batch of them): a period plus the
/// tables its schema variant calls for.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub period: Period,
    pub variant: SchemaVariant,
    /// `None` for combined batches.
    pub registration: Option<String>,
    pub monthly: Table<MonthlyRow>,
    /// Present exactly when `variant` has a bimonthly sub-schema.
    pub bimonthly: Option<Table<BimonthlyRow>>,
    /// Records dropped by per-record decode failures.
    pub skipped_records: usize,
}

impl Normalized {
    pub fn row_count(&self) -> usize {
        self.monthly.len() + self.bimonthly.as_ref().map_or(0, Table::len)
    }

    /// Drop idle and duplicate rows, then sort. Applied once per structured
    /// source and again after a batch is combined.
    pub fn finish(&mut self) {
        let idle = self.monthly.drop_idle();
        let dupes = self.monthly.dedup_exact();
        self.monthly.sort_by_registration_and_name();
        if idle + dupes > 0 {
            log::debug!("monthly: dropped {idle} idle and {dupes} duplicate rows");
        }
        if let Some(bimonthly) = self.bimonthly.as_mut() {
            bimonthly.drop_idle();
            bimonthly.dedup_exact();
            bimonthly.sort_by_registration_and_name();
        }
    }

    /// Append another source's rows. The receiver's period and variant win.
    pub fn absorb(&mut self, other: Normalized) {
        if other.period != self.period {
            log::warn!(
                "combining period {} into batch for {}; keeping {}",
                other.period,
                self.period,
                self.period
            );
        }
        self.monthly.append(other.monthly);
        match (self.bimonthly.as_mut(), other.bimonthly) {
            (Some(mine), Some(theirs)) => mine.append(theirs),
            (None, Some(theirs)) if !theirs.is_empty() => {
                log::warn!("ignoring {} bimonthly rows: batch period {} is monthly only", theirs.len(), self.period);
            }
            _ => {}
        }
        self.skipped_records += other.skipped_records;
        self.registration = None;
    }

    pub fn sheets(&self, artifact: Artifact) -> Vec<Sheet> {
        let mut sheets = vec![Sheet::from_table(artifact.sheet_name(SubSchema::Monthly), &self.monthly)];
        if let Some(bimonthly) = &self.bimonthly {
            sheets.push(Sheet::from_table(artifact.sheet_name(SubSchema::Bimonthly), bimonthly));
        }
        sheets
    }

    /// Write as `artifact` into `out_dir` under the conventional name.
    pub fn write(&self, artifact: Artifact, out_dir: &Path, settings: &Settings) -> Result<PathBuf, SourceError> {
        if self.monthly.is_empty() {
            return Err(SourceError::Empty(format!("period {} has no monthly rows", self.period)));
        }
        let palettes = &settings.report.palettes;
        let style = match artifact {
            Artifact::Declaration => HeaderStyle::from_palette(&palettes.declaration, false)?,
            Artifact::Emission => HeaderStyle::from_palette(&palettes.emission, true)?,
            Artifact::Viewer => HeaderStyle::from_palette(&palettes.viewer, false)?,
            Artifact::Reconciliation | Artifact::DeclarationReconciliation => {
                HeaderStyle::from_palette(&palettes.reconciliation, false)?
            }
        };
        let path = out_dir.join(artifact.file_name(&self.period, self.registration.as_deref()));
        report::write_workbook(&path, &self.sheets(artifact), &style, &settings.report)
    }
}
