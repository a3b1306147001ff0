// Headless entry functions.
//
// Each one structures or reconciles, writes its workbook into the output
// folder and reports back a path (or `None`) plus a one-line message. No
// printing happens here; the binary decides what to show.

use std::fmt;
use std::path::{Path, PathBuf};

use confronta_config::{self as config, ConfigError, Settings};
use confronta_core::SubSchema;
use confronta_io::collect::SkippedFile;
use confronta_io::report::HeaderStyle;
use confronta_io::viewer::PERIOD_FILE;
use confronta_io::{
    collect_emissions, collect_ledgers, read_normalized, structure_emission, structure_ledger, write_csv,
    write_workbook, Artifact, Collected, Normalized, Sheet, SourceError,
};
use confronta_recon::{Profile, RateBasis, ReconError, ReconInput, ReconOutput, ReconParams, Reconciliation};
use serde::Serialize;

use crate::exit_codes::{recon_exit_code, source_exit_code, EXIT_SUCCESS, EXIT_USAGE};

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum OpError {
    Source(SourceError),
    Recon(ReconError),
    Config(ConfigError),
}

impl fmt::Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(e) => write!(f, "{e}"),
            Self::Recon(e) => write!(f, "{e}"),
            Self::Config(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for OpError {}

impl From<SourceError> for OpError {
    fn from(e: SourceError) -> Self {
        Self::Source(e)
    }
}

impl From<ReconError> for OpError {
    fn from(e: ReconError) -> Self {
        Self::Recon(e)
    }
}

impl From<ConfigError> for OpError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl OpError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Source(e) => source_exit_code(e),
            Self::Recon(e) => recon_exit_code(e),
            Self::Config(_) => EXIT_USAGE,
        }
    }
}

/// Terminal result of an entry function. `path` is `None` exactly when
/// nothing was written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub path: Option<PathBuf>,
    pub message: String,
    pub exit_code: u8,
    /// Files skipped in a bulk run, with the reason.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<Skipped>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: String,
}

impl From<&SkippedFile> for Skipped {
    fn from(s: &SkippedFile) -> Self {
        Self { path: s.path.clone(), reason: s.reason.clone() }
    }
}

impl Outcome {
    pub fn written(path: PathBuf, message: impl Into<String>) -> Self {
        Self { path: Some(path), message: message.into(), exit_code: EXIT_SUCCESS, skipped: Vec::new() }
    }

    pub fn failed(err: &OpError) -> Self {
        Self { path: None, message: err.to_string(), exit_code: err.exit_code(), skipped: Vec::new() }
    }

    pub fn is_success(&self) -> bool {
        self.path.is_some()
    }

    fn with_skipped(mut self, skipped: &[SkippedFile]) -> Self {
        self.skipped = skipped.iter().map(Skipped::from).collect();
        self
    }
}

fn finish(result: Result<Outcome, OpError>) -> Outcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("{e}");
            Outcome::failed(&e)
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Engine parameters from the settings file.
pub fn params_from_settings(settings: &Settings, profile: Profile) -> ReconParams {
    ReconParams {
        snap: settings.tolerance.snap,
        disability_band: settings.tolerance.disability_band,
        bimonthly_rate_basis: match settings.reconcile.bimonthly_rate_basis {
            config::RateBasis::Rcv => RateBasis::Rcv,
            config::RateBasis::Ceav => RateBasis::Ceav,
        },
        fee_difference_flags_total: settings.reconcile.fee_difference_flags_total,
        profile,
    }
}

// ---------------------------------------------------------------------------
// Structuring
// ---------------------------------------------------------------------------

fn describe(normalized: &Normalized) -> String {
    let mut text = format!("{} monthly rows", normalized.monthly.len());
    if let Some(b) = &normalized.bimonthly {
        text.push_str(&format!(", {} bimonthly rows", b.len()));
    }
    if normalized.skipped_records > 0 {
        text.push_str(&format!(", {} records skipped", normalized.skipped_records));
    }
    text
}

fn skipped_note(skipped: &[SkippedFile]) -> String {
    match skipped.len() {
        0 => String::new(),
        1 => "; 1 file skipped".to_string(),
        n => format!("; {n} files skipped"),
    }
}

fn write_structured(normalized: &Normalized, artifact: Artifact, out: &Path, settings: &Settings) -> Result<Outcome, OpError> {
    let path = normalized.write(artifact, out, settings)?;
    let name = file_name(&path);
    Ok(Outcome::written(path, format!("wrote {name} ({}) for {}", describe(normalized), normalized.period)))
}

fn write_collected(collected: &Collected, artifact: Artifact, out: &Path, settings: &Settings) -> Result<Outcome, OpError> {
    let path = collected.normalized.write(artifact, out, settings)?;
    let message = format!(
        "wrote {} ({}) from {} files{}",
        file_name(&path),
        describe(&collected.normalized),
        collected.files.len(),
        skipped_note(&collected.skipped)
    );
    Ok(Outcome::written(path, message).with_skipped(&collected.skipped))
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn require_exists(path: &Path) -> Result<(), OpError> {
    if path.exists() {
        Ok(())
    } else {
        Err(SourceError::Validation(format!("{} does not exist", path.display())).into())
    }
}

/// Structure one `.SUA` ledger, or every ledger under a folder into one
/// combined declaration.
pub fn structure_declarations(source: &Path, out: &Path, settings: &Settings) -> Outcome {
    finish((|| -> Result<Outcome, OpError> {
        require_exists(source)?;
        if source.is_dir() {
            let collected = collect_ledgers(source, settings)?;
            write_collected(&collected, Artifact::Declaration, out, settings)
        } else {
            let normalized = structure_ledger(source, settings)?;
            write_structured(&normalized, Artifact::Declaration, out, settings)
        }
    })())
}

/// Structure one emission workbook, or every workbook under a folder.
pub fn structure_emissions(source: &Path, out: &Path, settings: &Settings) -> Outcome {
    finish((|| -> Result<Outcome, OpError> {
        require_exists(source)?;
        if source.is_dir() {
            let collected = collect_emissions(source, settings)?;
            write_collected(&collected, Artifact::Emission, out, settings)
        } else {
            let normalized = structure_emission(source, settings)?;
            write_structured(&normalized, Artifact::Emission, out, settings)
        }
    })())
}

/// Structure an emission-viewer export folder.
pub fn structure_viewer(folder: &Path, out: &Path, settings: &Settings) -> Outcome {
    finish((|| -> Result<Outcome, OpError> {
        let normalized = confronta_io::structure_viewer(folder, settings)?;
        write_structured(&normalized, Artifact::Viewer, out, settings)
    })())
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

fn input(normalized: &Normalized) -> ReconInput<'_> {
    ReconInput {
        period: normalized.period,
        monthly: &normalized.monthly,
        bimonthly: normalized.bimonthly.as_ref(),
    }
}

/// Reconcile two structured sources held in memory.
pub fn reconcile_normalized(
    left: &Normalized,
    right: &Normalized,
    profile: Profile,
    settings: &Settings,
) -> Result<ReconOutput, OpError> {
    let params = params_from_settings(settings, profile);
    Ok(confronta_recon::run(&input(left), &input(right), &params)?)
}

/// Reconcile two structured workbooks read from disk.
pub fn reconcile_files(left: &Path, right: &Path, profile: Profile, settings: &Settings) -> Result<ReconOutput, OpError> {
    require_exists(left)?;
    require_exists(right)?;
    let left = read_normalized(left)?;
    let right = read_normalized(right)?;
    reconcile_normalized(&left, &right, profile, settings)
}

/// Which workbook a profile's result is written as.
pub fn artifact_for(profile: Profile) -> Artifact {
    match profile {
        Profile::DeclarationVsEmission => Artifact::Reconciliation,
        Profile::Declarations => Artifact::DeclarationReconciliation,
    }
}

pub fn reconciliation_sheet(name: &str, recon: &Reconciliation) -> Sheet {
    Sheet {
        name: name.to_string(),
        headers: recon.columns.iter().map(|c| c.header().to_string()).collect(),
        rows: recon.rows.iter().map(|r| recon.cells(r)).collect(),
    }
}

pub fn reconciliation_sheets(output: &ReconOutput, artifact: Artifact) -> Vec<Sheet> {
    output
        .sub_schemas()
        .map(|r| reconciliation_sheet(artifact.sheet_name(r.sub_schema), r))
        .collect()
}

/// Write a reconciliation workbook into `out`.
pub fn write_reconciliation(
    output: &ReconOutput,
    profile: Profile,
    out: &Path,
    settings: &Settings,
) -> Result<PathBuf, OpError> {
    let artifact = artifact_for(profile);
    let style = HeaderStyle::from_palette(&settings.report.palettes.reconciliation, false)?;
    let path = out.join(artifact.file_name(&output.period, None));
    Ok(write_workbook(&path, &reconciliation_sheets(output, artifact), &style, &settings.report)?)
}

/// Export each reconciliation sheet as `<dir>/<SHEET>.csv`.
pub fn export_csv(output: &ReconOutput, profile: Profile, dir: &Path) -> Result<Vec<PathBuf>, OpError> {
    std::fs::create_dir_all(dir).map_err(|e| SourceError::write(dir, e))?;
    let mut written = Vec::new();
    for sheet in reconciliation_sheets(output, artifact_for(profile)) {
        let path = dir.join(format!("{}.csv", sheet.name));
        written.push(write_csv(&path, &sheet)?);
    }
    Ok(written)
}

fn recon_message(path: &Path, output: &ReconOutput) -> String {
    let mut parts = Vec::new();
    for r in output.sub_schemas() {
        let s = &r.summary;
        let label = match r.sub_schema {
            SubSchema::Monthly => "monthly",
            SubSchema::Bimonthly => "bimonthly",
        };
        parts.push(format!(
            "{label}: {} rows, {} clean, {} only left, {} only right",
            s.total, s.clean, s.left_only, s.right_only
        ));
    }
    format!("wrote {} for {} ({})", file_name(path), output.period, parts.join("; "))
}

/// Reconcile two structured workbooks under `profile`, write the result into
/// `out` and, when `csv_dir` is given, export each sheet there as CSV too.
pub fn reconcile_with(
    left: &Path,
    right: &Path,
    out: &Path,
    profile: Profile,
    csv_dir: Option<&Path>,
    settings: &Settings,
) -> Outcome {
    finish((|| -> Result<Outcome, OpError> {
        let output = reconcile_files(left, right, profile, settings)?;
        let path = write_reconciliation(&output, profile, out, settings)?;
        let mut message = recon_message(&path, &output);
        if let Some(dir) = csv_dir {
            let written = export_csv(&output, profile, dir)?;
            message.push_str(&format!("; {} CSV files in {}", written.len(), dir.display()));
        }
        Ok(Outcome::written(path, message))
    })())
}

/// Reconcile a structured declaration against a structured emission.
pub fn reconcile(declaration: &Path, emission: &Path, out: &Path, settings: &Settings) -> Outcome {
    reconcile_with(declaration, emission, out, Profile::DeclarationVsEmission, None, settings)
}

/// Reconcile two structured declarations of the same period.
pub fn reconcile_declarations(left: &Path, right: &Path, out: &Path, settings: &Settings) -> Outcome {
    reconcile_with(left, right, out, Profile::Declarations, None, settings)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// What a path given to [`run`] turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Ledger,
    LedgerFolder,
    EmissionWorkbook,
    EmissionFolder,
    ViewerFolder,
    /// A workbook this tool wrote earlier.
    Structured,
}

fn is_structured_name(path: &Path) -> bool {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_uppercase())
        .unwrap_or_default();
    confronta_io::period_from_file_name(path).is_some()
        && [Artifact::Declaration, Artifact::Emission, Artifact::Viewer]
            .iter()
            .any(|a| stem.ends_with(a.suffix()))
}

/// Classify a declaration-side source.
pub fn declaration_kind(path: &Path) -> SourceKind {
    if path.is_dir() {
        SourceKind::LedgerFolder
    } else if is_structured_name(path) {
        SourceKind::Structured
    } else {
        SourceKind::Ledger
    }
}

/// Classify an emission-side source. A folder holding the viewer's period
/// file is a viewer export.
pub fn emission_kind(path: &Path) -> SourceKind {
    if path.is_dir() {
        if path.join(PERIOD_FILE).is_file() {
            SourceKind::ViewerFolder
        } else {
            SourceKind::EmissionFolder
        }
    } else if is_structured_name(path) {
        SourceKind::Structured
    } else {
        SourceKind::EmissionWorkbook
    }
}

struct Side {
    normalized: Normalized,
    written: Option<PathBuf>,
    skipped: Vec<SkippedFile>,
}

fn load_side(path: &Path, kind: SourceKind, out: &Path, settings: &Settings) -> Result<Side, OpError> {
    require_exists(path)?;
    let (normalized, skipped, artifact) = match kind {
        SourceKind::Structured => {
            return Ok(Side { normalized: read_normalized(path)?, written: None, skipped: Vec::new() })
        }
        SourceKind::Ledger => (structure_ledger(path, settings)?, Vec::new(), Artifact::Declaration),
        SourceKind::EmissionWorkbook => (structure_emission(path, settings)?, Vec::new(), Artifact::Emission),
        SourceKind::ViewerFolder => (confronta_io::structure_viewer(path, settings)?, Vec::new(), Artifact::Viewer),
        SourceKind::LedgerFolder => {
            let c = collect_ledgers(path, settings)?;
            (c.normalized, c.skipped, Artifact::Declaration)
        }
        SourceKind::EmissionFolder => {
            let c = collect_emissions(path, settings)?;
            (c.normalized, c.skipped, Artifact::Emission)
        }
    };
    let written = normalized.write(artifact, out, settings)?;
    log::info!("{:?} {} -> {}", kind, path.display(), written.display());
    Ok(Side { normalized, written: Some(written), skipped })
}

/// Structure both sides as needed, write the structured workbooks, then
/// reconcile. Either side may be a single file or a folder; the emission
/// side may also be a viewer export folder or a structured workbook.
pub fn run(declaration: &Path, emission: &Path, out: &Path, settings: &Settings) -> Outcome {
    finish((|| -> Result<Outcome, OpError> {
        let left = load_side(declaration, declaration_kind(declaration), out, settings)?;
        let right = load_side(emission, emission_kind(emission), out, settings)?;
        let output = reconcile_normalized(&left.normalized, &right.normalized, Profile::DeclarationVsEmission, settings)?;
        let path = write_reconciliation(&output, Profile::DeclarationVsEmission, out, settings)?;

        let mut message = recon_message(&path, &output);
        let intermediates: Vec<String> = [&left.written, &right.written]
            .into_iter()
            .flatten()
            .map(|p| file_name(p))
            .collect();
        if !intermediates.is_empty() {
            message.push_str(&format!("; structured {}", intermediates.join(", ")));
        }
        let mut skipped = left.skipped;
        skipped.extend(right.skipped);
        message.push_str(&skipped_note(&skipped));
        Ok(Outcome::written(path, message).with_skipped(&skipped))
    })())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_follow_settings() {
        let mut settings = Settings::default();
        settings.tolerance.disability_band = 1.25;
        settings.reconcile.bimonthly_rate_basis = config::RateBasis::Ceav;
        let p = params_from_settings(&settings, Profile::Declarations);
        assert_eq!(p.disability_band, 1.25);
        assert_eq!(p.snap, 1e-10);
        assert_eq!(p.bimonthly_rate_basis, RateBasis::Ceav);
        assert_eq!(p.profile, Profile::Declarations);
    }

    #[test]
    fn structured_names_are_recognized() {
        assert!(is_structured_name(Path::new("/x/03-2024_Y5412345105_CEDULA.xlsx")));
        assert!(is_structured_name(Path::new("03-2024_MULTI_EMISION.xlsx")));
        assert!(is_structured_name(Path::new("04-2024_VISOR_EMISION.xlsx")));
        assert!(!is_structured_name(Path::new("emision_marzo.xlsx")));
        assert!(!is_structured_name(Path::new("03-2024_raw.xlsx")));
    }

    #[test]
    fn missing_source_is_a_validation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = structure_declarations(&dir.path().join("nope.SUA"), dir.path(), &Settings::default());
        assert_eq!(outcome.path, None);
        assert_eq!(outcome.exit_code, crate::exit_codes::EXIT_VALIDATION);
        assert!(outcome.message.contains("does not exist"));
    }

    #[test]
    fn outcome_json_omits_empty_skips() {
        let outcome = Outcome::written(PathBuf::from("a.xlsx"), "wrote a.xlsx");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["path"], "a.xlsx");
        assert!(json.get("skipped").is_none());
    }
}
