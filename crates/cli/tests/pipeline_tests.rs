// Pipeline tests: raw ledgers and emission workbooks through the headless
// entry functions, checking written workbooks and outcomes.
// Run with: cargo test -p confronta-cli --test pipeline_tests

mod common;

use std::path::Path;

use common::*;
use confronta_cli::exit_codes::{EXIT_NO_ROWS, EXIT_SUCCESS, EXIT_VALIDATION};
use confronta_cli::ops::{reconcile_files, reconcile_with};
use confronta_cli::{reconcile, reconcile_declarations, run, structure_declarations, structure_emissions};
use confronta_config::Settings;
use confronta_recon::{Disposition, Profile};
use tempfile::TempDir;

const JUAN: &str = "12345678901";
const ANA: &str = "00098765432";
const LUIS: &str = "55555555555";

fn key(nss: &str) -> String {
    format!("{RP}_{nss}")
}

fn fees(cf: f64) -> Vec<f64> {
    let mut v = vec![0.0; 11];
    v[0] = cf;
    v
}

fn juan() -> LedgerWorker {
    LedgerWorker { cf: 100.0, ..LedgerWorker::new(JUAN, "JUAN PEREZ", 30, 500.0) }
}

fn ana() -> LedgerWorker {
    LedgerWorker { cf: 90.0, ..LedgerWorker::new(ANA, "ANA RUIZ", 30, 350.0) }
}

/// March ledger with Juan and Ana.
fn march_ledger(dir: &Path) -> std::path::PathBuf {
    write_ledger(dir, "in/Y54.SUA", 3, 2024, &[juan(), ana()])
}

/// March emission with Juan (identical) and Luis (emission only).
fn march_emission(dir: &Path, period: &str) -> std::path::PathBuf {
    write_emission(
        &dir.join("in/emision.xlsx"),
        period,
        &[
            Movement::new(JUAN, "JUAN PEREZ", "01/03/2024", 30, 500.0, &fees(100.0)),
            Movement::new(LUIS, "LUIS GOMEZ", "01/03/2024", 30, 400.0, &fees(80.0)),
        ],
        None,
    )
}

#[test]
fn run_structures_both_sides_and_reconciles() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let settings = Settings::default();

    let outcome = run(&march_ledger(dir.path()), &march_emission(dir.path(), "3/2024"), &out, &settings);
    assert!(outcome.is_success(), "{}", outcome.message);
    assert_eq!(outcome.exit_code, EXIT_SUCCESS);
    assert_eq!(outcome.path.as_deref(), Some(out.join("03_2024_CONFRONTA.xlsx").as_path()));
    assert!(outcome.message.contains("1 only left"), "{}", outcome.message);
    assert!(outcome.message.contains("1 only right"), "{}", outcome.message);

    let declaration = out.join("03-2024_Y5412345105_CEDULA.xlsx");
    let emission = out.join("03-2024_Y5412345105_EMISION.xlsx");
    assert!(declaration.is_file());
    assert!(emission.is_file());
    assert!(out.join("03_2024_CONFRONTA.xlsx").is_file());

    // The structured intermediates reconcile to the same result.
    let output = reconcile_files(&declaration, &emission, Profile::DeclarationVsEmission, &settings).unwrap();
    assert!(output.bimonthly.is_none());
    let monthly = &output.monthly;
    assert_eq!(monthly.rows.len(), 3);
    assert_eq!(monthly.find(&key(JUAN)).unwrap().observation_text(), "NO DIFFERENCES");
    assert_eq!(monthly.find(&key(ANA)).unwrap().observation_text(), "NOT IN EMISSION");
    assert_eq!(monthly.find(&key(LUIS)).unwrap().observation_text(), "NOT IN DECLARATION");
    assert_eq!(monthly.find(&key(LUIS)).unwrap().disposition, Disposition::RightOnly);
}

#[test]
fn structured_inputs_are_not_restructured() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::default();
    let staged = dir.path().join("staged");
    let decl = structure_declarations(&march_ledger(dir.path()), &staged, &settings);
    let emis = structure_emissions(&march_emission(dir.path(), "3/2024"), &staged, &settings);
    assert!(decl.is_success() && emis.is_success());

    let out = dir.path().join("out");
    let outcome = run(decl.path.as_ref().unwrap(), emis.path.as_ref().unwrap(), &out, &settings);
    assert!(outcome.is_success(), "{}", outcome.message);
    assert!(!outcome.message.contains("structured"), "{}", outcome.message);
    assert!(!out.join("03-2024_Y5412345105_CEDULA.xlsx").exists());
}

#[test]
fn reconcile_exports_csv_alongside_workbook() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::default();
    let staged = dir.path().join("staged");
    let decl = structure_declarations(&march_ledger(dir.path()), &staged, &settings);
    let emis = structure_emissions(&march_emission(dir.path(), "3/2024"), &staged, &settings);

    let out = dir.path().join("out");
    let csv_dir = dir.path().join("csv");
    let outcome = reconcile_with(
        decl.path.as_ref().unwrap(),
        emis.path.as_ref().unwrap(),
        &out,
        Profile::DeclarationVsEmission,
        Some(&csv_dir),
        &settings,
    );
    assert!(outcome.is_success(), "{}", outcome.message);
    assert!(out.join("03_2024_CONFRONTA.xlsx").is_file());

    let text = std::fs::read_to_string(csv_dir.join("MENSUAL.csv")).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap();
    assert!(header.ends_with("OBSERVACIONES"), "{header}");
    assert_eq!(lines.count(), 3);
    assert!(text.contains("NOT IN EMISSION"));
    assert!(text.contains("NOT IN DECLARATION"));
    assert!(!csv_dir.join("BIMESTRAL.csv").exists());
}

#[test]
fn different_periods_fail_validation() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let outcome = run(&march_ledger(dir.path()), &march_emission(dir.path(), "5/2024"), &out, &Settings::default());
    assert_eq!(outcome.path, None);
    assert_eq!(outcome.exit_code, EXIT_VALIDATION);
    assert!(outcome.message.contains("03/2024 vs 05/2024"), "{}", outcome.message);
    assert!(!out.join("03_2024_CONFRONTA.xlsx").exists());
}

#[test]
fn ledger_folder_reports_skipped_files() {
    let dir = TempDir::new().unwrap();
    let ledgers = dir.path().join("ledgers");
    write_ledger(&ledgers, "a/one.SUA", 3, 2024, &[juan()]);
    write_ledger(&ledgers, "b/two.SUA", 3, 2024, &[ana()]);
    std::fs::write(ledgers.join("junk.SUA"), b"short").unwrap();

    let out = dir.path().join("out");
    let outcome = run(&ledgers, &march_emission(dir.path(), "3/2024"), &out, &Settings::default());
    assert!(outcome.is_success(), "{}", outcome.message);
    assert!(outcome.message.ends_with("; 1 file skipped"), "{}", outcome.message);
    assert_eq!(outcome.skipped.len(), 1);
    assert!(outcome.skipped[0].path.ends_with("junk.SUA"));
    assert!(out.join("03-2024_MULTI_CEDULA.xlsx").is_file());
}

#[test]
fn empty_folder_has_no_rows() {
    let dir = TempDir::new().unwrap();
    let empty = dir.path().join("empty");
    std::fs::create_dir_all(&empty).unwrap();

    let outcome = run(&empty, &march_emission(dir.path(), "3/2024"), &dir.path().join("out"), &Settings::default());
    assert_eq!(outcome.path, None);
    assert_eq!(outcome.exit_code, EXIT_NO_ROWS);
}

#[test]
fn reconcile_reports_missing_inputs() {
    let dir = TempDir::new().unwrap();
    let outcome = reconcile(
        &dir.path().join("03-2024_X_CEDULA.xlsx"),
        &dir.path().join("03-2024_X_EMISION.xlsx"),
        dir.path(),
        &Settings::default(),
    );
    assert_eq!(outcome.path, None);
    assert_eq!(outcome.exit_code, EXIT_VALIDATION);
}

#[test]
fn declarations_reconcile_into_suas_workbook() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::default();
    let first = write_ledger(dir.path(), "first/Y54.SUA", 3, 2024, &[juan(), ana()]);
    let amended = LedgerWorker { days: 28, ..juan() };
    let second = write_ledger(dir.path(), "second/Y54.SUA", 3, 2024, &[amended, ana()]);

    let left = structure_declarations(&first, &dir.path().join("left"), &settings);
    let right = structure_declarations(&second, &dir.path().join("right"), &settings);
    assert!(left.is_success() && right.is_success());

    let out = dir.path().join("out");
    let outcome = reconcile_declarations(left.path.as_ref().unwrap(), right.path.as_ref().unwrap(), &out, &settings);
    assert!(outcome.is_success(), "{}", outcome.message);
    assert_eq!(outcome.path.as_deref(), Some(out.join("03_2024_CONFRONTA_SUAS.xlsx").as_path()));

    let output = reconcile_files(
        left.path.as_ref().unwrap(),
        right.path.as_ref().unwrap(),
        Profile::Declarations,
        &settings,
    )
    .unwrap();
    let summary = &output.monthly.summary;
    assert_eq!(summary.both, 2);
    assert_eq!(summary.left_only + summary.right_only, 0);
    let juan_row = output.monthly.rows.iter().find(|r| r.key.ends_with(JUAN)).unwrap();
    assert!(juan_row.observation_text().starts_with("MORE DAYS IN DECLARATION"), "{}", juan_row.observation_text());
}

#[test]
fn even_month_run_writes_both_sheets() {
    let dir = TempDir::new().unwrap();
    let worker = LedgerWorker { retirement: 40.0, housing: 75.0, ..juan() };
    let ledger = write_ledger(dir.path(), "in/Y54.SUA", 4, 2024, &[worker]);
    let emission = write_emission(
        &dir.path().join("in/abril.xlsx"),
        "4/2024",
        &[Movement::new(JUAN, "JUAN PEREZ", "01/04/2024", 30, 500.0, &fees(100.0))],
        Some(&[Movement::new(JUAN, "JUAN PEREZ", "01/04/2024", 30, 500.0, &[40.0, 0.0, 0.0, 40.0, 75.0, 0.0, 75.0])]),
    );

    let out = dir.path().join("out");
    let settings = Settings::default();
    let outcome = run(&ledger, &emission, &out, &settings);
    assert!(outcome.is_success(), "{}", outcome.message);
    assert!(outcome.message.contains("bimonthly:"), "{}", outcome.message);

    let output = reconcile_files(
        &out.join("04-2024_Y5412345105_CEDULA.xlsx"),
        &out.join("04-2024_Y5412345105_EMISION.xlsx"),
        Profile::DeclarationVsEmission,
        &settings,
    )
    .unwrap();
    let bimonthly = output.bimonthly.as_ref().expect("even month");
    assert_eq!(bimonthly.rows.len(), 1);
    assert_eq!(bimonthly.rows[0].disposition, Disposition::Both);
    assert_eq!(output.monthly.rows[0].observation_text(), "NO DIFFERENCES");
}
