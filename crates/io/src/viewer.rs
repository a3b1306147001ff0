//! Emission viewer export: the authority's billing as a folder of
//! fixed-width text files.
//!
//! | file          | content                     |
//! |---------------|-----------------------------|
//! | `CDEMMO99.txt`| monthly movements           |
//! | `CDEMAS99.txt`| monthly worker master       |
//! | `CDEBMO99.txt`| bimonthly movements         |
//! | `CDEBAS99.txt`| bimonthly worker master     |
//! | `CDEMPA99.txt`| period (first line only)    |
//!
//! Lines go through the same declarative slicer as ledger records, with
//! lenient numbers: a slot that does not parse reads as 0.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use confronta_config::{Decode, FieldSpec, Settings};
use confronta_core::{normalize_credit_number, normalize_name, MonthlyFees, Nss, Origin, Period, Table};

use crate::aggregate::{self, BimonthlyMovement, MonthlyMovement};
use crate::collect::discover_named;
use crate::error::SourceError;
use crate::normalized::Normalized;
use crate::slice::{decode_text, slice_record, Fields, NumericPolicy};

pub const MONTHLY_MOVEMENTS: &str = "CDEMMO99.txt";
pub const MONTHLY_MASTER: &str = "CDEMAS99.txt";
pub const BIMONTHLY_MOVEMENTS: &str = "CDEBMO99.txt";
pub const BIMONTHLY_MASTER: &str = "CDEBAS99.txt";
pub const PERIOD_FILE: &str = "CDEMPA99.txt";

const PERIOD_MONTH: std::ops::Range<usize> = 95..97;
const PERIOD_YEAR: std::ops::Range<usize> = 97..101;

const WITHDRAWAL: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerField {
    Registration,
    Nss,
    MovementType,
    Date,
    Days,
    Wage,
    Name,
    NationalId,
    Cf,
    ExcPat,
    ExcObr,
    PdPat,
    PdObr,
    GmpPat,
    GmpObr,
    Rt,
    IvPat,
    IvObr,
    Gps,
    Retirement,
    CeavPat,
    CeavObr,
    HousingPat,
    Amortization,
    CreditNumber,
    CreditType,
    CreditValue,
}

/// Field table for one kind of line. Lines whose trimmed length is below
/// `min_len` are not records.
#[derive(Debug, Clone)]
pub struct LineLayout {
    pub min_len: usize,
    pub fields: Vec<FieldSpec<ViewerField>>,
}

impl LineLayout {
    fn width(&self) -> usize {
        self.fields.iter().map(FieldSpec::end).max().unwrap_or(0)
    }
}

pub fn monthly_movement_layout() -> LineLayout {
    use ViewerField as V;
    let cents = |field, start| FieldSpec::new(field, start, 6, Decode::Cents);
    LineLayout {
        min_len: 142,
        fields: vec![
            FieldSpec::new(V::Registration, 0, 11, Decode::Text),
            FieldSpec::new(V::Nss, 23, 11, Decode::Text),
            FieldSpec::new(V::MovementType, 35, 1, Decode::Int),
            FieldSpec::new(V::Date, 36, 10, Decode::Date),
            FieldSpec::new(V::Days, 46, 2, Decode::Int),
            cents(V::Wage, 48),
            cents(V::Cf, 56),
            cents(V::ExcPat, 64),
            cents(V::ExcObr, 72),
            cents(V::PdPat, 80),
            cents(V::PdObr, 88),
            cents(V::GmpPat, 96),
            cents(V::GmpObr, 104),
            cents(V::Rt, 112),
            cents(V::IvPat, 120),
            cents(V::IvObr, 128),
            cents(V::Gps, 136),
        ],
    }
}

pub fn monthly_master_layout() -> LineLayout {
    use ViewerField as V;
    LineLayout {
        min_len: 109,
        fields: vec![
            FieldSpec::new(V::Nss, 23, 11, Decode::Text),
            FieldSpec::new(V::Name, 35, 50, Decode::Text),
            FieldSpec::new(V::NationalId, 88, 18, Decode::Text),
        ],
    }
}

pub fn bimonthly_movement_layout() -> LineLayout {
    use ViewerField as V;
    LineLayout {
        min_len: 100,
        fields: vec![
            FieldSpec::new(V::Registration, 0, 11, Decode::Text),
            FieldSpec::new(V::Nss, 21, 11, Decode::Text),
            FieldSpec::new(V::MovementType, 33, 1, Decode::Int),
            FieldSpec::new(V::Date, 34, 10, Decode::Date),
            FieldSpec::new(V::Days, 44, 2, Decode::Int),
            FieldSpec::new(V::Wage, 46, 6, Decode::Cents),
            FieldSpec::new(V::Retirement, 54, 6, Decode::Cents),
            FieldSpec::new(V::CeavPat, 62, 6, Decode::Cents),
            FieldSpec::new(V::CeavObr, 70, 6, Decode::Cents),
            FieldSpec::new(V::HousingPat, 85, 7, Decode::Decimal),
            FieldSpec::new(V::Amortization, 92, 8, Decode::Decimal),
        ],
    }
}

pub fn bimonthly_master_layout() -> LineLayout {
    use ViewerField as V;
    LineLayout {
        min_len: 150,
        fields: vec![
            FieldSpec::new(V::Nss, 21, 11, Decode::Text),
            FieldSpec::new(V::Name, 33, 50, Decode::Text),
            FieldSpec::new(V::NationalId, 86, 18, Decode::Text),
            FieldSpec::new(V::CreditNumber, 109, 10, Decode::Text),
            FieldSpec::new(V::CreditType, 119, 1, Decode::Text),
            FieldSpec::new(V::CreditValue, 120, 9, Decode::Decimal),
        ],
    }
}

/// Discount type code to its printed form. `0` and unknown codes mean no credit.
pub fn credit_type_label(code: &str) -> Option<&'static str> {
    match code.trim() {
        "1" => Some("%"),
        "2" => Some("CF"),
        "3" => Some("VSM"),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Line decoding
// ---------------------------------------------------------------------------

/// Decode every record line of `bytes`. Short lines are padded with blanks up
/// to the layout width.
pub fn decode_lines(bytes: &[u8], layout: &LineLayout) -> Vec<Fields<ViewerField>> {
    let width = layout.width();
    let mut out = Vec::new();
    let mut offset = 0;
    for raw in bytes.split(|b| *b == b'\n') {
        let line_start = offset;
        offset += raw.len() + 1;
        let line = raw.strip_suffix(b"\r").unwrap_or(raw);
        if line.trim_ascii().len() < layout.min_len {
            continue;
        }
        let mut padded = line.to_vec();
        if padded.len() < width {
            padded.resize(width, b' ');
        }
        match slice_record(&padded, 0, &layout.fields, NumericPolicy::Lenient, line_start) {
            Ok(fields) => out.push(fields),
            Err(e) => log::warn!("skipping viewer line: {e}"),
        }
    }
    out
}

fn read_lines(paths: &[PathBuf], layout: &LineLayout) -> Result<Vec<Fields<ViewerField>>, SourceError> {
    let mut out = Vec::new();
    for path in paths {
        let bytes = fs::read(path).map_err(|e| SourceError::read(path, e))?;
        let lines = decode_lines(&bytes, layout);
        log::debug!("{}: {} records", path.display(), lines.len());
        out.extend(lines);
    }
    Ok(out)
}

/// Period from the first line of a `CDEMPA99.txt`.
pub fn read_period(bytes: &[u8]) -> Option<Period> {
    let first = bytes.split(|b| *b == b'\n').next()?;
    let month = decode_text(first.get(PERIOD_MONTH)?);
    let year = decode_text(first.get(PERIOD_YEAR)?);
    Period::from_digits(&month, &year)
}

// ---------------------------------------------------------------------------
// Master join
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct MasterEntry {
    name: Option<String>,
    national_id: Option<String>,
    credit_number: Option<String>,
    credit_type: Option<String>,
    credit_value: Option<f64>,
}

/// Worker master keyed by NSS. The first line for an NSS wins.
fn master_index(lines: &[Fields<ViewerField>], names: &[(char, char)]) -> HashMap<Nss, MasterEntry> {
    use ViewerField as V;
    let mut index = HashMap::new();
    for line in lines {
        let Some(nss) = Nss::parse(line.text(V::Nss)) else { continue };
        index.entry(nss).or_insert_with(|| MasterEntry {
            name: line.opt_text(V::Name).map(|n| normalize_name(&n, names)),
            national_id: line.opt_text(V::NationalId),
            credit_number: line.opt_text(V::CreditNumber).and_then(|n| normalize_credit_number(&n)),
            credit_type: credit_type_label(line.text(V::CreditType)).map(str::to_string),
            credit_value: line.has(V::CreditValue).then(|| line.amount(V::CreditValue)).filter(|v| *v != 0.0),
        });
    }
    index
}

/// Movement identity, or `None` for withdrawals and unusable NSS values.
fn movement_nss(line: &Fields<ViewerField>) -> Option<Nss> {
    use ViewerField as V;
    if line.int(V::MovementType) == WITHDRAWAL {
        return None;
    }
    let nss = Nss::parse(line.text(V::Nss));
    if nss.is_none() {
        log::warn!("skipping viewer movement with invalid NSS '{}'", line.text(V::Nss));
    }
    nss
}

fn monthly_movements(lines: &[Fields<ViewerField>], master: &HashMap<Nss, MasterEntry>) -> Vec<MonthlyMovement> {
    use ViewerField as V;
    lines
        .iter()
        .filter_map(|line| {
            let nss = movement_nss(line)?;
            let entry = master.get(&nss).cloned().unwrap_or_default();
            let fees = MonthlyFees {
                cf: line.amount(V::Cf),
                exc_pat: line.amount(V::ExcPat),
                exc_obr: line.amount(V::ExcObr),
                pd_pat: line.amount(V::PdPat),
                pd_obr: line.amount(V::PdObr),
                gmp_pat: line.amount(V::GmpPat),
                gmp_obr: line.amount(V::GmpObr),
                rt: line.amount(V::Rt),
                iv_pat: line.amount(V::IvPat),
                iv_obr: line.amount(V::IvObr),
                gps: line.amount(V::Gps),
            };
            Some(MonthlyMovement {
                registration: line.text(V::Registration).to_string(),
                nss,
                name: entry.name,
                national_id: entry.national_id,
                date: line.date(V::Date),
                days: line.int(V::Days),
                wage: line.amount(V::Wage),
                total: fees.sum(),
                fees,
            })
        })
        .collect()
}

fn bimonthly_movements(lines: &[Fields<ViewerField>], master: &HashMap<Nss, MasterEntry>) -> Vec<BimonthlyMovement> {
    use ViewerField as V;
    lines
        .iter()
        .filter_map(|line| {
            let nss = movement_nss(line)?;
            let entry = master.get(&nss).cloned().unwrap_or_default();
            let retirement = line.amount(V::Retirement);
            let ceav_pat = line.amount(V::CeavPat);
            let ceav_obr = line.amount(V::CeavObr);
            let housing_pat = line.amount(V::HousingPat);
            let amortization = line.amount(V::Amortization);
            let total_rcv = retirement + ceav_pat + ceav_obr;
            let total_inf = housing_pat + amortization;
            Some(BimonthlyMovement {
                registration: line.text(V::Registration).to_string(),
                nss,
                name: entry.name,
                national_id: entry.national_id,
                date: line.date(V::Date),
                days: line.int(V::Days),
                wage: line.amount(V::Wage),
                retirement,
                ceav_pat,
                ceav_obr,
                total_rcv,
                housing_pat,
                amortization,
                total_inf,
                total: total_rcv + total_inf,
                credit_type: entry.credit_type,
                credit_value: entry.credit_value,
                credit_number: entry.credit_number,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Structure every viewer export under `folder` into one emission-shaped
/// result.
pub fn structure_viewer(folder: &Path, settings: &Settings) -> Result<Normalized, SourceError> {
    if !folder.is_dir() {
        return Err(SourceError::Validation(format!("{} is not a folder", folder.display())));
    }
    let depth = settings.collect.max_depth;
    let names = settings.names.pairs();

    let period_files = discover_named(folder, depth, PERIOD_FILE);
    let period_file = period_files
        .first()
        .ok_or_else(|| SourceError::Validation(format!("no {PERIOD_FILE} under {}", folder.display())))?;
    let bytes = fs::read(period_file).map_err(|e| SourceError::read(period_file, e))?;
    let period = read_period(&bytes).ok_or_else(|| {
        SourceError::Validation(format!("{} does not carry a valid period", period_file.display()))
    })?;
    let variant = period.variant();

    let movement_files = discover_named(folder, depth, MONTHLY_MOVEMENTS);
    if movement_files.is_empty() {
        return Err(SourceError::Empty(format!("no {MONTHLY_MOVEMENTS} under {}", folder.display())));
    }
    let lines = read_lines(&movement_files, &monthly_movement_layout())?;
    let master = master_index(&read_lines(&discover_named(folder, depth, MONTHLY_MASTER), &monthly_master_layout())?, &names);
    let mut movements = monthly_movements(&lines, &master);
    aggregate::dedup_movements(&mut movements);
    let mut monthly = Table::for_origin(Origin::Viewer);
    monthly.rows = aggregate::aggregate_monthly(movements);

    let bimonthly_files = discover_named(folder, depth, BIMONTHLY_MOVEMENTS);
    let bimonthly = if variant.has_bimonthly() {
        if bimonthly_files.is_empty() {
            return Err(SourceError::Validation(format!(
                "period {period} is bimonthly but no {BIMONTHLY_MOVEMENTS} was found"
            )));
        }
        let lines = read_lines(&bimonthly_files, &bimonthly_movement_layout())?;
        let master =
            master_index(&read_lines(&discover_named(folder, depth, BIMONTHLY_MASTER), &bimonthly_master_layout())?, &names);
        let mut movements = bimonthly_movements(&lines, &master);
        aggregate::dedup_movements(&mut movements);
        let mut table = Table::for_origin(Origin::Viewer);
        table.rows = aggregate::aggregate_bimonthly(movements);
        Some(table)
    } else {
        if !bimonthly_files.is_empty() {
            log::warn!("ignoring {BIMONTHLY_MOVEMENTS}: period {period} is monthly only");
        }
        None
    };

    let mut normalized = Normalized { period, variant, registration: None, monthly, bimonthly, skipped_records: 0 };
    normalized.finish();
    if normalized.monthly.is_empty() {
        return Err(SourceError::Empty(format!("viewer export under {} has no movements with days", folder.display())));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn put(line: &mut Vec<u8>, start: usize, text: &str) {
        if line.len() < start + text.len() {
            line.resize(start + text.len(), b' ');
        }
        line[start..start + text.len()].copy_from_slice(text.as_bytes());
    }

    fn monthly_line(nss: &str, kind: &str, date: &str, days: &str, wage: &str, cf: &str) -> String {
        let mut line = vec![b' '; 142];
        put(&mut line, 0, "A1234567890");
        put(&mut line, 23, nss);
        put(&mut line, 35, kind);
        put(&mut line, 36, date);
        put(&mut line, 46, days);
        put(&mut line, 48, wage);
        put(&mut line, 56, cf);
        put(&mut line, 136, "000100");
        String::from_utf8(line).unwrap()
    }

    fn master_line(nss: &str, name: &str, curp: &str) -> String {
        let mut line = vec![b' '; 109];
        put(&mut line, 0, "A1234567890");
        put(&mut line, 23, nss);
        put(&mut line, 35, name);
        put(&mut line, 88, curp);
        put(&mut line, 106, "XYZ");
        String::from_utf8(line).unwrap()
    }

    fn period_line(month: &str, year: &str) -> String {
        let mut line = vec![b'0'; 103];
        put(&mut line, 95, month);
        put(&mut line, 97, year);
        String::from_utf8(line).unwrap()
    }

    #[test]
    fn monthly_line_decodes() {
        let line = monthly_line("12345678901", "1", "15-03-2024", "15", "050000", "001234");
        let fields = decode_lines(line.as_bytes(), &monthly_movement_layout());
        assert_eq!(fields.len(), 1);
        let f = &fields[0];
        assert_eq!(f.text(ViewerField::Registration), "A1234567890");
        assert_eq!(f.int(ViewerField::Days), 15);
        assert_eq!(f.amount(ViewerField::Wage), 500.0);
        assert_eq!(f.amount(ViewerField::Cf), 12.34);
        assert_eq!(f.amount(ViewerField::Gps), 1.0);
        assert_eq!(f.date(ViewerField::Date), NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn short_and_garbled_lines() {
        let short = "A1234567890   12345";
        assert!(decode_lines(short.as_bytes(), &monthly_movement_layout()).is_empty());

        let garbled = monthly_line("12345678901", "1", "15-03-2024", "xx", "ab0000", "001234");
        let fields = decode_lines(garbled.as_bytes(), &monthly_movement_layout());
        assert_eq!(fields[0].int(ViewerField::Days), 0);
        assert_eq!(fields[0].amount(ViewerField::Wage), 0.0);
    }

    #[test]
    fn period_line_parses() {
        assert_eq!(read_period(period_line("03", "2024").as_bytes()), Period::new(3, 2024));
        assert_eq!(read_period(b"too short"), None);
    }

    #[test]
    fn credit_type_codes() {
        assert_eq!(credit_type_label("0"), None);
        assert_eq!(credit_type_label("1"), Some("%"));
        assert_eq!(credit_type_label("2"), Some("CF"));
        assert_eq!(credit_type_label("3"), Some("VSM"));
    }

    #[test]
    fn folder_structures_monthly() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("A1234567890");
        fs::create_dir_all(&sub).unwrap();
        fs::write(dir.path().join(PERIOD_FILE), period_line("03", "2024")).unwrap();
        let movements = [
            monthly_line("12345678901", "1", "01-03-2024", "10", "040000", "000100"),
            monthly_line("12345678901", "7", "11-03-2024", "20", "050000", "000200"),
            monthly_line("12345678901", "2", "31-03-2024", "00", "050000", "000000"),
            monthly_line("00000000042", "1", "01-03-2024", "30", "030000", "000300"),
        ]
        .join("\r\n");
        fs::write(sub.join(MONTHLY_MOVEMENTS), movements).unwrap();
        let master = [master_line("12345678901", "PEREZ$LOPEZ#JUAN", "PELJ800101HDFRRN09")].join("\n");
        fs::write(sub.join(MONTHLY_MASTER), master).unwrap();

        let normalized = structure_viewer(dir.path(), &Settings::default()).unwrap();
        assert_eq!(normalized.period, Period::new(3, 2024).unwrap());
        assert!(normalized.bimonthly.is_none());
        assert_eq!(normalized.monthly.len(), 2);

        let juan = normalized
            .monthly
            .rows
            .iter()
            .find(|r| r.nss.as_str() == "12345678901")
            .unwrap();
        assert_eq!(juan.name, "PEREZ LOPEZÑJUAN");
        assert_eq!(juan.days, 30);
        assert_eq!(juan.wage, 500.0);
        assert_eq!(juan.demographics.national_id.as_deref(), Some("PELJ800101HDFRRN09"));
        assert!((juan.fees.cf - 3.0).abs() < 1e-9);

        let unknown = normalized.monthly.rows.iter().find(|r| r.nss.as_str() == "00000000042").unwrap();
        assert_eq!(unknown.name, "");
    }

    #[test]
    fn even_month_requires_bimonthly_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(PERIOD_FILE), period_line("04", "2024")).unwrap();
        fs::write(
            dir.path().join(MONTHLY_MOVEMENTS),
            monthly_line("12345678901", "1", "01-04-2024", "30", "040000", "000100"),
        )
        .unwrap();
        let err = structure_viewer(dir.path(), &Settings::default()).unwrap_err();
        assert!(matches!(err, SourceError::Validation(_)));
    }

    #[test]
    fn missing_period_file() {
        let dir = TempDir::new().unwrap();
        let err = structure_viewer(dir.path(), &Settings::default()).unwrap_err();
        assert!(err.to_string().contains(PERIOD_FILE));
    }
}
