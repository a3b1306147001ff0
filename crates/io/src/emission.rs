//! Emission workbooks: the authority's monthly/bimonthly billing exports.
//!
//! Sheet 1 carries metadata (period text in B8, employer registration in
//! B9). Sheet 2 lists monthly movements and, for even months, sheet 3 lists
//! bimonthly movements. Both movement sheets have their header on row 5.

use std::path::Path;

use calamine::{Data, Range};
use confronta_config::Settings;
use confronta_core::{normalize_credit_number, normalize_name, MonthlyFees, Nss, Origin, Period, Table};

use crate::aggregate::{self, BimonthlyMovement, MonthlyMovement};
use crate::error::SourceError;
use crate::grid::{self, RowView};
use crate::normalized::Normalized;

/// Zero-based (row, column) of the `M/YYYY` period text.
pub const PERIOD_CELL: (u32, u32) = (7, 1);
/// Zero-based (row, column) of the employer registration.
pub const REGISTRATION_CELL: (u32, u32) = (8, 1);
/// Zero-based row holding the movement headers.
pub const HEADER_ROW: u32 = 4;

const MONTHLY_SHEET: usize = 1;
const BIMONTHLY_SHEET: usize = 2;

/// Movement type for a withdrawal. Withdrawals carry no billable days.
const WITHDRAWAL: i64 = 2;

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

pub const H_MOVEMENT_TYPE: &str = "Tipo del Movimiento";
pub const H_NAME: &str = "Nombre";
pub const H_NSS: &str = "NSS";
pub const H_DATE: &str = "Fecha del Movimiento";
pub const H_DAYS: &str = "Días";
pub const H_WAGE: &str = "Salario Diario";
pub const H_TOTAL: &str = "Total";

pub const H_CF: &str = "Cuota Fija";
pub const H_EXC_PAT: &str = "Excedente Patronal";
pub const H_EXC_OBR: &str = "Excedente Obrero";
pub const H_PD_PAT: &str = "Prestaciones en Dinero Patronal";
pub const H_PD_OBR: &str = "Prestaciones en Dinero Obrero";
pub const H_GMP_PAT: &str = "Gastos Médicos y Pensionados Patronal";
pub const H_GMP_OBR: &str = "Gastos Médicos y Pensionados Obrero";
pub const H_RT: &str = "Riesgos de Trabajo";
pub const H_IV_PAT: &str = "Invalidez y Vida Patronal";
pub const H_IV_OBR: &str = "Invalidez y Vida Obrero";
pub const H_GPS: &str = "Guarderías y Prestaciones Sociales";

pub const H_RETIREMENT: &str = "Retiro";
pub const H_CEAV_PAT: &str = "Cesantía en Edad Avanzada y Vejez Patronal";
pub const H_CEAV_OBR: &str = "Cesantía en Edad Avanzada y Vejez Obrero";
pub const H_TOTAL_RCV: &str = "Subtotal RCV";
pub const H_HOUSING_PAT: &str = "Aportación Patronal";
pub const H_CREDIT_TYPE: &str = "Tipo de Descuento";
pub const H_CREDIT_VALUE: &str = "Valor de Descuento";
pub const H_CREDIT_NUMBER: &str = "Número de Crédito";
pub const H_AMORTIZATION: &str = "Amortización";
pub const H_TOTAL_INF: &str = "Subtotal Infonavit";

const REQUIRED: [&str; 5] = [H_NSS, H_NAME, H_DAYS, H_WAGE, H_TOTAL];

const MONTHLY_AMOUNTS: [&str; 11] = [
    H_CF, H_EXC_PAT, H_EXC_OBR, H_PD_PAT, H_PD_OBR, H_GMP_PAT, H_GMP_OBR, H_RT, H_IV_PAT, H_IV_OBR, H_GPS,
];

const BIMONTHLY_AMOUNTS: [&str; 9] = [
    H_RETIREMENT,
    H_CEAV_PAT,
    H_CEAV_OBR,
    H_TOTAL_RCV,
    H_HOUSING_PAT,
    H_CREDIT_TYPE,
    H_CREDIT_VALUE,
    H_CREDIT_NUMBER,
    H_AMORTIZATION,
];

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct EmissionMetadata {
    pub period: Period,
    pub registration: String,
}

impl EmissionMetadata {
    pub fn read(range: &Range<Data>) -> Result<Self, SourceError> {
        let period = match range.get_value(PERIOD_CELL) {
            Some(Data::String(s)) => Period::parse_slashed(s),
            _ => None,
        }
        .ok_or_else(|| SourceError::Validation("metadata cell B8 does not hold a M/YYYY period".to_string()))?;
        let registration = range
            .get_value(REGISTRATION_CELL)
            .and_then(grid::text)
            .ok_or_else(|| SourceError::Validation("metadata cell B9 does not hold an employer registration".to_string()))?;
        Ok(Self { period, registration })
    }
}

// ---------------------------------------------------------------------------
// Movement sheets
// ---------------------------------------------------------------------------

struct Common {
    nss: Nss,
    name: Option<String>,
    date: Option<chrono::NaiveDate>,
    days: i64,
    wage: f64,
}

/// Identity and activity columns of one movement row. `None` skips the
/// row quietly (blank lines, withdrawals).
fn common(row: &RowView, sheet: &str, line: usize, names: &[(char, char)]) -> Option<Common> {
    let raw_nss = row.text(H_NSS)?;
    if row.opt_number(H_MOVEMENT_TYPE).map(|t| t as i64) == Some(WITHDRAWAL) {
        return None;
    }
    let nss = match row.get(H_NSS) {
        Some(Data::Float(f)) => Nss::from_number(*f),
        Some(Data::Int(n)) => Nss::from_number(*n as f64),
        _ => Nss::parse(&raw_nss),
    };
    let Some(nss) = nss else {
        log::warn!("{sheet} row {line}: skipping movement with invalid NSS '{raw_nss}'");
        return None;
    };
    Some(Common {
        nss,
        name: row.text(H_NAME).map(|n| normalize_name(&n, names)).filter(|n| !n.is_empty()),
        date: row.date(H_DATE),
        days: row.number(H_DAYS).round() as i64,
        wage: row.number(H_WAGE),
    })
}

/// Locate the header row and check the columns every movement sheet needs.
fn movement_rows<'a>(
    sheet: &str,
    range: &'a Range<Data>,
    optional: &[&str],
) -> Result<(grid::HeaderIndex, Vec<&'a [Data]>), SourceError> {
    let (header, rows) = grid::rows_below(range, HEADER_ROW)
        .ok_or_else(|| SourceError::Validation(format!("sheet '{sheet}' has no header row {}", HEADER_ROW + 1)))?;
    for column in REQUIRED {
        if !header.contains(column) {
            return Err(SourceError::MissingColumn { sheet: sheet.to_string(), column: column.to_string() });
        }
    }
    for column in optional {
        if !header.contains(column) {
            log::warn!("sheet '{sheet}': column '{column}' missing, treating as 0");
        }
    }
    Ok((header, rows))
}

pub fn read_monthly_movements(
    sheet: &str,
    range: &Range<Data>,
    registration: &str,
    names: &[(char, char)],
) -> Result<Vec<MonthlyMovement>, SourceError> {
    let (header, rows) = movement_rows(sheet, range, &MONTHLY_AMOUNTS)?;
    let mut out = Vec::new();
    for (idx, cells) in rows.into_iter().enumerate() {
        let row = RowView { cells, header: &header };
        let line = (HEADER_ROW as usize) + idx + 2;
        let Some(c) = common(&row, sheet, line, names) else { continue };
        let fees = MonthlyFees {
            cf: row.number(H_CF),
            exc_pat: row.number(H_EXC_PAT),
            exc_obr: row.number(H_EXC_OBR),
            pd_pat: row.number(H_PD_PAT),
            pd_obr: row.number(H_PD_OBR),
            gmp_pat: row.number(H_GMP_PAT),
            gmp_obr: row.number(H_GMP_OBR),
            rt: row.number(H_RT),
            iv_pat: row.number(H_IV_PAT),
            iv_obr: row.number(H_IV_OBR),
            gps: row.number(H_GPS),
        };
        out.push(MonthlyMovement {
            registration: registration.to_string(),
            nss: c.nss,
            name: c.name,
            national_id: None,
            date: c.date,
            days: c.days,
            wage: c.wage,
            fees,
            total: row.number(H_TOTAL),
        });
    }
    Ok(out)
}

pub fn read_bimonthly_movements(
    sheet: &str,
    range: &Range<Data>,
    registration: &str,
    names: &[(char, char)],
) -> Result<Vec<BimonthlyMovement>, SourceError> {
    let (header, rows) = movement_rows(sheet, range, &BIMONTHLY_AMOUNTS)?;
    let mut out = Vec::new();
    for (idx, cells) in rows.into_iter().enumerate() {
        let row = RowView { cells, header: &header };
        let line = (HEADER_ROW as usize) + idx + 2;
        let Some(c) = common(&row, sheet, line, names) else { continue };
        let total_rcv = row
            .opt_number(H_TOTAL_RCV)
            .unwrap_or_else(|| row.number(H_RETIREMENT) + row.number(H_CEAV_PAT) + row.number(H_CEAV_OBR));
        let housing_pat = row.number(H_HOUSING_PAT);
        let amortization = row.number(H_AMORTIZATION);
        out.push(BimonthlyMovement {
            registration: registration.to_string(),
            nss: c.nss,
            name: c.name,
            national_id: None,
            date: c.date,
            days: c.days,
            wage: c.wage,
            retirement: row.number(H_RETIREMENT),
            ceav_pat: row.number(H_CEAV_PAT),
            ceav_obr: row.number(H_CEAV_OBR),
            total_rcv,
            housing_pat,
            amortization,
            total_inf: row.opt_number(H_TOTAL_INF).unwrap_or(housing_pat + amortization),
            total: row.number(H_TOTAL),
            credit_type: row.text(H_CREDIT_TYPE),
            credit_value: row.opt_number(H_CREDIT_VALUE),
            credit_number: row.text(H_CREDIT_NUMBER).and_then(|n| normalize_credit_number(&n)),
        });
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Cheap structural check used when collecting a folder of workbooks.
pub fn validate_workbook(path: &Path) -> Result<(), SourceError> {
    let workbook = grid::open(path)?;
    let sheets = calamine::Reader::sheet_names(&workbook).len();
    if sheets < 2 {
        return Err(SourceError::Validation(format!(
            "{} has {} worksheet(s); an emission workbook needs metadata and monthly sheets",
            path.display(),
            sheets
        )));
    }
    Ok(())
}

/// Structure one emission workbook.
pub fn structure_emission(path: &Path, settings: &Settings) -> Result<Normalized, SourceError> {
    validate_workbook(path)?;
    let mut workbook = grid::open(path)?;
    let names = settings.names.pairs();

    let (_, meta) = grid::sheet_at(&mut workbook, 0, path)?;
    let metadata = EmissionMetadata::read(&meta)?;
    let variant = metadata.period.variant();
    log::debug!(
        "emission {} for {} period {}",
        path.display(),
        metadata.registration,
        metadata.period
    );

    let (sheet, range) = grid::sheet_at(&mut workbook, MONTHLY_SHEET, path)?;
    let mut movements = read_monthly_movements(&sheet, &range, &metadata.registration, &names)?;
    let dupes = aggregate::dedup_movements(&mut movements);
    if dupes > 0 {
        log::debug!("{sheet}: dropped {dupes} duplicate movements");
    }
    let mut monthly = Table::for_origin(Origin::Emission);
    monthly.rows = aggregate::aggregate_monthly(movements);

    let bimonthly = if variant.has_bimonthly() {
        let (sheet, range) = grid::sheet_at(&mut workbook, BIMONTHLY_SHEET, path).map_err(|_| {
            SourceError::Validation(format!(
                "{} covers even month {} but has no bimonthly sheet",
                path.display(),
                metadata.period
            ))
        })?;
        let mut movements = read_bimonthly_movements(&sheet, &range, &metadata.registration, &names)?;
        aggregate::dedup_movements(&mut movements);
        let mut table = Table::for_origin(Origin::Emission);
        table.rows = aggregate::aggregate_bimonthly(movements);
        Some(table)
    } else {
        None
    };

    let mut normalized = Normalized {
        period: metadata.period,
        variant,
        registration: Some(metadata.registration),
        monthly,
        bimonthly,
        skipped_records: 0,
    };
    normalized.finish();
    if normalized.monthly.is_empty() {
        return Err(SourceError::Empty(format!("{} has no movements with days worked", path.display())));
    }
    Ok(normalized)
}
