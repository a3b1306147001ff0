use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::column::{Column, Value};
use crate::identity::{identity_key, normalize_credit_number, Nss, CREDIT_SENTINEL};
use crate::period::SubSchema;

pub type CellMap = BTreeMap<Column, Value>;

// ---------------------------------------------------------------------------
// Record trait
// ---------------------------------------------------------------------------

/// A typed row of one sub-schema. Reconciliation and report writing only
/// see rows through this trait.
pub trait Record: Clone + fmt::Debug {
    const SUB_SCHEMA: SubSchema;

    fn registration(&self) -> &str;
    fn nss(&self) -> &Nss;
    fn name(&self) -> &str;
    fn days(&self) -> i64;

    /// Cell value for `column`, `Value::Empty` when the row has no such field.
    fn get(&self, column: Column) -> Value;

    /// Rebuild a row from cells read back out of a workbook.
    fn from_cells(cells: &CellMap) -> Result<Self, RowError>;

    fn key(&self) -> String {
        identity_key(self.registration(), self.nss())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowError {
    Missing(Column),
    Invalid { column: Column, value: String },
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(column) => write!(f, "missing value for column '{column}'"),
            Self::Invalid { column, value } => {
                write!(f, "column '{column}': invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for RowError {}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Declaration-only identity fields. Emission exports carry none of them,
/// the viewer export carries the CURP.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Demographics {
    pub tax_id: Option<String>,
    pub national_id: Option<String>,
    pub movements: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MonthlyFees {
    pub cf: f64,
    pub exc_pat: f64,
    pub exc_obr: f64,
    pub pd_pat: f64,
    pub pd_obr: f64,
    pub gmp_pat: f64,
    pub gmp_obr: f64,
    pub rt: f64,
    pub iv_pat: f64,
    pub iv_obr: f64,
    pub gps: f64,
}

impl MonthlyFees {
    pub fn sum(&self) -> f64 {
        self.cf
            + self.exc_pat
            + self.exc_obr
            + self.pd_pat
            + self.pd_obr
            + self.gmp_pat
            + self.gmp_obr
            + self.rt
            + self.iv_pat
            + self.iv_obr
            + self.gps
    }

    pub fn get(&self, column: Column) -> Option<f64> {
        Some(match column {
            Column::Cf => self.cf,
            Column::ExcPat => self.exc_pat,
            Column::ExcObr => self.exc_obr,
            Column::PdPat => self.pd_pat,
            Column::PdObr => self.pd_obr,
            Column::GmpPat => self.gmp_pat,
            Column::GmpObr => self.gmp_obr,
            Column::Rt => self.rt,
            Column::IvPat => self.iv_pat,
            Column::IvObr => self.iv_obr,
            Column::Gps => self.gps,
            _ => return None,
        })
    }

    pub fn add(&mut self, other: &MonthlyFees) {
        self.cf += other.cf;
        self.exc_pat += other.exc_pat;
        self.exc_obr += other.exc_obr;
        self.pd_pat += other.pd_pat;
        self.pd_obr += other.pd_obr;
        self.gmp_pat += other.gmp_pat;
        self.gmp_obr += other.gmp_obr;
        self.rt += other.rt;
        self.iv_pat += other.iv_pat;
        self.iv_obr += other.iv_obr;
        self.gps += other.gps;
    }

    fn from_cells(cells: &CellMap) -> Self {
        Self {
            cf: amount(cells, Column::Cf),
            exc_pat: amount(cells, Column::ExcPat),
            exc_obr: amount(cells, Column::ExcObr),
            pd_pat: amount(cells, Column::PdPat),
            pd_obr: amount(cells, Column::PdObr),
            gmp_pat: amount(cells, Column::GmpPat),
            gmp_obr: amount(cells, Column::GmpObr),
            rt: amount(cells, Column::Rt),
            iv_pat: amount(cells, Column::IvPat),
            iv_obr: amount(cells, Column::IvObr),
            gps: amount(cells, Column::Gps),
        }
    }
}

/// Monthly contributions for one worker under one employer registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRow {
    pub registration: String,
    pub nss: Nss,
    pub name: String,
    pub demographics: Demographics,
    pub credit_number: Option<String>,
    pub disability_days: Option<i64>,
    pub absence_days: Option<i64>,
    pub days: i64,
    pub wage: f64,
    pub fees: MonthlyFees,
    pub total: f64,
}

/// Bimonthly retirement and housing-fund contributions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BimonthlyRow {
    pub registration: String,
    pub nss: Nss,
    pub name: String,
    pub demographics: Demographics,
    pub disability_days: Option<i64>,
    pub absence_days: Option<i64>,
    pub days: i64,
    pub wage: f64,
    pub credit_number: Option<String>,
    pub credit_type: Option<String>,
    pub credit_value: Option<f64>,
    pub retirement: f64,
    pub ceav_pat: f64,
    pub ceav_obr: f64,
    pub total_rcv: f64,
    pub housing_pat: f64,
    pub amortization: f64,
    pub total_inf: f64,
    pub total: f64,
}

fn common_value(
    column: Column,
    registration: &str,
    nss: &Nss,
    name: &str,
    demographics: &Demographics,
    credit_number: &Option<String>,
) -> Option<Value> {
    Some(match column {
        Column::Rp => Value::text(registration),
        Column::Nss => Value::text(nss.as_str()),
        Column::Name => Value::text(name),
        Column::TaxId => Value::opt_text(demographics.tax_id.as_deref()),
        Column::NationalId => Value::opt_text(demographics.national_id.as_deref()),
        Column::Movements => Value::opt_text(demographics.movements.as_deref()),
        Column::CreditNumber => Value::text(credit_number.as_deref().unwrap_or(CREDIT_SENTINEL)),
        _ => return None,
    })
}

fn opt_count_value(n: Option<i64>) -> Value {
    n.map(Value::Int).unwrap_or(Value::Empty)
}

impl Record for MonthlyRow {
    const SUB_SCHEMA: SubSchema = SubSchema::Monthly;

    fn registration(&self) -> &str {
        &self.registration
    }

    fn nss(&self) -> &Nss {
        &self.nss
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn days(&self) -> i64 {
        self.days
    }

    fn get(&self, column: Column) -> Value {
        if let Some(v) = common_value(
            column,
            &self.registration,
            &self.nss,
            &self.name,
            &self.demographics,
            &self.credit_number,
        ) {
            return v;
        }
        if let Some(fee) = self.fees.get(column) {
            return Value::Number(fee);
        }
        match column {
            Column::DisabilityDays => opt_count_value(self.disability_days),
            Column::AbsenceDays => opt_count_value(self.absence_days),
            Column::Days => Value::Int(self.days),
            Column::Wage => Value::Number(self.wage),
            Column::Total => Value::Number(self.total),
            _ => Value::Empty,
        }
    }

    fn from_cells(cells: &CellMap) -> Result<Self, RowError> {
        Ok(Self {
            registration: required_text(cells, Column::Rp)?,
            nss: nss(cells)?,
            name: opt_text(cells, Column::Name).unwrap_or_default(),
            demographics: demographics(cells),
            credit_number: opt_text(cells, Column::CreditNumber)
                .and_then(|s| normalize_credit_number(&s)),
            disability_days: opt_count(cells, Column::DisabilityDays)?,
            absence_days: opt_count(cells, Column::AbsenceDays)?,
            days: opt_count(cells, Column::Days)?.ok_or(RowError::Missing(Column::Days))?,
            wage: amount(cells, Column::Wage),
            fees: MonthlyFees::from_cells(cells),
            total: amount(cells, Column::Total),
        })
    }
}

impl Record for BimonthlyRow {
    const SUB_SCHEMA: SubSchema = SubSchema::Bimonthly;

    fn registration(&self) -> &str {
        &self.registration
    }

    fn nss(&self) -> &Nss {
        &self.nss
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn days(&self) -> i64 {
        self.days
    }

    fn get(&self, column: Column) -> Value {
        if let Some(v) = common_value(
            column,
            &self.registration,
            &self.nss,
            &self.name,
            &self.demographics,
            &self.credit_number,
        ) {
            return v;
        }
        match column {
            Column::DisabilityDays => opt_count_value(self.disability_days),
            Column::AbsenceDays => opt_count_value(self.absence_days),
            Column::Days => Value::Int(self.days),
            Column::Wage => Value::Number(self.wage),
            Column::CreditType => Value::text(self.credit_type.as_deref().unwrap_or(CREDIT_SENTINEL)),
            Column::CreditValue => match self.credit_value {
                Some(v) => Value::Number(v),
                None => Value::text(CREDIT_SENTINEL),
            },
            Column::Retirement => Value::Number(self.retirement),
            Column::CeavPat => Value::Number(self.ceav_pat),
            Column::CeavObr => Value::Number(self.ceav_obr),
            Column::TotalRcv => Value::Number(self.total_rcv),
            Column::HousingPat => Value::Number(self.housing_pat),
            Column::Amortization => Value::Number(self.amortization),
            Column::TotalInf => Value::Number(self.total_inf),
            Column::Total => Value::Number(self.total),
            _ => Value::Empty,
        }
    }

    fn from_cells(cells: &CellMap) -> Result<Self, RowError> {
        Ok(Self {
            registration: required_text(cells, Column::Rp)?,
            nss: nss(cells)?,
            name: opt_text(cells, Column::Name).unwrap_or_default(),
            demographics: demographics(cells),
            disability_days: opt_count(cells, Column::DisabilityDays)?,
            absence_days: opt_count(cells, Column::AbsenceDays)?,
            days: opt_count(cells, Column::Days)?.ok_or(RowError::Missing(Column::Days))?,
            wage: amount(cells, Column::Wage),
            credit_number: opt_text(cells, Column::CreditNumber)
                .and_then(|s| normalize_credit_number(&s)),
            credit_type: opt_text(cells, Column::CreditType).filter(|s| s != CREDIT_SENTINEL),
            credit_value: cells.get(&Column::CreditValue).and_then(Value::as_f64),
            retirement: amount(cells, Column::Retirement),
            ceav_pat: amount(cells, Column::CeavPat),
            ceav_obr: amount(cells, Column::CeavObr),
            total_rcv: amount(cells, Column::TotalRcv),
            housing_pat: amount(cells, Column::HousingPat),
            amortization: amount(cells, Column::Amortization),
            total_inf: amount(cells, Column::TotalInf),
            total: amount(cells, Column::Total),
        })
    }
}

// ---------------------------------------------------------------------------
// Cell helpers
// ---------------------------------------------------------------------------

fn opt_text(cells: &CellMap, column: Column) -> Option<String> {
    cells
        .get(&column)
        .filter(|v| !v.is_empty())
        .and_then(Value::as_text)
        .map(|s| s.trim().to_string())
}

fn required_text(cells: &CellMap, column: Column) -> Result<String, RowError> {
    opt_text(cells, column).ok_or(RowError::Missing(column))
}

fn amount(cells: &CellMap, column: Column) -> f64 {
    cells.get(&column).and_then(Value::as_f64).unwrap_or(0.0)
}

fn opt_count(cells: &CellMap, column: Column) -> Result<Option<i64>, RowError> {
    match cells.get(&column) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => match v.as_f64() {
            Some(n) if n.fract() == 0.0 => Ok(Some(n as i64)),
            _ => Err(RowError::Invalid { column, value: v.to_string() }),
        },
    }
}

fn nss(cells: &CellMap) -> Result<Nss, RowError> {
    let value = cells.get(&Column::Nss).ok_or(RowError::Missing(Column::Nss))?;
    let parsed = match value {
        Value::Int(n) => Nss::from_number(*n as f64),
        Value::Number(n) => Nss::from_number(*n),
        Value::Text(s) => Nss::parse(s),
        Value::Empty => return Err(RowError::Missing(Column::Nss)),
    };
    parsed.ok_or_else(|| RowError::Invalid { column: Column::Nss, value: value.to_string() })
}

fn demographics(cells: &CellMap) -> Demographics {
    Demographics {
        tax_id: opt_text(cells, Column::TaxId),
        national_id: opt_text(cells, Column::NationalId),
        movements: opt_text(cells, Column::Movements),
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Which producer shaped a table. Fixes the column order written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Ledger,
    Emission,
    Viewer,
}

impl Origin {
    pub fn columns(self, sub: SubSchema) -> Vec<Column> {
        use Column as C;
        let cols: &[Column] = match (self, sub) {
            (Self::Ledger, SubSchema::Monthly) => &[
                C::Rp, C::Nss, C::Name, C::Days, C::Wage, C::TaxId, C::NationalId, C::CreditNumber, C::Movements,
                C::DisabilityDays, C::AbsenceDays, C::Cf, C::ExcPat, C::ExcObr, C::PdPat, C::PdObr, C::GmpPat, C::GmpObr,
                C::Rt, C::IvPat, C::IvObr, C::Gps, C::Total,
            ],
            (Self::Ledger, SubSchema::Bimonthly) => &[
                C::Rp, C::Nss, C::Name, C::Days, C::Wage, C::TaxId, C::NationalId, C::CreditNumber, C::Movements,
                C::DisabilityDays, C::AbsenceDays, C::Retirement, C::CeavPat, C::CeavObr, C::TotalRcv, C::HousingPat,
                C::Amortization, C::TotalInf, C::Total,
            ],
            (Self::Emission, SubSchema::Monthly) => &[
                C::Rp, C::Nss, C::Name, C::Days, C::Wage, C::Cf, C::ExcPat, C::ExcObr, C::PdPat, C::PdObr, C::GmpPat, C::GmpObr, C::Rt,
                C::IvPat, C::IvObr, C::Gps, C::Total,
            ],
            (Self::Emission, SubSchema::Bimonthly) => &[
                C::Rp, C::Nss, C::Name, C::Days, C::Wage, C::Retirement, C::CeavPat, C::CeavObr, C::TotalRcv, C::HousingPat,
                C::CreditType, C::CreditValue, C::CreditNumber, C::Amortization, C::TotalInf, C::Total,
            ],
            (Self::Viewer, SubSchema::Monthly) => &[
                C::Rp, C::Nss, C::NationalId, C::Name, C::Days, C::Wage, C::Cf, C::ExcPat, C::ExcObr, C::PdPat, C::PdObr, C::GmpPat,
                C::GmpObr, C::Rt, C::IvPat, C::IvObr, C::Gps, C::Total,
            ],
            (Self::Viewer, SubSchema::Bimonthly) => &[
                C::Rp, C::Nss, C::NationalId, C::Name, C::Days, C::Wage, C::Retirement, C::CeavPat, C::CeavObr, C::TotalRcv,
                C::HousingPat, C::CreditType, C::CreditValue, C::CreditNumber, C::Amortization, C::TotalInf, C::Total,
            ],
        };
        cols.to_vec()
    }
}

/// Rows of one sub-schema plus the column order they are presented in.
#[derive(Debug, Clone)]
pub struct Table<R> {
    pub columns: Vec<Column>,
    pub rows: Vec<R>,
}

impl<R: Record> Table<R> {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn for_origin(origin: Origin) -> Self {
        Self::new(origin.columns(R::SUB_SCHEMA))
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Remove rows with zero days worked. Returns how many were removed.
    pub fn drop_idle(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(|r| r.days() != 0);
        before - self.rows.len()
    }

    /// Remove rows identical in every field, keeping the first.
    pub fn dedup_exact(&mut self) -> usize {
        let before = self.rows.len();
        let mut seen = HashSet::new();
        self.rows.retain(|r| seen.insert(format!("{r:?}")));
        before - self.rows.len()
    }

    pub fn sort_by_registration_and_name(&mut self) {
        self.rows.sort_by(|a, b| {
            a.registration()
                .cmp(b.registration())
                .then_with(|| a.name().cmp(b.name()))
        });
    }

    /// Concatenate another table of the same sub-schema.
    pub fn append(&mut self, other: Table<R>) {
        if self.columns.is_empty() {
            self.columns = other.columns;
        }
        self.rows.extend(other.rows);
    }

    pub fn cells(&self, row: &R) -> Vec<Value> {
        self.columns.iter().map(|c| row.get(*c)).collect()
    }
}
