use std::collections::BTreeMap;

use confronta_core::{CellMap, Column, Record, SubSchema, Value, CREDIT_SENTINEL};

use crate::config::{Profile, RateBasis, ReconParams};
use crate::model::{Disposition, Observation, ReconciledRow};

// ---------------------------------------------------------------------------
// Compared columns
// ---------------------------------------------------------------------------

const MONTHLY_COMPARED: &[Column] = &[
    Column::Days,
    Column::Wage,
    Column::Cf,
    Column::ExcPat,
    Column::ExcObr,
    Column::PdPat,
    Column::PdObr,
    Column::GmpPat,
    Column::GmpObr,
    Column::Rt,
    Column::IvPat,
    Column::IvObr,
    Column::Gps,
    Column::Total,
];

const BIMONTHLY_COMPARED: &[Column] = &[
    Column::Days,
    Column::Wage,
    Column::Retirement,
    Column::CeavPat,
    Column::CeavObr,
    Column::TotalRcv,
    Column::HousingPat,
    Column::Amortization,
    Column::TotalInf,
    Column::Total,
];

/// Identity fields copied from the right side when it has them.
const RIGHT_IDENTITY: &[Column] = &[Column::TaxId, Column::NationalId, Column::Movements];

/// Columns whose delta is tracked but never raises the fee flag on its own.
const TRACKED_ONLY: &[Column] = &[Column::Days, Column::Wage, Column::TotalRcv, Column::Total];

/// Columns compared for a sub-schema, before intersecting with what both
/// tables actually carry. The declarations profile does not compare wages.
pub fn compared_columns(sub: SubSchema, profile: Profile) -> Vec<Column> {
    let base = match sub {
        SubSchema::Monthly => MONTHLY_COMPARED,
        SubSchema::Bimonthly => BIMONTHLY_COMPARED,
    };
    base.iter()
        .copied()
        .filter(|c| !(profile == Profile::Declarations && *c == Column::Wage))
        .collect()
}

/// The column layout a comparison works against.
#[derive(Debug, Clone)]
pub struct Layout {
    pub sub_schema: SubSchema,
    pub left: Vec<Column>,
    pub right: Vec<Column>,
    pub compared: Vec<Column>,
}

impl Layout {
    pub fn new(sub_schema: SubSchema, left: &[Column], right: &[Column], profile: Profile) -> Self {
        let compared = compared_columns(sub_schema, profile)
            .into_iter()
            .filter(|c| left.contains(c) && right.contains(c))
            .collect();
        Self { sub_schema, left: left.to_vec(), right: right.to_vec(), compared }
    }

    fn right_has(&self, column: Column) -> bool {
        self.right.contains(&column)
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

fn number(value: &Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

fn credit_text<R: Record>(row: &R) -> String {
    row.get(Column::CreditNumber)
        .as_text()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| CREDIT_SENTINEL.to_string())
}

/// Compare a matched pair. Cells start as the left row, compared columns
/// hold `left - right`, and identity fields are refreshed from the right.
pub fn classify_both<R: Record>(
    key: String,
    left: &R,
    right: &R,
    layout: &Layout,
    params: &ReconParams,
) -> ReconciledRow {
    let mut cells: CellMap = layout.left.iter().map(|c| (*c, left.get(*c))).collect();
    let mut deltas = BTreeMap::new();
    let mut fee_differs = false;

    for &column in &layout.compared {
        let l = number(&left.get(column));
        let r = number(&right.get(column));
        let delta = params.delta(l, r);
        let cell = if column == Column::Days {
            Value::Int(left.days() - right.days())
        } else {
            Value::Number(delta)
        };
        cells.insert(column, cell);
        deltas.insert(column, delta);
        if delta != 0.0 && !TRACKED_ONLY.contains(&column) {
            fee_differs = true;
        }
    }

    cells.insert(Column::Name, Value::text(right.name()));
    for &column in RIGHT_IDENTITY {
        if layout.right_has(column) {
            let value = right.get(column);
            if !value.is_empty() {
                cells.insert(column, value);
            }
        }
    }
    if params.profile == Profile::Declarations && layout.right_has(Column::Wage) {
        cells.insert(Column::Wage, right.get(Column::Wage));
    }
    if layout.sub_schema == SubSchema::Bimonthly {
        for column in [Column::CreditType, Column::CreditValue] {
            if layout.right_has(column) {
                cells.insert(column, right.get(column));
            }
        }
    }

    let mut observations = Vec::new();

    let left_credit = credit_text(left);
    let right_credit = credit_text(right);
    if left_credit != CREDIT_SENTINEL && right_credit != CREDIT_SENTINEL && left_credit != right_credit {
        observations.push(Observation::DifferentCreditNumber);
    }
    if layout.left.contains(&Column::CreditNumber) || layout.right_has(Column::CreditNumber) {
        let kept = if right_credit != CREDIT_SENTINEL { right_credit } else { left_credit };
        cells.insert(Column::CreditNumber, Value::Text(kept));
    }

    let days = deltas.get(&Column::Days).copied().unwrap_or(0.0);
    if days > 0.0 {
        observations.push(Observation::MoreDaysInDeclaration);
    } else if days < 0.0 {
        observations.push(Observation::MoreDaysInEmission);
    }
    if deltas.get(&Column::Wage).is_some_and(|d| *d != 0.0) {
        observations.push(Observation::DifferentWage);
    }

    if let Some(finding) = total_finding(left, right, &deltas, fee_differs, layout.sub_schema, params) {
        observations.push(finding);
    }

    ReconciledRow {
        key,
        registration: left.registration().to_string(),
        name: right.name().to_string(),
        disposition: Disposition::Both,
        cells,
        deltas,
        observations,
    }
}

/// Decide whether a pair differs in money. A nonzero total delta is
/// `DIFFERENCES` unless the left side's disability and absence days account
/// for it within the configured band.
fn total_finding<R: Record>(
    left: &R,
    right: &R,
    deltas: &BTreeMap<Column, f64>,
    fee_differs: bool,
    sub: SubSchema,
    params: &ReconParams,
) -> Option<Observation> {
    let total = deltas.get(&Column::Total).copied().unwrap_or(0.0);
    if total == 0.0 {
        if fee_differs && params.fee_difference_flags_total {
            return Some(Observation::Differences);
        }
        return None;
    }

    let lost_days = number(&left.get(Column::DisabilityDays)) + number(&left.get(Column::AbsenceDays));
    let right_days = right.days();
    if lost_days <= 0.0 || right_days <= 0 {
        return Some(Observation::Differences);
    }

    let (basis, measured) = match sub {
        SubSchema::Monthly => (number(&right.get(Column::Total)), total),
        SubSchema::Bimonthly => {
            if deltas.get(&Column::Amortization).is_some_and(|d| *d != 0.0) {
                return Some(Observation::Differences);
            }
            let basis = match params.bimonthly_rate_basis {
                RateBasis::Rcv => number(&right.get(Column::TotalRcv)),
                RateBasis::Ceav => number(&right.get(Column::CeavPat)) + number(&right.get(Column::CeavObr)),
            };
            (basis, deltas.get(&Column::TotalRcv).copied().unwrap_or(0.0))
        }
    };

    let expected = basis / right_days as f64 * lost_days;
    log::debug!(
        "{}: total delta {measured:.2}, expected from {lost_days} lost days {expected:.2}",
        left.nss()
    );
    if (measured.abs() - expected.abs()).abs() < params.disability_band {
        Some(Observation::ExplainedByDisability)
    } else {
        Some(Observation::Differences)
    }
}

/// A row present only on the left: raw values, no deltas.
pub fn classify_left_only<R: Record>(key: String, left: &R, layout: &Layout) -> ReconciledRow {
    let cells = layout.left.iter().map(|c| (*c, left.get(*c))).collect();
    ReconciledRow {
        key,
        registration: left.registration().to_string(),
        name: left.name().to_string(),
        disposition: Disposition::LeftOnly,
        cells,
        deltas: BTreeMap::new(),
        observations: vec![Observation::NotInEmission],
    }
}

/// A row present only on the right: identity fields only.
pub fn classify_right_only<R: Record>(key: String, right: &R, layout: &Layout) -> ReconciledRow {
    let mut cells = CellMap::new();
    cells.insert(Column::Rp, Value::text(right.registration()));
    cells.insert(Column::Nss, Value::text(right.nss().as_str()));
    cells.insert(Column::Name, Value::text(right.name()));
    let mut carried = RIGHT_IDENTITY.to_vec();
    if layout.sub_schema == SubSchema::Bimonthly {
        carried.extend([Column::CreditType, Column::CreditValue, Column::CreditNumber]);
    }
    for column in carried {
        if layout.right_has(column) {
            cells.insert(column, right.get(column));
        }
    }
    ReconciledRow {
        key,
        registration: right.registration().to_string(),
        name: right.name().to_string(),
        disposition: Disposition::RightOnly,
        cells,
        deltas: BTreeMap::new(),
        observations: vec![Observation::NotInDeclaration],
    }
}
