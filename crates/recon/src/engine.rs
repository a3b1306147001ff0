use confronta_core::{Column, Period, Record, SchemaVariant, SubSchema, Table};

use crate::classify::{classify_both, classify_left_only, classify_right_only, Layout};
use crate::config::ReconParams;
use crate::error::ReconError;
use crate::evidence::compute_summary;
use crate::matcher::match_exact_key;
use crate::model::{ReconInput, ReconOutput, Reconciliation};

/// Columns both sides must carry for any comparison to make sense.
const REQUIRED: [Column; 4] = [Column::Rp, Column::Nss, Column::Days, Column::Total];

/// Reconcile a declaration (left) against an emission or second declaration
/// (right). Both must cover the same period; even months reconcile the
/// bimonthly tables too.
pub fn run(left: &ReconInput, right: &ReconInput, params: &ReconParams) -> Result<ReconOutput, ReconError> {
    let variant = check_periods(left.period, right.period)?;

    let monthly = reconcile(left.monthly, right.monthly, params)?;

    let bimonthly = if variant.has_bimonthly() {
        match (left.bimonthly, right.bimonthly) {
            (Some(l), Some(r)) => Some(reconcile(l, r, params)?),
            (None, _) => {
                return Err(ReconError::SchemaMismatch(format!(
                    "{} is an even month but the {} has no bimonthly table",
                    left.period,
                    params.profile.left_label()
                )))
            }
            (_, None) => {
                return Err(ReconError::SchemaMismatch(format!(
                    "{} is an even month but the {} has no bimonthly table",
                    right.period,
                    params.profile.right_label()
                )))
            }
        }
    } else {
        if left.bimonthly.is_some() || right.bimonthly.is_some() {
            log::warn!("{}: odd month, ignoring bimonthly tables", left.period);
        }
        None
    };

    Ok(ReconOutput { period: left.period, variant, monthly, bimonthly })
}

/// Both inputs must be for one period. Returns the variant it implies.
pub fn check_periods(left: Period, right: Period) -> Result<SchemaVariant, ReconError> {
    if left != right {
        return Err(ReconError::PeriodMismatch { left, right });
    }
    Ok(left.variant())
}

/// Reconcile two tables of one sub-schema.
pub fn reconcile<R: Record>(
    left: &Table<R>,
    right: &Table<R>,
    params: &ReconParams,
) -> Result<Reconciliation, ReconError> {
    let profile = params.profile;
    for column in REQUIRED {
        if !left.has_column(column) {
            return Err(ReconError::MissingColumn { side: profile.left_label().to_string(), column });
        }
        if !right.has_column(column) {
            return Err(ReconError::MissingColumn { side: profile.right_label().to_string(), column });
        }
    }

    let sub_schema = R::SUB_SCHEMA;
    let layout = Layout::new(sub_schema, &left.columns, &right.columns, profile);
    let pairs = match_exact_key(&left.rows, &right.rows, profile);

    let mut rows = Vec::with_capacity(pairs.matched.len() + pairs.left_only.len() + pairs.right_only.len());
    for (key, l, r) in pairs.matched {
        rows.push(classify_both(key, l, r, &layout, params));
    }
    for (key, l) in pairs.left_only {
        rows.push(classify_left_only(key, l, &layout));
    }
    for (key, r) in pairs.right_only {
        rows.push(classify_right_only(key, r, &layout));
    }
    rows.sort_by(|a, b| {
        a.registration
            .cmp(&b.registration)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.key.cmp(&b.key))
    });

    let summary = compute_summary(&rows);
    log::info!(
        "{sub_schema}: {} matched, {} only in {}, {} only in {}",
        summary.both,
        summary.left_only,
        profile.left_label(),
        summary.right_only,
        profile.right_label()
    );

    Ok(Reconciliation {
        sub_schema,
        columns: output_columns(&layout),
        rows,
        summary,
    })
}

/// Left columns in order. Bimonthly tables get the credit type and value
/// right before the credit number. Observations go last.
fn output_columns(layout: &Layout) -> Vec<Column> {
    let mut columns: Vec<Column> = layout
        .left
        .iter()
        .copied()
        .filter(|c| *c != Column::Observations)
        .collect();
    if layout.sub_schema == SubSchema::Bimonthly {
        let credit = [Column::CreditType, Column::CreditValue];
        columns.retain(|c| !credit.contains(c));
        match columns.iter().position(|c| *c == Column::CreditNumber) {
            Some(at) => {
                columns.splice(at..at, credit);
            }
            None => columns.extend(credit),
        }
    }
    columns.push(Column::Observations);
    columns
}
