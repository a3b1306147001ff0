// Read structured workbooks (our own outputs, or compatible ones) back into
// typed tables for reconciliation.

use std::collections::BTreeMap;
use std::path::Path;

use calamine::{Data, Range};
use confronta_core::{BimonthlyRow, Column, MonthlyRow, Record, Table};

use crate::error::SourceError;
use crate::grid;
use crate::naming::period_from_file_name;
use crate::normalized::Normalized;

/// Typed rows of one worksheet plus the number of rows that did not parse.
/// The first row is the header; columns with unknown headers are ignored.
pub fn read_range<R: Record>(sheet: &str, range: &Range<Data>) -> Result<(Table<R>, usize), SourceError> {
    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| SourceError::Validation(format!("sheet '{sheet}' is empty")))?;

    let mut positions = Vec::new();
    for (idx, cell) in header.iter().enumerate() {
        let Some(text) = grid::text(cell) else { continue };
        match Column::from_header(&text) {
            Some(column) if !positions.iter().any(|(_, c)| *c == column) => positions.push((idx, column)),
            Some(_) => log::warn!("sheet '{sheet}': duplicate column '{text}' ignored"),
            None => log::debug!("sheet '{sheet}': ignoring column '{text}'"),
        }
    }
    for required in [Column::Rp, Column::Nss, Column::Days] {
        if !positions.iter().any(|(_, c)| *c == required) {
            return Err(SourceError::MissingColumn { sheet: sheet.to_string(), column: required.header().to_string() });
        }
    }

    let mut table = Table::new(positions.iter().map(|(_, c)| *c).collect());
    let mut skipped = 0;
    for (line, cells) in rows.enumerate() {
        if cells.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let map: BTreeMap<Column, _> = positions
            .iter()
            .map(|(idx, column)| (*column, cells.get(*idx).map(grid::to_value).unwrap_or_default()))
            .collect();
        match R::from_cells(&map) {
            Ok(row) => table.rows.push(row),
            Err(e) => {
                log::warn!("sheet '{sheet}' row {}: {}", line + 2, e);
                skipped += 1;
            }
        }
    }
    Ok((table, skipped))
}

/// Load a structured workbook. The period comes from the `MM-YYYY` in its
/// file name; the first sheet is monthly and, for even months, the second is
/// bimonthly.
pub fn read_normalized(path: &Path) -> Result<Normalized, SourceError> {
    let period = period_from_file_name(path).ok_or_else(|| {
        SourceError::Validation(format!("cannot find a MM-YYYY period in file name {}", path.display()))
    })?;
    let variant = period.variant();
    let mut workbook = grid::open(path)?;

    let (name, range) = grid::sheet_at(&mut workbook, 0, path)?;
    let (monthly, mut skipped_records) = read_range::<MonthlyRow>(&name, &range)?;

    let bimonthly = if variant.has_bimonthly() {
        let (name, range) = grid::sheet_at(&mut workbook, 1, path).map_err(|_| {
            SourceError::Validation(format!(
                "{} is for even month {} but has no bimonthly sheet",
                path.display(),
                period
            ))
        })?;
        let (table, skipped) = read_range::<BimonthlyRow>(&name, &range)?;
        skipped_records += skipped;
        Some(table)
    } else {
        None
    };

    let mut normalized =
        Normalized { period, variant, registration: None, monthly, bimonthly, skipped_records };
    normalized.monthly.drop_idle();
    if let Some(b) = normalized.bimonthly.as_mut() {
        b.drop_idle();
    }
    log::debug!("{}: {} rows for {}", path.display(), normalized.row_count(), period);
    Ok(normalized)
}
