// Calamine helpers shared by the workbook readers.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use chrono::{Days, NaiveDate};
use confronta_core::Value;

use crate::error::SourceError;

pub type Workbook = Sheets<BufReader<File>>;

pub fn open(path: &Path) -> Result<Workbook, SourceError> {
    open_workbook_auto(path).map_err(|e| SourceError::read(path, format!("Failed to open Excel file: {}", e)))
}

/// Worksheet by position, with its name.
pub fn sheet_at(workbook: &mut Workbook, index: usize, path: &Path) -> Result<(String, Range<Data>), SourceError> {
    let name = workbook
        .sheet_names()
        .get(index)
        .cloned()
        .ok_or_else(|| SourceError::Validation(format!("{} has no worksheet #{}", path.display(), index + 1)))?;
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| SourceError::read(path, format!("Failed to read sheet '{}': {}", name, e)))?;
    Ok((name, range))
}

pub fn to_value(data: &Data) -> Value {
    match data {
        Data::Empty | Data::Error(_) => Value::Empty,
        Data::String(s) => Value::Text(s.clone()),
        Data::Int(n) => Value::Int(*n),
        Data::Float(f) => Value::Number(*f),
        Data::Bool(b) => Value::Text(b.to_string()),
        Data::DateTime(dt) => Value::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

/// Cell as trimmed text. Integral floats render without a fractional part,
/// so numeric ids keep their digits.
pub fn text(data: &Data) -> Option<String> {
    let s = match data {
        Data::String(s) | Data::DateTimeIso(s) => s.trim().to_string(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

pub fn number(data: &Data) -> Option<f64> {
    match data {
        Data::Int(n) => Some(*n as f64),
        Data::Float(f) => Some(*f),
        Data::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Excel serial day number (1900 system) to a date.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}

/// Date cell. A literal `-` and anything unparsable read as no date.
pub fn date(data: &Data) -> Option<NaiveDate> {
    match data {
        Data::DateTime(dt) => serial_to_date(dt.as_f64()),
        Data::Float(f) => serial_to_date(*f),
        Data::Int(n) => serial_to_date(*n as f64),
        Data::String(s) | Data::DateTimeIso(s) => {
            let s = s.trim();
            if s.is_empty() || s == "-" {
                return None;
            }
            let head = s.get(..10).unwrap_or(s);
            ["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d"]
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(head, fmt).ok())
        }
        _ => None,
    }
}

/// Lowercase, accents folded, whitespace collapsed.
pub fn fold_header(raw: &str) -> String {
    let folded: String = raw
        .chars()
        .map(|c| match c {
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' | 'ü' | 'Ü' => 'u',
            'ñ' | 'Ñ' => 'n',
            other => other.to_ascii_lowercase(),
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Column positions of a header row, keyed by folded header text.
#[derive(Debug, Default)]
pub struct HeaderIndex {
    columns: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn from_row(cells: &[Data]) -> Self {
        let mut columns = HashMap::new();
        for (idx, cell) in cells.iter().enumerate() {
            if let Some(h) = text(cell) {
                columns.entry(fold_header(&h)).or_insert(idx);
            }
        }
        Self { columns }
    }

    pub fn position(&self, header: &str) -> Option<usize> {
        self.columns.get(&fold_header(header)).copied()
    }

    pub fn contains(&self, header: &str) -> bool {
        self.position(header).is_some()
    }
}

/// One data row addressed by header.
pub struct RowView<'a> {
    pub cells: &'a [Data],
    pub header: &'a HeaderIndex,
}

impl<'a> RowView<'a> {
    pub fn get(&self, header: &str) -> Option<&'a Data> {
        self.header.position(header).and_then(|idx| self.cells.get(idx))
    }

    pub fn text(&self, header: &str) -> Option<String> {
        self.get(header).and_then(text)
    }

    /// Missing or blank cells are 0.
    pub fn number(&self, header: &str) -> f64 {
        self.get(header).and_then(number).unwrap_or(0.0)
    }

    pub fn opt_number(&self, header: &str) -> Option<f64> {
        self.get(header).and_then(number)
    }

    pub fn date(&self, header: &str) -> Option<NaiveDate> {
        self.get(header).and_then(date)
    }
}

/// Rows below the header at absolute row `header_row`, with the header index.
pub fn rows_below(range: &Range<Data>, header_row: u32) -> Option<(HeaderIndex, Vec<&[Data]>)> {
    let (start_row, _) = range.start()?;
    if header_row < start_row {
        return None;
    }
    let skip = (header_row - start_row) as usize;
    let mut rows = range.rows().skip(skip);
    let header = HeaderIndex::from_row(rows.next()?);
    Some((header, rows.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_headers() {
        assert_eq!(fold_header("  Días "), "dias");
        assert_eq!(fold_header("Cesantía en Edad  Avanzada"), "cesantia en edad avanzada");
        assert_eq!(fold_header("Número de Crédito"), "numero de credito");
    }

    #[test]
    fn text_keeps_integer_digits() {
        assert_eq!(text(&Data::Float(12345678901.0)).as_deref(), Some("12345678901"));
        assert_eq!(text(&Data::String("  x ".into())).as_deref(), Some("x"));
        assert_eq!(text(&Data::String("  ".into())), None);
    }

    #[test]
    fn dates() {
        assert_eq!(date(&Data::String("-".into())), None);
        assert_eq!(date(&Data::String("15/06/2024".into())), NaiveDate::from_ymd_opt(2024, 6, 15));
        assert_eq!(serial_to_date(45458.0), NaiveDate::from_ymd_opt(2024, 6, 15));
    }

    #[test]
    fn numbers() {
        assert_eq!(number(&Data::String("1,234.50".into())), Some(1234.5));
        assert_eq!(number(&Data::Int(3)), Some(3.0));
        assert_eq!(number(&Data::Empty), None);
    }
}
