// XLSX report writer.
//
// One worksheet per table, styled header row, auto-sized columns. The file
// is saved under a temporary name and renamed into place, so a failure
// never leaves a half-written file under the final name.

use std::fs;
use std::path::{Path, PathBuf};

use confronta_config::{Palette, ReportSettings};
use confronta_core::{Record, Table, Value};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook as XlsxWorkbook};

use crate::error::SourceError;

/// A named grid of values ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Sheet {
    pub fn from_table<R: Record>(name: &str, table: &Table<R>) -> Self {
        Self {
            name: name.to_string(),
            headers: table.columns.iter().map(|c| c.header().to_string()).collect(),
            rows: table.rows.iter().map(|r| table.cells(r)).collect(),
        }
    }

    /// Column widths: longest rendered value + 2, capped.
    pub fn column_widths(&self, max_width: f64) -> Vec<f64> {
        self.headers
            .iter()
            .enumerate()
            .map(|(col, header)| {
                let longest = self
                    .rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .map(|v| v.to_string().chars().count())
                    .chain(std::iter::once(header.chars().count()))
                    .max()
                    .unwrap_or(0);
                ((longest + 2) as f64).min(max_width)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderStyle {
    pub fill: u32,
    pub font: u32,
    pub centered: bool,
}

impl HeaderStyle {
    pub fn from_palette(palette: &Palette, centered: bool) -> Result<Self, SourceError> {
        let fill = palette.fill_rgb().map_err(|e| SourceError::Validation(e.to_string()))?;
        let font = palette.font_rgb().map_err(|e| SourceError::Validation(e.to_string()))?;
        Ok(Self { fill, font, centered })
    }

    fn format(&self) -> Format {
        let format = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(self.fill))
            .set_font_color(Color::RGB(self.font));
        if self.centered {
            format.set_align(FormatAlign::Center)
        } else {
            format
        }
    }
}

/// Write `sheets` to `path` atomically. Returns `path`.
pub fn write_workbook(
    path: &Path,
    sheets: &[Sheet],
    style: &HeaderStyle,
    settings: &ReportSettings,
) -> Result<PathBuf, SourceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| SourceError::write(parent, e))?;
    }

    let mut workbook = XlsxWorkbook::new();
    let header_format = style.format();

    for sheet in sheets {
        let worksheet = workbook
            .add_worksheet()
            .set_name(&sheet.name)
            .map_err(|e| SourceError::write(path, format!("Failed to create sheet '{}': {}", sheet.name, e)))?;

        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, header, &header_format)
                .map_err(|e| SourceError::write(path, e))?;
        }

        for (row_idx, row) in sheet.rows.iter().enumerate() {
            let r = row_idx as u32 + 1;
            for (col, value) in row.iter().enumerate() {
                let c = col as u16;
                let written = match value {
                    Value::Empty => continue,
                    Value::Text(s) => worksheet.write_string(r, c, s),
                    Value::Int(n) => worksheet.write_number(r, c, *n as f64),
                    Value::Number(n) if n.is_finite() => worksheet.write_number(r, c, *n),
                    Value::Number(_) => continue,
                };
                written.map_err(|e| SourceError::write(path, e))?;
            }
        }

        for (col, width) in sheet.column_widths(settings.max_column_width).into_iter().enumerate() {
            worksheet
                .set_column_width(col as u16, width)
                .map_err(|e| SourceError::write(path, e))?;
        }
        log::debug!("sheet '{}': {} rows", sheet.name, sheet.rows.len());
    }

    let tmp_path = path.with_extension("xlsx.tmp");
    if let Err(e) = workbook.save(&tmp_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(SourceError::write(path, format!("Failed to save XLSX file: {}", e)));
    }
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        SourceError::write(path, e)
    })?;

    log::info!("wrote {}", path.display());
    Ok(path.to_path_buf())
}

/// Export one sheet as CSV (header row + values), atomically.
pub fn write_csv(path: &Path, sheet: &Sheet) -> Result<PathBuf, SourceError> {
    let tmp_path = path.with_extension("csv.tmp");
    let result = (|| -> Result<(), Box<dyn std::error::Error>> {
        let mut wtr = csv::Writer::from_path(&tmp_path)?;
        wtr.write_record(&sheet.headers)?;
        for row in &sheet.rows {
            wtr.write_record(row.iter().map(|v| v.to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(SourceError::write(path, e));
    }
    fs::rename(&tmp_path, path).map_err(|e| SourceError::write(path, e))?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> Sheet {
        Sheet {
            name: "MENSUAL".to_string(),
            headers: vec!["RP".to_string(), "OBSERVACIONES".to_string()],
            rows: vec![
                vec![Value::text("Y5412345105"), Value::text("NO DIFFERENCES")],
                vec![Value::Empty, Value::text("X".repeat(80))],
            ],
        }
    }

    #[test]
    fn widths_are_capped() {
        assert_eq!(sheet().column_widths(50.0), vec![13.0, 50.0]);
    }

    #[test]
    fn writes_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("06_2024_CONFRONTA.xlsx");
        let style = HeaderStyle { fill: 0x8B008B, font: 0x00FF00, centered: false };
        let written = write_workbook(&path, &[sheet()], &style, &ReportSettings::default()).unwrap();
        assert_eq!(written, path);
        assert!(path.exists());
        assert!(!path.with_extension("xlsx.tmp").exists());
    }

    #[test]
    fn duplicate_sheet_names_fail_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.xlsx");
        let style = HeaderStyle { fill: 0, font: 0xFFFFFF, centered: true };
        let err = write_workbook(&path, &[sheet(), sheet()], &style, &ReportSettings::default());
        assert!(err.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MENSUAL.csv");
        write_csv(&path, &sheet()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("RP,OBSERVACIONES\nY5412345105,NO DIFFERENCES\n"));
    }
}
