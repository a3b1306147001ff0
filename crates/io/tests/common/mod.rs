// Fixture builders: synthetic ledgers and emission workbooks.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use confronta_io::base62;
use rust_xlsxwriter::Workbook;

pub const RP: &str = "Y5412345105";
pub const RECORD_LEN: usize = 295;

pub fn put(buf: &mut Vec<u8>, start: usize, text: &str) {
    if buf.len() < start + text.len() {
        buf.resize(start + text.len(), b' ');
    }
    buf[start..start + text.len()].copy_from_slice(text.as_bytes());
}

fn cents(value: f64, width: usize) -> String {
    format!("{:0width$}", (value * 100.0).round() as u64, width = width)
}

fn packed(value: f64) -> String {
    base62::encode((value * 100.0).round() as u64, 3)
}

/// One worker record in the built-in `separate` layout.
#[derive(Debug, Clone, Default)]
pub struct LedgerWorker {
    pub nss: String,
    pub name: String,
    pub credit: String,
    pub days: u32,
    pub wage: f64,
    pub disability: u32,
    pub absence: u32,
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
    pub retirement: f64,
    pub ceav_pat: f64,
    pub ceav_obr: f64,
    pub housing: f64,
    pub amortization: f64,
}

impl LedgerWorker {
    pub fn new(nss: &str, name: &str, days: u32, wage: f64) -> Self {
        Self { nss: nss.to_string(), name: name.to_string(), days, wage, ..Default::default() }
    }

    pub fn record(&self) -> Vec<u8> {
        let mut r = vec![b' '; RECORD_LEN];
        put(&mut r, 0, "03");
        put(&mut r, 2, RP);
        put(&mut r, 33, &self.nss);
        put(&mut r, 75, &self.credit);
        put(&mut r, 95, &self.name);
        put(&mut r, 145, &cents(self.wage, 7));
        put(&mut r, 154, &format!("{:02}", self.days));
        put(&mut r, 156, &format!("{:02}", self.disability));
        put(&mut r, 158, &format!("{:02}", self.absence));
        for (start, value) in [
            (160, self.cf),
            (167, self.exc_pat),
            (174, self.pd_pat),
            (181, self.gmp_pat),
            (188, self.rt),
            (195, self.iv_pat),
            (202, self.gps),
            (209, self.retirement),
            (216, self.ceav_pat),
            (223, self.ceav_obr),
            (237, self.housing),
            (244, self.amortization),
        ] {
            put(&mut r, start, &cents(value, 7));
        }
        for (start, value) in [(278, self.exc_obr), (281, self.pd_obr), (284, self.gmp_obr), (287, self.iv_obr)] {
            put(&mut r, start, &packed(value));
        }
        r.truncate(RECORD_LEN);
        r
    }
}

pub fn ledger_bytes(month: u32, year: u32, workers: &[LedgerWorker]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut header = Vec::new();
    put(&mut header, 0, "01");
    put(&mut header, 2, RP);
    put(&mut header, 26, &format!("{year:04}{month:02}"));
    put(&mut header, 40, "\r\n");
    out.extend(header);
    for w in workers {
        out.extend(w.record());
        out.extend_from_slice(b"\r\n");
    }
    out
}

pub fn write_ledger(dir: &Path, file: &str, month: u32, year: u32, workers: &[LedgerWorker]) -> PathBuf {
    let path = dir.join(file);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, ledger_bytes(month, year, workers)).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Emission workbooks
// ---------------------------------------------------------------------------

pub const MONTHLY_HEADERS: [&str; 17] = [
    "Tipo del Movimiento",
    "NSS",
    "Nombre",
    "Fecha del Movimiento",
    "Días",
    "Salario Diario",
    "Cuota Fija",
    "Excedente Patronal",
    "Excedente Obrero",
    "Prestaciones en Dinero Patronal",
    "Prestaciones en Dinero Obrero",
    "Gastos Médicos y Pensionados Patronal",
    "Gastos Médicos y Pensionados Obrero",
    "Riesgos de Trabajo",
    "Invalidez y Vida Patronal",
    "Invalidez y Vida Obrero",
    "Guarderías y Prestaciones Sociales",
];

pub const BIMONTHLY_HEADERS: [&str; 16] = [
    "Tipo del Movimiento",
    "NSS",
    "Nombre",
    "Fecha del Movimiento",
    "Días",
    "Salario Diario",
    "Retiro",
    "Cesantía en Edad Avanzada y Vejez Patronal",
    "Cesantía en Edad Avanzada y Vejez Obrero",
    "Subtotal RCV",
    "Aportación Patronal",
    "Tipo de Descuento",
    "Valor de Descuento",
    "Número de Crédito",
    "Amortización",
    "Subtotal Infonavit",
];

/// One movement line. `amounts` fill the amount columns in header order,
/// skipping the credit columns; `Total` is written last.
#[derive(Debug, Clone)]
pub struct Movement {
    pub kind: u32,
    pub nss: String,
    pub name: String,
    pub date: String,
    pub days: u32,
    pub wage: f64,
    pub amounts: Vec<f64>,
    pub credit: Option<(String, f64, String)>,
}

impl Movement {
    pub fn new(nss: &str, name: &str, date: &str, days: u32, wage: f64, amounts: &[f64]) -> Self {
        Self {
            kind: 1,
            nss: nss.to_string(),
            name: name.to_string(),
            date: date.to_string(),
            days,
            wage,
            amounts: amounts.to_vec(),
            credit: None,
        }
    }

    pub fn withdrawal(mut self) -> Self {
        self.kind = 2;
        self
    }
}

pub fn write_emission(
    path: &Path,
    period: &str,
    monthly: &[Movement],
    bimonthly: Option<&[Movement]>,
) -> PathBuf {
    let mut wb = Workbook::new();
    let meta = wb.add_worksheet().set_name("Datos").unwrap();
    meta.write_string(7, 0, "Periodo").unwrap();
    meta.write_string(7, 1, period).unwrap();
    meta.write_string(8, 0, "Registro Patronal").unwrap();
    meta.write_string(8, 1, RP).unwrap();

    let sheet = wb.add_worksheet().set_name("Mensual").unwrap();
    write_movements(sheet, &MONTHLY_HEADERS, monthly, false);
    if let Some(bimonthly) = bimonthly {
        let sheet = wb.add_worksheet().set_name("Bimestral").unwrap();
        write_movements(sheet, &BIMONTHLY_HEADERS, bimonthly, true);
    }
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    wb.save(path).unwrap();
    path.to_path_buf()
}

fn write_movements(sheet: &mut rust_xlsxwriter::Worksheet, headers: &[&str], rows: &[Movement], credit: bool) {
    sheet.write_string(0, 0, "Emisión").unwrap();
    for (c, h) in headers.iter().enumerate() {
        sheet.write_string(4, c as u16, *h).unwrap();
    }
    let total_col = headers.len() as u16;
    sheet.write_string(4, total_col, "Total").unwrap();
    for (i, m) in rows.iter().enumerate() {
        let r = 5 + i as u32;
        sheet.write_number(r, 0, m.kind as f64).unwrap();
        sheet.write_string(r, 1, &m.nss).unwrap();
        sheet.write_string(r, 2, &m.name).unwrap();
        sheet.write_string(r, 3, &m.date).unwrap();
        sheet.write_number(r, 4, m.days as f64).unwrap();
        sheet.write_number(r, 5, m.wage).unwrap();
        let mut col = 6u16;
        let mut amounts = m.amounts.iter();
        while col < total_col {
            let header = headers[col as usize];
            if credit && header == "Tipo de Descuento" {
                let (kind, _, _) = m.credit.clone().unwrap_or(("-".into(), 0.0, "-".into()));
                sheet.write_string(r, col, kind).unwrap();
            } else if credit && header == "Valor de Descuento" {
                let (_, value, _) = m.credit.clone().unwrap_or(("-".into(), 0.0, "-".into()));
                sheet.write_number(r, col, value).unwrap();
            } else if credit && header == "Número de Crédito" {
                let (_, _, number) = m.credit.clone().unwrap_or(("-".into(), 0.0, "-".into()));
                sheet.write_string(r, col, number).unwrap();
            } else {
                sheet.write_number(r, col, amounts.next().copied().unwrap_or(0.0)).unwrap();
            }
            col += 1;
        }
        // Bimonthly amounts: retiro, ceav pat/obr, subtotal RCV, aportacion,
        // amortizacion, subtotal infonavit.
        let total: f64 = if credit {
            m.amounts.get(3).copied().unwrap_or(0.0) + m.amounts.get(6).copied().unwrap_or(0.0)
        } else {
            m.amounts.iter().sum()
        };
        sheet.write_number(r, total_col, total).unwrap();
    }
}
