// Fixed-width ledger (.SUA) decoder.
//
// Records are located by an anchor token built from the file header and
// decoded through the active `LedgerLayout`. A record that fails to decode is
// logged and dropped; the scan always advances one full record past each
// anchor match.

use std::fs;
use std::path::Path;

use confronta_config::{HeaderSpec, LedgerField as L, LedgerLayout, Settings};
use confronta_core::{
    normalize_credit_number, normalize_name, BimonthlyRow, Demographics, MonthlyFees, MonthlyRow,
    Nss, Origin, Period, SchemaVariant, Table,
};
use serde::Serialize;

use crate::error::{DecodeError, SourceError};
use crate::normalized::Normalized;
use crate::slice::{decode_text, slice_record, Fields, NumericPolicy};

pub const LEDGER_EXTENSION: &str = "sua";

pub fn is_ledger_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(LEDGER_EXTENSION))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerHeader {
    pub period: Period,
    pub registration: String,
    /// Token that opens every worker record.
    pub anchor: Vec<u8>,
}

impl LedgerHeader {
    pub fn read(bytes: &[u8], spec: &HeaderSpec) -> Result<Self, SourceError> {
        if bytes.len() < spec.min_len() {
            return Err(SourceError::Validation(format!(
                "ledger header needs {} bytes, file has {}",
                spec.min_len(),
                bytes.len()
            )));
        }
        let year = decode_text(&bytes[spec.year_start..spec.year_start + 4]);
        let month = decode_text(&bytes[spec.month_start..spec.month_start + 2]);
        let period = Period::from_digits(&month, &year).ok_or_else(|| {
            SourceError::Validation(format!("ledger header period '{month}/{year}' is not a valid month/year"))
        })?;
        let registration = decode_text(
            &bytes[spec.registration_start..spec.registration_start + spec.registration_len],
        );
        let mut anchor = spec.anchor_prefix.as_bytes().to_vec();
        anchor.extend_from_slice(&bytes[spec.anchor_start..spec.anchor_start + spec.anchor_len]);
        Ok(Self { period, registration, anchor })
    }
}

// ---------------------------------------------------------------------------
// Record scan
// ---------------------------------------------------------------------------

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Start offsets of every complete record in a ledger.
pub struct RecordOffsets<'a> {
    bytes: &'a [u8],
    anchor: &'a [u8],
    record_len: usize,
    cursor: usize,
}

impl<'a> RecordOffsets<'a> {
    pub fn new(bytes: &'a [u8], anchor: &'a [u8], record_len: usize) -> Self {
        Self { bytes, anchor, record_len, cursor: 0 }
    }
}

impl Iterator for RecordOffsets<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let start = find(self.bytes, self.anchor, self.cursor)?;
        if start + self.record_len > self.bytes.len() {
            self.cursor = self.bytes.len();
            return None;
        }
        self.cursor = start + self.record_len;
        Some(start)
    }
}

fn identity(fields: &Fields<L>, offset: usize, names: &[(char, char)]) -> Result<(String, Nss, String), DecodeError> {
    let raw_nss = fields.text(L::Nss);
    let nss = Nss::parse(raw_nss)
        .ok_or_else(|| DecodeError::new(offset, "Nss", format!("'{raw_nss}' is not an 11-digit NSS")))?;
    Ok((
        fields.text(L::Registration).to_string(),
        nss,
        normalize_name(fields.text(L::Name), names),
    ))
}

fn demographics(fields: &Fields<L>) -> Demographics {
    Demographics {
        tax_id: fields.opt_text(L::TaxId),
        national_id: fields.opt_text(L::NationalId),
        movements: fields.opt_text(L::Movements),
    }
}

/// Decode the monthly view of the record at `start`.
pub fn decode_monthly(
    bytes: &[u8],
    start: usize,
    layout: &LedgerLayout,
    names: &[(char, char)],
) -> Result<MonthlyRow, DecodeError> {
    let fields = slice_record(bytes, start, &layout.monthly, NumericPolicy::Strict, start)?;
    let (registration, nss, name) = identity(&fields, start, names)?;
    let fees = MonthlyFees {
        cf: fields.amount(L::Cf),
        exc_pat: fields.amount(L::ExcPat),
        exc_obr: fields.amount(L::ExcObr),
        pd_pat: fields.amount(L::PdPat),
        pd_obr: fields.amount(L::PdObr),
        gmp_pat: fields.amount(L::GmpPat),
        gmp_obr: fields.amount(L::GmpObr),
        rt: fields.amount(L::Rt),
        iv_pat: fields.amount(L::IvPat),
        iv_obr: fields.amount(L::IvObr),
        gps: fields.amount(L::Gps),
    };
    Ok(MonthlyRow {
        registration,
        nss,
        name,
        demographics: demographics(&fields),
        credit_number: normalize_credit_number(fields.text(L::CreditNumber)),
        disability_days: fields.opt_int(L::DisabilityDays),
        absence_days: fields.opt_int(L::AbsenceDays),
        days: fields.int(L::Days),
        wage: fields.amount(L::Wage),
        total: fees.sum(),
        fees,
    })
}

/// Decode the bimonthly view of the record at `start`.
pub fn decode_bimonthly(
    bytes: &[u8],
    start: usize,
    layout: &LedgerLayout,
    names: &[(char, char)],
) -> Result<BimonthlyRow, DecodeError> {
    let fields = slice_record(bytes, start, &layout.bimonthly, NumericPolicy::Strict, start)?;
    let (registration, nss, name) = identity(&fields, start, names)?;
    let retirement = fields.amount(L::Retirement);
    let ceav_pat = fields.amount(L::CeavPat);
    let ceav_obr = fields.amount(L::CeavObr);
    let housing_pat = fields.amount(L::HousingPat);
    let amortization = fields.amount(L::Amortization);
    let total_rcv = retirement + ceav_pat + ceav_obr;
    let total_inf = housing_pat + amortization;
    Ok(BimonthlyRow {
        registration,
        nss,
        name,
        demographics: demographics(&fields),
        disability_days: fields.opt_int(L::DisabilityDays),
        absence_days: fields.opt_int(L::AbsenceDays),
        days: fields.int(L::Days),
        wage: fields.amount(L::Wage),
        credit_number: normalize_credit_number(fields.text(L::CreditNumber)),
        credit_type: None,
        credit_value: None,
        retirement,
        ceav_pat,
        ceav_obr,
        total_rcv,
        housing_pat,
        amortization,
        total_inf,
        total: total_rcv + total_inf,
    })
}

#[derive(Debug, Default)]
pub struct LedgerScan {
    pub records: usize,
    pub monthly: Vec<MonthlyRow>,
    pub bimonthly: Vec<BimonthlyRow>,
    pub failures: Vec<DecodeError>,
}

/// Decode every record. The bimonthly view is decoded only when `variant`
/// calls for it.
pub fn scan(
    bytes: &[u8],
    header: &LedgerHeader,
    layout: &LedgerLayout,
    variant: SchemaVariant,
    names: &[(char, char)],
) -> LedgerScan {
    let mut out = LedgerScan::default();
    for start in RecordOffsets::new(bytes, &header.anchor, layout.record_len) {
        out.records += 1;
        match decode_monthly(bytes, start, layout, names) {
            Ok(row) => out.monthly.push(row),
            Err(e) => {
                log::warn!("skipping monthly {e}");
                out.failures.push(e);
            }
        }
        if variant.has_bimonthly() {
            match decode_bimonthly(bytes, start, layout, names) {
                Ok(row) => out.bimonthly.push(row),
                Err(e) => {
                    log::warn!("skipping bimonthly {e}");
                    out.failures.push(e);
                }
            }
        }
    }
    out
}

/// Decode a whole ledger held in memory.
pub fn decode_ledger(bytes: &[u8], layout: &LedgerLayout, names: &[(char, char)]) -> Result<Normalized, SourceError> {
    let header = LedgerHeader::read(bytes, &layout.header)?;
    let variant = header.period.variant();
    let scan = scan(bytes, &header, layout, variant, names);
    log::info!(
        "ledger {} period {}: {} records, {} decode failures",
        header.registration,
        header.period,
        scan.records,
        scan.failures.len()
    );

    let mut monthly = Table::for_origin(Origin::Ledger);
    monthly.rows = scan.monthly;
    let bimonthly = variant.has_bimonthly().then(|| {
        let mut table = Table::for_origin(Origin::Ledger);
        table.rows = scan.bimonthly;
        table
    });

    let mut normalized = Normalized {
        period: header.period,
        variant,
        registration: Some(header.registration),
        monthly,
        bimonthly,
        skipped_records: scan.failures.len(),
    };
    normalized.finish();
    if normalized.monthly.is_empty() {
        return Err(SourceError::Empty(format!(
            "no worker records with days worked ({} records scanned)",
            scan.records
        )));
    }
    Ok(normalized)
}

/// Structure one `.SUA` file with the configured layout.
pub fn structure_ledger(path: &Path, settings: &Settings) -> Result<Normalized, SourceError> {
    if !path.is_file() {
        return Err(SourceError::Validation(format!("{} is not a file", path.display())));
    }
    if !is_ledger_file(path) {
        return Err(SourceError::Validation(format!("{} does not have a .SUA extension", path.display())));
    }
    let layout = settings
        .ledger
        .active_layout()
        .map_err(|e| SourceError::Validation(e.to_string()))?;
    let bytes = fs::read(path).map_err(|e| SourceError::read(path, e))?;
    log::debug!("decoding {} with layout '{}'", path.display(), layout.name);
    decode_ledger(&bytes, &layout, &settings.names.pairs())
}

// ---------------------------------------------------------------------------
// Layout check
// ---------------------------------------------------------------------------

/// How well a layout decodes a sample file.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutScore {
    pub layout: String,
    pub records: usize,
    pub decoded: usize,
    pub failed: usize,
    /// Decoded monthly rows whose worker shares exceed the employer share
    /// slot they are subtracted from (negative employer share).
    pub negative_shares: usize,
}

impl LayoutScore {
    pub fn ratio(&self) -> f64 {
        if self.records == 0 {
            0.0
        } else {
            self.decoded as f64 / self.records as f64
        }
    }
}

pub fn score_layout(bytes: &[u8], layout: &LedgerLayout, names: &[(char, char)]) -> Result<LayoutScore, SourceError> {
    let header = LedgerHeader::read(bytes, &layout.header)?;
    let scan = scan(bytes, &header, layout, header.period.variant(), names);
    let negative_shares = scan
        .monthly
        .iter()
        .filter(|r| r.fees.exc_pat < 0.0 || r.fees.pd_pat < 0.0 || r.fees.gmp_pat < 0.0 || r.fees.iv_pat < 0.0)
        .count();
    Ok(LayoutScore {
        layout: layout.name.clone(),
        records: scan.records,
        decoded: scan.monthly.len(),
        failed: scan.records - scan.monthly.len(),
        negative_shares,
    })
}
