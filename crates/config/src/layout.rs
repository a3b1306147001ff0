//! Declarative fixed-width layouts.
//!
//! A layout is data: a list of `(field, start, len, decode)` entries read by
//! one generic slicer. Two ledger layouts ship built in because exports in
//! the wild disagree on how employer shares are stored; which one applies is
//! a settings choice, checked against sample files with `layout check`.

use std::collections::HashSet;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Field specs
// ---------------------------------------------------------------------------

/// How the bytes of one slice become a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decode {
    /// Trimmed text.
    Text,
    /// Plain integer (days, counters). Blank is 0.
    Int,
    /// Integer cents, divided by 100. Blank is 0.
    Cents,
    /// Decimal number written with its own point. Blank is 0.
    Decimal,
    /// Three base-62 characters holding cents.
    Base62Cents,
    /// Integer cents holding employer + worker shares; the field named by
    /// `minus` (a `base62_cents` field) is subtracted.
    CombinedCents,
    /// `dd-mm-yyyy`. Blank or unparsable is no date.
    Date,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec<F> {
    pub field: F,
    pub start: usize,
    pub len: usize,
    pub decode: Decode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minus: Option<F>,
}

impl<F> FieldSpec<F> {
    pub fn new(field: F, start: usize, len: usize, decode: Decode) -> Self {
        Self { field, start, len, decode, minus: None }
    }

    pub fn combined(field: F, start: usize, len: usize, minus: F) -> Self {
        Self { field, start, len, decode: Decode::CombinedCents, minus: Some(minus) }
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Check a field table: slices fit, no duplicates, required fields present,
/// every `minus` names a base-62 field of the same table.
pub fn validate_fields<F>(
    table: &str,
    fields: &[FieldSpec<F>],
    record_len: usize,
    required: &[F],
) -> Result<(), ConfigError>
where
    F: Copy + Eq + Hash + std::fmt::Debug,
{
    let mut seen = HashSet::new();
    for spec in fields {
        if spec.len == 0 {
            return Err(ConfigError::Validation(format!("{table}: field {:?} has zero length", spec.field)));
        }
        if spec.end() > record_len {
            return Err(ConfigError::Validation(format!(
                "{table}: field {:?} ends at {} past record length {record_len}",
                spec.field,
                spec.end()
            )));
        }
        if !seen.insert(spec.field) {
            return Err(ConfigError::Validation(format!("{table}: field {:?} declared twice", spec.field)));
        }
        match (spec.decode, spec.minus) {
            (Decode::CombinedCents, None) => {
                return Err(ConfigError::Validation(format!(
                    "{table}: field {:?} is combined_cents but names no `minus` field",
                    spec.field
                )));
            }
            (Decode::CombinedCents, Some(minus)) => {
                let target = fields.iter().find(|f| f.field == minus);
                if !matches!(target, Some(t) if t.decode == Decode::Base62Cents) {
                    return Err(ConfigError::Validation(format!(
                        "{table}: field {:?} subtracts {minus:?}, which is not a base62_cents field",
                        spec.field
                    )));
                }
            }
            _ => {}
        }
    }
    for field in required {
        if !seen.contains(field) {
            return Err(ConfigError::Validation(format!("{table}: required field {field:?} missing")));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Ledger layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerField {
    Registration,
    Nss,
    TaxId,
    NationalId,
    CreditNumber,
    Movements,
    Name,
    Wage,
    Days,
    DisabilityDays,
    AbsenceDays,
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
}

const REQUIRED_LEDGER_FIELDS: [LedgerField; 5] = [
    LedgerField::Registration,
    LedgerField::Nss,
    LedgerField::Name,
    LedgerField::Days,
    LedgerField::Wage,
];

/// File-level header positions, absolute from the start of the export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderSpec {
    /// Literal that opens every worker record.
    pub anchor_prefix: String,
    /// Bytes appended to the prefix to form the record anchor.
    pub anchor_start: usize,
    pub anchor_len: usize,
    pub year_start: usize,
    pub month_start: usize,
    pub registration_start: usize,
    pub registration_len: usize,
}

impl Default for HeaderSpec {
    fn default() -> Self {
        Self {
            anchor_prefix: "03".to_string(),
            anchor_start: 2,
            anchor_len: 3,
            year_start: 26,
            month_start: 30,
            registration_start: 2,
            registration_len: 11,
        }
    }
}

impl HeaderSpec {
    /// Bytes that must be present before the header can be read.
    pub fn min_len(&self) -> usize {
        (self.anchor_start + self.anchor_len)
            .max(self.year_start + 4)
            .max(self.month_start + 2)
            .max(self.registration_start + self.registration_len)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerLayout {
    pub name: String,
    #[serde(default = "default_record_len")]
    pub record_len: usize,
    #[serde(default)]
    pub header: HeaderSpec,
    pub monthly: Vec<FieldSpec<LedgerField>>,
    pub bimonthly: Vec<FieldSpec<LedgerField>>,
}

fn default_record_len() -> usize {
    295
}

impl LedgerLayout {
    pub const SEPARATE: &'static str = "separate";
    pub const COMBINED: &'static str = "combined";

    pub fn builtins() -> Vec<LedgerLayout> {
        vec![Self::separate(), Self::combined()]
    }

    /// Employer shares stored in their own cents fields; worker shares
    /// packed as base-62 at the tail of the record.
    pub fn separate() -> Self {
        use Decode::*;
        use LedgerField as L;
        let mut monthly = identity_fields();
        monthly.extend([
            FieldSpec::new(L::DisabilityDays, 156, 2, Int),
            FieldSpec::new(L::AbsenceDays, 158, 2, Int),
            FieldSpec::new(L::Cf, 160, 7, Cents),
            FieldSpec::new(L::ExcPat, 167, 7, Cents),
            FieldSpec::new(L::PdPat, 174, 7, Cents),
            FieldSpec::new(L::GmpPat, 181, 7, Cents),
            FieldSpec::new(L::Rt, 188, 7, Cents),
            FieldSpec::new(L::IvPat, 195, 7, Cents),
            FieldSpec::new(L::Gps, 202, 7, Cents),
            FieldSpec::new(L::ExcObr, 278, 3, Base62Cents),
            FieldSpec::new(L::PdObr, 281, 3, Base62Cents),
            FieldSpec::new(L::GmpObr, 284, 3, Base62Cents),
            FieldSpec::new(L::IvObr, 287, 3, Base62Cents),
        ]);
        Self {
            name: Self::SEPARATE.to_string(),
            record_len: default_record_len(),
            header: HeaderSpec::default(),
            monthly,
            bimonthly: bimonthly_fields(),
        }
    }

    /// Same slots, but each employer-share slot holds employer + worker and
    /// the base-62 worker share is subtracted out.
    pub fn combined() -> Self {
        use LedgerField as L;
        let mut layout = Self::separate();
        layout.name = Self::COMBINED.to_string();
        for spec in &mut layout.monthly {
            let minus = match spec.field {
                L::ExcPat => L::ExcObr,
                L::PdPat => L::PdObr,
                L::GmpPat => L::GmpObr,
                L::IvPat => L::IvObr,
                _ => continue,
            };
            *spec = FieldSpec::combined(spec.field, spec.start, spec.len, minus);
        }
        layout
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.record_len == 0 {
            return Err(ConfigError::Validation(format!("layout '{}': record_len is 0", self.name)));
        }
        if self.header.anchor_prefix.is_empty() {
            return Err(ConfigError::Validation(format!("layout '{}': empty anchor prefix", self.name)));
        }
        validate_fields(
            &format!("layout '{}' monthly", self.name),
            &self.monthly,
            self.record_len,
            &REQUIRED_LEDGER_FIELDS,
        )?;
        validate_fields(
            &format!("layout '{}' bimonthly", self.name),
            &self.bimonthly,
            self.record_len,
            &REQUIRED_LEDGER_FIELDS,
        )
    }
}

fn identity_fields() -> Vec<FieldSpec<LedgerField>> {
    use Decode::*;
    use LedgerField as L;
    vec![
        FieldSpec::new(L::Registration, 2, 11, Text),
        FieldSpec::new(L::Nss, 33, 11, Text),
        FieldSpec::new(L::TaxId, 44, 13, Text),
        FieldSpec::new(L::NationalId, 57, 18, Text),
        FieldSpec::new(L::CreditNumber, 75, 10, Text),
        FieldSpec::new(L::Movements, 93, 2, Text),
        FieldSpec::new(L::Name, 95, 50, Text),
        FieldSpec::new(L::Wage, 145, 7, Cents),
        FieldSpec::new(L::Days, 154, 2, Int),
    ]
}

fn bimonthly_fields() -> Vec<FieldSpec<LedgerField>> {
    use Decode::*;
    use LedgerField as L;
    let mut fields = identity_fields();
    fields.extend([
        FieldSpec::new(L::DisabilityDays, 156, 2, Int),
        FieldSpec::new(L::AbsenceDays, 158, 2, Int),
        FieldSpec::new(L::Retirement, 209, 7, Cents),
        FieldSpec::new(L::CeavPat, 216, 7, Cents),
        FieldSpec::new(L::CeavObr, 223, 7, Cents),
        FieldSpec::new(L::HousingPat, 237, 7, Cents),
        FieldSpec::new(L::Amortization, 244, 7, Cents),
    ]);
    fields
}
