// Generic fixed-width slicer.
//
// Every fixed-width format (ledger records, viewer export lines) is described
// as a `FieldSpec` table and decoded here; no format slices bytes by hand.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use chrono::NaiveDate;
use confronta_config::{Decode, FieldSpec};

use crate::base62;
use crate::error::DecodeError;

/// What to do with a numeric slot that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericPolicy {
    /// Fail the record.
    Strict,
    /// Read as zero.
    Lenient,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Amount(f64),
    Date(Option<NaiveDate>),
}

/// Decoded fields of one record. Fields absent from the layout read as
/// blank/zero.
#[derive(Debug, Clone)]
pub struct Fields<F: Eq + Hash> {
    values: HashMap<F, FieldValue>,
}

impl<F: Copy + Eq + Hash> Fields<F> {
    pub fn has(&self, field: F) -> bool {
        self.values.contains_key(&field)
    }

    pub fn text(&self, field: F) -> &str {
        match self.values.get(&field) {
            Some(FieldValue::Text(s)) => s,
            _ => "",
        }
    }

    /// Non-blank text, or `None`.
    pub fn opt_text(&self, field: F) -> Option<String> {
        let s = self.text(field);
        (!s.is_empty()).then(|| s.to_string())
    }

    pub fn int(&self, field: F) -> i64 {
        match self.values.get(&field) {
            Some(FieldValue::Int(n)) => *n,
            Some(FieldValue::Amount(a)) => *a as i64,
            _ => 0,
        }
    }

    /// `None` when the layout does not carry the field.
    pub fn opt_int(&self, field: F) -> Option<i64> {
        self.has(field).then(|| self.int(field))
    }

    pub fn amount(&self, field: F) -> f64 {
        match self.values.get(&field) {
            Some(FieldValue::Amount(a)) => *a,
            Some(FieldValue::Int(n)) => *n as f64,
            _ => 0.0,
        }
    }

    pub fn date(&self, field: F) -> Option<NaiveDate> {
        match self.values.get(&field) {
            Some(FieldValue::Date(d)) => *d,
            _ => None,
        }
    }
}

/// Decode text bytes. UTF-8 when valid, Windows-1252 otherwise.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.trim().to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text.trim().to_string()
        }
    }
}

fn parse_number(
    raw: &[u8],
    policy: NumericPolicy,
    offset: usize,
    field: &str,
) -> Result<f64, DecodeError> {
    let text = decode_text(raw);
    if text.is_empty() {
        return Ok(0.0);
    }
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => match policy {
            NumericPolicy::Lenient => Ok(0.0),
            NumericPolicy::Strict => {
                Err(DecodeError::new(offset, field, format!("'{text}' is not a number")))
            }
        },
    }
}

fn parse_int(raw: &[u8], policy: NumericPolicy, offset: usize, field: &str) -> Result<i64, DecodeError> {
    let text = decode_text(raw);
    if text.is_empty() {
        return Ok(0);
    }
    match text.parse::<i64>() {
        Ok(n) => Ok(n),
        Err(_) => match policy {
            NumericPolicy::Lenient => Ok(0),
            NumericPolicy::Strict => {
                Err(DecodeError::new(offset, field, format!("'{text}' is not an integer")))
            }
        },
    }
}

/// Slice and decode every field of `specs` from the record starting at
/// `base` within `bytes`. `offset` is reported in errors.
pub fn slice_record<F>(
    bytes: &[u8],
    base: usize,
    specs: &[FieldSpec<F>],
    policy: NumericPolicy,
    offset: usize,
) -> Result<Fields<F>, DecodeError>
where
    F: Copy + Eq + Hash + Debug,
{
    let mut fields = Fields { values: HashMap::with_capacity(specs.len()) };
    let mut combined = Vec::new();

    for spec in specs {
        let name = format!("{:?}", spec.field);
        let start = base + spec.start;
        let raw = bytes
            .get(start..start + spec.len)
            .ok_or_else(|| DecodeError::new(offset, &name, "slice out of range"))?;

        let value = match spec.decode {
            Decode::Text => FieldValue::Text(decode_text(raw)),
            Decode::Int => FieldValue::Int(parse_int(raw, policy, offset, &name)?),
            Decode::Cents => FieldValue::Amount(parse_number(raw, policy, offset, &name)? / 100.0),
            Decode::Decimal => FieldValue::Amount(parse_number(raw, policy, offset, &name)?),
            Decode::Base62Cents => match base62::decode_cents(raw, offset, &name) {
                Ok(v) => FieldValue::Amount(v),
                Err(_) if policy == NumericPolicy::Lenient => FieldValue::Amount(0.0),
                Err(e) => return Err(e),
            },
            Decode::CombinedCents => {
                let whole = parse_number(raw, policy, offset, &name)? / 100.0;
                if let Some(minus) = spec.minus {
                    combined.push((spec.field, minus));
                }
                FieldValue::Amount(whole)
            }
            Decode::Date => {
                let text = decode_text(raw);
                FieldValue::Date(NaiveDate::parse_from_str(&text, "%d-%m-%Y").ok())
            }
        };
        fields.values.insert(spec.field, value);
    }

    // Second pass: combined slots need their worker share decoded first.
    for (field, minus) in combined {
        let worker = fields.amount(minus);
        let whole = fields.amount(field);
        fields.values.insert(field, FieldValue::Amount(whole - worker));
    }

    Ok(fields)
}
