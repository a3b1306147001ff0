use std::fmt;

use serde::{Deserialize, Serialize};

/// Rendered in place of an absent credit number.
pub const CREDIT_SENTINEL: &str = "-";

const CREDIT_NUMBER_LEN: usize = 10;

/// Social-security number: always 11 digits, left-zero-padded.
///
/// Leading zeros are significant, so the number is never held as an
/// integer once parsed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nss(String);

impl Nss {
    pub const LEN: usize = 11;

    /// Accepts up to 11 digits (padding short values). A trailing `.0` left
    /// behind by spreadsheet float formatting is tolerated.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_suffix(".0").unwrap_or(trimmed);
        if digits.is_empty() || digits.len() > Self::LEN || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self(format!("{:0>width$}", digits, width = Self::LEN)))
    }

    /// From a numeric spreadsheet cell. Rejects fractional or negative values.
    pub fn from_number(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value >= 1e11 {
            return None;
        }
        Self::parse(&format!("{}", value as u64))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Nss {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid NSS '{value}'"))
    }
}

impl From<Nss> for String {
    fn from(nss: Nss) -> Self {
        nss.0
    }
}

/// Join key for reconciliation. Internal only, never written to output.
pub fn identity_key(registration: &str, nss: &Nss) -> String {
    format!("{}_{}", registration.trim(), nss)
}

/// Trim and collapse placeholder values to `None`. Values longer than ten
/// characters keep their last ten (the emission prefixes a check digit).
pub fn normalize_credit_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    if trimmed.is_empty() || trimmed == CREDIT_SENTINEL || trimmed.bytes().all(|b| b == b'0') {
        return None;
    }
    let chars: Vec<char> = trimmed.chars().collect();
    let start = chars.len().saturating_sub(CREDIT_NUMBER_LEN);
    Some(chars[start..].iter().collect())
}

/// Replace source placeholder characters and trim.
pub fn normalize_name(raw: &str, substitutions: &[(char, char)]) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| {
            substitutions
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect();
    replaced.trim().to_string()
}
