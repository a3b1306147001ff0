use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// Every column that can appear in a normalized or reconciled table.
///
/// Header text is the downstream contract; the enum exists so that no code
/// path addresses a column by string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Rp,
    Nss,
    Name,
    TaxId,
    NationalId,
    CreditNumber,
    Movements,
    DisabilityDays,
    AbsenceDays,
    Days,
    Wage,
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
    TotalRcv,
    HousingPat,
    CreditType,
    CreditValue,
    Amortization,
    TotalInf,
    Total,
    Observations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Count,
    Amount,
}

impl Column {
    pub const ALL: [Column; 33] = [
        Column::Rp,
        Column::Nss,
        Column::Name,
        Column::TaxId,
        Column::NationalId,
        Column::CreditNumber,
        Column::Movements,
        Column::DisabilityDays,
        Column::AbsenceDays,
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
        Column::Retirement,
        Column::CeavPat,
        Column::CeavObr,
        Column::TotalRcv,
        Column::HousingPat,
        Column::CreditType,
        Column::CreditValue,
        Column::Amortization,
        Column::TotalInf,
        Column::Total,
        Column::Observations,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Self::Rp => "RP",
            Self::Nss => "NSS",
            Self::Name => "NOMBRE ASEGURADO",
            Self::TaxId => "RFC",
            Self::NationalId => "CURP",
            Self::CreditNumber => "N_CREDITO",
            Self::Movements => "MOVIMIENTOS",
            Self::DisabilityDays => "INCAPACIDAD",
            Self::AbsenceDays => "AUSENTISMO",
            Self::Days => "DIAS",
            Self::Wage => "SDI",
            Self::Cf => "CF",
            Self::ExcPat => "EXC_PAT",
            Self::ExcObr => "EXC_OBR",
            Self::PdPat => "PD_PAT",
            Self::PdObr => "PD_OBR",
            Self::GmpPat => "GMP_PAT",
            Self::GmpObr => "GMP_OBR",
            Self::Rt => "RT",
            Self::IvPat => "IV_PAT",
            Self::IvObr => "IV_OBR",
            Self::Gps => "GPS",
            Self::Retirement => "RETIRO",
            Self::CeavPat => "CEAV_PAT",
            Self::CeavObr => "CEAV_OBR",
            Self::TotalRcv => "TOTAL_RCV",
            Self::HousingPat => "APORTACION_PAT",
            Self::CreditType => "T_CREDITO",
            Self::CreditValue => "V_CREDITO",
            Self::Amortization => "AMORTIZACION",
            Self::TotalInf => "TOTAL_INF",
            Self::Total => "TOTAL",
            Self::Observations => "OBSERVACIONES",
        }
    }

    /// Resolve a header read back from a workbook. Accepts the short and
    /// underscore spellings older exports used.
    pub fn from_header(header: &str) -> Option<Self> {
        let header = header.trim();
        let found = Self::ALL.iter().copied().find(|c| c.header() == header);
        if found.is_some() {
            return found;
        }
        match header {
            "NOMBRE_ASEGURADO" | "NOMBRE" => Some(Self::Name),
            "INC" => Some(Self::DisabilityDays),
            "AUS" => Some(Self::AbsenceDays),
            "N_MOVS" => Some(Self::Movements),
            _ => None,
        }
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Self::Days | Self::DisabilityDays | Self::AbsenceDays => ColumnKind::Count,
            Self::Wage
            | Self::Cf
            | Self::ExcPat
            | Self::ExcObr
            | Self::PdPat
            | Self::PdObr
            | Self::GmpPat
            | Self::GmpObr
            | Self::Rt
            | Self::IvPat
            | Self::IvObr
            | Self::Gps
            | Self::Retirement
            | Self::CeavPat
            | Self::CeavObr
            | Self::TotalRcv
            | Self::HousingPat
            | Self::CreditValue
            | Self::Amortization
            | Self::TotalInf
            | Self::Total => ColumnKind::Amount,
            _ => ColumnKind::Text,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

// ---------------------------------------------------------------------------
// Cell values
// ---------------------------------------------------------------------------

/// One output cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Number(f64),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// `None` renders as an empty cell.
    pub fn opt_text(s: Option<&str>) -> Self {
        match s {
            Some(s) => Self::Text(s.to_string()),
            None => Self::Empty,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Empty => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}
