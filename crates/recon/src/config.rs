use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Which pair of sources is being compared. Decides the identity key and
/// which side identity fields come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Declaration (left) against emission (right).
    #[default]
    DeclarationVsEmission,
    /// Two declarations. Registration numbers are matched on their first ten
    /// characters (the check digit may differ), wage is taken from the right,
    /// and deltas are rounded to cents.
    Declarations,
}

impl Profile {
    pub const KEY_REGISTRATION_LEN: usize = 10;

    /// Join key for a row.
    pub fn key(self, registration: &str, nss: &str) -> String {
        let registration = registration.trim();
        match self {
            Self::DeclarationVsEmission => format!("{registration}_{nss}"),
            Self::Declarations => {
                let prefix: String = registration.chars().take(Self::KEY_REGISTRATION_LEN).collect();
                format!("{prefix}_{nss}")
            }
        }
    }

    pub fn left_label(self) -> &'static str {
        "declaration"
    }

    pub fn right_label(self) -> &'static str {
        match self {
            Self::DeclarationVsEmission => "emission",
            Self::Declarations => "second declaration",
        }
    }
}

/// Per-day rate used by the bimonthly disability/absence check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateBasis {
    /// Emission TOTAL_RCV (retirement + severance/old-age).
    #[default]
    Rcv,
    /// Emission CEAV_PAT + CEAV_OBR.
    Ceav,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconParams {
    /// Deltas below this in absolute value are zero.
    pub snap: f64,
    /// Largest gap between a measured total delta and the expected
    /// disability/absence adjustment that still counts as explained.
    pub disability_band: f64,
    pub bimonthly_rate_basis: RateBasis,
    /// Emit DIFFERENCES when some fee differs but the totals agree.
    pub fee_difference_flags_total: bool,
    pub profile: Profile,
}

impl Default for ReconParams {
    fn default() -> Self {
        Self {
            snap: 1e-10,
            disability_band: 0.40,
            bimonthly_rate_basis: RateBasis::Rcv,
            fee_difference_flags_total: true,
            profile: Profile::DeclarationVsEmission,
        }
    }
}

impl ReconParams {
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// `left - right`, snapped to zero under the threshold. The declarations
    /// profile compares cent-rounded values.
    pub fn delta(&self, left: f64, right: f64) -> f64 {
        let delta = match self.profile {
            Profile::DeclarationVsEmission => left - right,
            Profile::Declarations => round_cents(round_cents(left) - round_cents(right)),
        };
        if delta.abs() < self.snap || delta == 0.0 {
            0.0
        } else {
            delta
        }
    }
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
