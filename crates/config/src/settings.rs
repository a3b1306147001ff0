//! Settings file (`settings.toml`).
//!
//! Every section is optional; a missing key takes its default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::layout::LedgerLayout;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tolerance: ToleranceSettings,
    pub reconcile: ReconcileSettings,
    pub collect: CollectSettings,
    pub ledger: LedgerSettings,
    pub names: NameSettings,
    pub report: ReportSettings,
}

// ---------------------------------------------------------------------------
// Tolerances
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceSettings {
    /// Deltas smaller than this in absolute value are reported as zero.
    pub snap: f64,
    /// Maximum gap between a total delta and the expected disability/absence
    /// adjustment for the delta to be attributed to that adjustment.
    pub disability_band: f64,
}

impl Default for ToleranceSettings {
    fn default() -> Self {
        Self { snap: 1e-10, disability_band: 0.40 }
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Per-day rate used by the bimonthly disability/absence check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateBasis {
    /// Retirement + severance/old-age subtotal.
    #[default]
    Rcv,
    /// Severance/old-age employer + worker shares only.
    Ceav,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    pub bimonthly_rate_basis: RateBasis,
    /// Emit DIFFERENCES when individual fees differ even though totals agree.
    pub fee_difference_flags_total: bool,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self { bimonthly_rate_basis: RateBasis::Rcv, fee_difference_flags_total: true }
    }
}

// ---------------------------------------------------------------------------
// Bulk collection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectSettings {
    /// Files directly inside the root folder are level 1.
    pub max_depth: usize,
}

impl Default for CollectSettings {
    fn default() -> Self {
        Self { max_depth: 5 }
    }
}

// ---------------------------------------------------------------------------
// Ledger layouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Name of the layout used to decode ledgers.
    pub layout: String,
    /// Additional layouts, selectable by name.
    pub custom: Vec<LedgerLayout>,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self { layout: LedgerLayout::SEPARATE.to_string(), custom: Vec::new() }
    }
}

impl LedgerSettings {
    /// Built-in layouts followed by custom ones.
    pub fn layouts(&self) -> Vec<LedgerLayout> {
        let mut all = LedgerLayout::builtins();
        all.extend(self.custom.iter().cloned());
        all
    }

    /// The layout named by `layout`. Custom layouts shadow built-ins.
    pub fn active_layout(&self) -> Result<LedgerLayout, ConfigError> {
        self.custom
            .iter()
            .find(|l| l.name == self.layout)
            .cloned()
            .or_else(|| LedgerLayout::builtins().into_iter().find(|l| l.name == self.layout))
            .ok_or_else(|| ConfigError::UnknownLayout(self.layout.clone()))
    }
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    pub from: char,
    pub to: char,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameSettings {
    pub substitutions: Vec<Substitution>,
}

impl Default for NameSettings {
    fn default() -> Self {
        Self {
            substitutions: vec![
                Substitution { from: '#', to: 'Ñ' },
                Substitution { from: '$', to: ' ' },
            ],
        }
    }
}

impl NameSettings {
    pub fn pairs(&self) -> Vec<(char, char)> {
        self.substitutions.iter().map(|s| (s.from, s.to)).collect()
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Header colors as `RRGGBB` hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub fill: String,
    pub font: String,
}

impl Palette {
    fn new(fill: &str, font: &str) -> Self {
        Self { fill: fill.to_string(), font: font.to_string() }
    }

    pub fn fill_rgb(&self) -> Result<u32, ConfigError> {
        parse_hex(&self.fill)
    }

    pub fn font_rgb(&self) -> Result<u32, ConfigError> {
        parse_hex(&self.font)
    }
}

fn parse_hex(raw: &str) -> Result<u32, ConfigError> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return Err(ConfigError::Validation(format!("color '{raw}' is not RRGGBB")));
    }
    u32::from_str_radix(hex, 16).map_err(|_| ConfigError::Validation(format!("color '{raw}' is not RRGGBB")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palettes {
    pub declaration: Palette,
    pub emission: Palette,
    pub viewer: Palette,
    pub reconciliation: Palette,
}

impl Default for Palettes {
    fn default() -> Self {
        Self {
            declaration: Palette::new("611232", "B3945A"),
            emission: Palette::new("015D4D", "FFFFFF"),
            viewer: Palette::new("000000", "FFFFFF"),
            reconciliation: Palette::new("8B008B", "00FF00"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub max_column_width: f64,
    pub palettes: Palettes,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self { max_column_width: 50.0, palettes: Palettes::default() }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("confronta")
            .join("settings.toml")
    }

    /// Load settings from the default location, falling back to defaults.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}: {e}; using default settings", path.display());
                Self::default()
            }
        }
    }

    /// Load an explicit settings file. Unlike [`Settings::load`], failures
    /// are returned.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {e}", path.display())))?;
        let settings = Self::from_toml(&contents)?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let settings: Settings =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.tolerance;
        if !(t.snap >= 0.0 && t.snap.is_finite()) {
            return Err(ConfigError::Validation(format!("tolerance.snap must be >= 0, got {}", t.snap)));
        }
        if !(t.disability_band >= 0.0 && t.disability_band.is_finite()) {
            return Err(ConfigError::Validation(format!(
                "tolerance.disability_band must be >= 0, got {}",
                t.disability_band
            )));
        }
        if self.collect.max_depth == 0 {
            return Err(ConfigError::Validation("collect.max_depth must be at least 1".into()));
        }
        if self.report.max_column_width <= 0.0 {
            return Err(ConfigError::Validation("report.max_column_width must be positive".into()));
        }
        let p = &self.report.palettes;
        for palette in [&p.declaration, &p.emission, &p.viewer, &p.reconciliation] {
            palette.fill_rgb()?;
            palette.font_rgb()?;
        }
        for layout in &self.ledger.custom {
            layout.validate()?;
        }
        self.ledger.active_layout()?;
        Ok(())
    }

    /// Summary for JSON output.
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "path": Self::config_path().display().to_string(),
            "layout": self.ledger.layout,
            "snap": self.tolerance.snap,
            "disability_band": self.tolerance.disability_band,
            "max_depth": self.collect.max_depth,
        })
    }
}
