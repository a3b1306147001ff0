// Configuration loading

pub mod error;
pub mod layout;
pub mod settings;

pub use error::ConfigError;
pub use layout::{Decode, FieldSpec, HeaderSpec, LedgerField, LedgerLayout};
pub use settings::{
    CollectSettings, NameSettings, Palette, Palettes, RateBasis, ReconcileSettings,
    ReportSettings, Settings, Substitution, ToleranceSettings,
};
