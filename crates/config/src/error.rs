use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    /// Settings file could not be read.
    Read(String),
    /// TOML parse / deserialization error.
    Parse(String),
    /// Settings parsed but are inconsistent (bad offsets, bad colors, etc.).
    Validation(String),
    /// `ledger.layout` names a layout that is neither built in nor custom.
    UnknownLayout(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(msg) => write!(f, "cannot read settings: {msg}"),
            Self::Parse(msg) => write!(f, "settings parse error: {msg}"),
            Self::Validation(msg) => write!(f, "settings validation error: {msg}"),
            Self::UnknownLayout(name) => write!(f, "unknown ledger layout '{name}'"),
        }
    }
}

impl std::error::Error for ConfigError {}
