use std::fmt;
use std::path::PathBuf;

/// Failure of one fixed-width record. Recovered locally: the record is
/// skipped and the scan continues.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    /// Byte offset of the record (or line number for line-oriented files).
    pub offset: usize,
    pub field: String,
    pub reason: String,
}

impl DecodeError {
    pub fn new(offset: usize, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { offset, field: field.into(), reason: reason.into() }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record at {}: field {}: {}", self.offset, self.field, self.reason)
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug)]
pub enum SourceError {
    /// Input rejected before processing (missing file, bad metadata cell,
    /// period mismatch, wrong worksheet count).
    Validation(String),
    /// File or workbook could not be opened or read.
    Read { path: PathBuf, message: String },
    /// Worksheet lacks a required column.
    MissingColumn { sheet: String, column: String },
    /// Nothing usable was produced.
    Empty(String),
    /// Output could not be written.
    Write { path: PathBuf, message: String },
}

impl SourceError {
    pub fn read(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::Read { path: path.into(), message: message.to_string() }
    }

    pub fn write(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::Write { path: path.into(), message: message.to_string() }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "invalid input: {msg}"),
            Self::Read { path, message } => write!(f, "cannot read {}: {message}", path.display()),
            Self::MissingColumn { sheet, column } => {
                write!(f, "sheet '{sheet}': missing column '{column}'")
            }
            Self::Empty(msg) => write!(f, "no rows produced: {msg}"),
            Self::Write { path, message } => write!(f, "cannot write {}: {message}", path.display()),
        }
    }
}

impl std::error::Error for SourceError {}
