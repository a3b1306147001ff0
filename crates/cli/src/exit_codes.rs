//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error (unspecified)                               |
//! | 2    | CLI usage error (bad args, unreadable `--config`)         |
//! | 3    | Input rejected (missing file, bad metadata, period clash) |
//! | 4    | Nothing usable was produced                               |
//! | 5    | Output could not be written                               |

use confronta_io::SourceError;
use confronta_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable or invalid settings file.
pub const EXIT_USAGE: u8 = 2;

/// Input validation failed before any processing: missing file or folder,
/// unreadable metadata cell, wrong worksheet count, period mismatch, schema
/// mismatch between the two sides.
pub const EXIT_VALIDATION: u8 = 3;

/// No rows were produced (every record or every file in a batch failed, or
/// the source held no worker with days worked).
pub const EXIT_NO_ROWS: u8 = 4;

/// The output workbook or CSV could not be written.
pub const EXIT_WRITE: u8 = 5;

/// Map a source error to its exit code.
pub fn source_exit_code(err: &SourceError) -> u8 {
    match err {
        SourceError::Validation(_) | SourceError::MissingColumn { .. } | SourceError::Read { .. } => {
            EXIT_VALIDATION
        }
        SourceError::Empty(_) => EXIT_NO_ROWS,
        SourceError::Write { .. } => EXIT_WRITE,
    }
}

/// Map a reconciliation error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::PeriodMismatch { .. } | ReconError::SchemaMismatch(_) | ReconError::MissingColumn { .. } => {
            EXIT_VALIDATION
        }
    }
}
