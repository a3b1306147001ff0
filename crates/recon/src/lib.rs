//! `confronta-recon`: Declaration/emission reconciliation engine.
//!
//! Pure engine crate: receives typed tables, returns reconciled rows with
//! deltas and observations. No file IO.

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod matcher;
pub mod model;

pub use config::{Profile, RateBasis, ReconParams};
pub use engine::{check_periods, reconcile, run};
pub use error::ReconError;
pub use model::{
    Disposition, Observation, ReconInput, ReconOutput, ReconSummary, ReconciledRow, Reconciliation,
    NO_DIFFERENCES,
};
