//! `confronta-cli`: headless entry points behind the `confronta` binary.
//!
//! Every entry function takes source path(s) and an output folder and
//! returns an [`Outcome`]: the written file, or `None` plus the reason.

pub mod exit_codes;
pub mod ops;

pub use ops::{
    params_from_settings, reconcile, reconcile_declarations, reconcile_with, run, structure_declarations, structure_emissions,
    structure_viewer, OpError, Outcome,
};
