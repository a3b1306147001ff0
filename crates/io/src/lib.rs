// File I/O: source decoding, structuring, and report writing

pub mod aggregate;
pub mod base62;
pub mod collect;
pub mod emission;
pub mod error;
pub mod grid;
pub mod ledger;
pub mod naming;
pub mod normalized;
pub mod report;
pub mod slice;
pub mod table;
pub mod viewer;

pub use collect::{collect_emissions, collect_ledgers, Collected, SkippedFile};
pub use emission::structure_emission;
pub use error::{DecodeError, SourceError};
pub use ledger::{score_layout, structure_ledger, LayoutScore};
pub use naming::{period_from_file_name, Artifact};
pub use normalized::Normalized;
pub use report::{write_csv, write_workbook, HeaderStyle, Sheet};
pub use table::read_normalized;
pub use viewer::structure_viewer;
