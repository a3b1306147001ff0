//! Shared vocabulary for contribution files: reporting periods, worker
//! identity, typed monthly/bimonthly rows and the tables that hold them.

pub mod column;
pub mod identity;
pub mod period;
pub mod row;

pub use column::{Column, ColumnKind, Value};
pub use identity::{identity_key, normalize_credit_number, normalize_name, Nss, CREDIT_SENTINEL};
pub use period::{Period, SchemaVariant, SubSchema};
pub use row::{
    BimonthlyRow, CellMap, Demographics, MonthlyFees, MonthlyRow, Origin, Record, RowError, Table,
};
