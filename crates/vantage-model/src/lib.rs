//! `vantage-model` defines the core in-memory data structures for Vantage.
//!
//! The crate is intentionally self-contained so it can be reused by:
//! - the filter evaluation engine (`vantage-engine`)
//! - table/legend views that read row masks
//! - dialog/IPC boundaries via `serde` (JSON-safe filter payloads)

#![forbid(unsafe_code)]

mod dataset;
mod filters;
mod mask;
mod natural;
mod table;
mod time;
mod value;

pub use dataset::{time_limits, Dataset, DatasetError};
pub use filters::{
    CustomFilterPatch, CustomFilterState, FilterNode, IdentityFilterPatch, IdentityFilterState,
    IdentityPolicy, LogicalOp, ValueFilterPatch, ValueFilterState,
};
pub use mask::RowMask;
pub use natural::{natural_cmp, natural_sort};
pub use table::{Column, ColumnSchema, Table, TableBuilder, TableError};
pub use time::{epoch_nanos, TimeAxis, TimeFamily, TimeValue};
pub use value::{compare_values, try_compare_native, ColumnType, CompareOp, Value};
