//! Ordered, sortable, filterable view over the member records of one parent.
//!
//! The model never fetches anything. Rows are created from the listing,
//! filled in place as detail resolves, reordered only by an explicit sort,
//! and hidden (never removed) by the filter.

pub mod model;
pub mod row;
pub mod shared;

pub use model::{SortDirection, SortState, TableViewModel};
pub use row::{Column, PENDING_PLACEHOLDER, ViewRow};
pub use shared::SharedTable;
