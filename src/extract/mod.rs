// src/extract/mod.rs
//
// Source bodies in, string-keyed rows out. Nothing in here knows what a
// dividend or a balance sheet is.

pub mod csv_rows;
pub mod events;
pub mod json_table;
pub mod positional;
pub mod raw_table;
pub mod table;
pub mod tag_stack;

pub use csv_rows::parse_csv_rows;
pub use events::{events_from_html, MarkupEvent};
pub use positional::{parse_groups, GroupKind, GroupSpec};
pub use raw_table::{RawRow, TableGroup};
pub use table::{
    extract_events, extract_tables, Extraction, Gate, NoDataMarker, TableIndex, TableSpec,
};
