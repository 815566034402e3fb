// src/normalize/mod.rs

pub mod calendar;
pub mod fields;
pub mod number;
pub mod overrides;

pub use calendar::{last_working_dates, roc_date_to_iso, roc_to_ad};
pub use fields::RowReader;
