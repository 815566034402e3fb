// src/schema/mod.rs

pub mod version;

pub use version::{check_header, check_headers, resolve, Category, Rule, SchemaVersion};
