pub mod config;
pub mod datasets;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod query;
pub mod schema;

#[cfg(test)]
mod test_support;

pub use error::{ParseError, ParseResult};
pub use query::Query;
