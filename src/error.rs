// src/error.rs

use thiserror::Error;

/// Failures raised while turning a fetched body into normalized records.
///
/// Every variant aborts the parse it came from. "No data" answers from a
/// source are not errors: they surface as empty collections.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Live header, row width or group length differs from what the resolved
    /// schema version expects.
    #[error("format mismatch in {context}: expected {expected}, got {actual}")]
    FormatMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    /// None of the historical names of a required field is present in the row.
    #[error("none of {names:?} present in row {row}")]
    MissingField { names: Vec<String>, row: String },

    /// An aggregate and its constituents contradict each other.
    #[error("inconsistent totals for stock `{stock_id}` in {year}: {detail}")]
    InconsistentTotals {
        stock_id: String,
        year: i32,
        detail: String,
    },

    /// No schema version matches the requested category.
    #[error("no schema version for {dataset} with {category}")]
    UnknownCategory { dataset: String, category: String },

    /// A cell could not be coerced to the type its field requires.
    #[error("invalid {field} value `{value}`: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl ParseError {
    pub fn mismatch(
        context: impl Into<String>,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        Self::FormatMismatch {
            context: context.into(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }

    pub fn invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Variant name, for callers that report the kind apart from the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FormatMismatch { .. } => "FormatMismatch",
            Self::MissingField { .. } => "MissingField",
            Self::InconsistentTotals { .. } => "InconsistentTotals",
            Self::UnknownCategory { .. } => "UnknownCategory",
            Self::InvalidValue { .. } => "InvalidValue",
        }
    }
}


pub type ParseResult<T> = Result<T, ParseError>;
