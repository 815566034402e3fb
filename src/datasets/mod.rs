// src/datasets/mod.rs
//
// One module per published dataset. Each turns a fetched body into its
// normalized record type; none of them perform I/O.

pub mod balance_sheet;
pub mod dividend;
pub mod dividend_announcement;
pub mod etf_dividend;
pub mod etf_slice;
pub mod price_history;
pub mod price_ratio;
pub mod profit_sheet;
pub mod revenue;
pub mod stock;
pub mod tw_2y_index;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};
use crate::extract::{Gate, TableIndex, TableSpec};
use crate::normalize::number;

/// Market segment an issuer trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockType {
    #[serde(rename = "上市", alias = "sii", alias = "public")]
    Public,
    #[serde(rename = "上櫃", alias = "otc")]
    Otc,
    #[serde(rename = "興櫃", alias = "rotc")]
    Rotc,
}

impl StockType {
    /// Market code the disclosure site uses in its forms.
    pub fn typek(self) -> &'static str {
        match self {
            StockType::Public => "sii",
            StockType::Otc => "otc",
            StockType::Rotc => "rotc",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StockType::Public => "上市",
            StockType::Otc => "上櫃",
            StockType::Rotc => "興櫃",
        }
    }
}

/// Where an ETF is listed. Fund sites key the same fund differently per
/// country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EtfCountry {
    #[serde(rename = "US", alias = "")]
    Us,
    #[serde(rename = "TW", alias = ".TW")]
    Tw,
}

impl EtfCountry {
    /// Fund-site symbol: upper-cased id plus the listing suffix.
    pub fn symbol(self, etf_id: &str) -> String {
        let suffix = match self {
            EtfCountry::Us => "",
            EtfCountry::Tw => ".TW",
        };
        format!("{}{}", etf_id.to_uppercase(), suffix)
    }
}

/// Bordered report tables of the disclosure site, one per issuer category.
pub const REPORT_TABLES: TableSpec = TableSpec {
    gate: Gate::Element {
        tag: "table",
        attr: "class",
        values: &["hasBorder"],
    },
    tables: TableIndex::All,
    no_data_cells: &[],
    no_data_marker: None,
};

/// A monetary cell published in thousands: commas stripped, not-applicable
/// tokens such as `--` read as zero, anything else scaled to units.
pub fn thousands(field: &str, value: &str) -> ParseResult<String> {
    let value = number::strip_thousands(value);
    if number::is_not_applicable(&value) || value == "0" {
        return Ok("0".to_string());
    }
    number::shift_decimal(&value, 3)
        .ok_or_else(|| ParseError::invalid(field, value, "not a decimal amount"))
}

/// Like [`thousands`] for an optional column; an empty cell is null.
pub fn thousands_opt(field: &str, value: &str) -> ParseResult<Option<String>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    thousands(field, value).map(Some)
}

/// Commas stripped, not-applicable tokens read as zero, otherwise untouched.
pub fn unscaled(value: &str) -> String {
    let value = number::strip_thousands(value);
    if number::is_not_applicable(&value) {
        "0".to_string()
    } else {
        value
    }
}
