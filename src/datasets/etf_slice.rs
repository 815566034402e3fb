// src/datasets/etf_slice.rs
//
// Split and reverse-split events of one ETF from the fund site's basic data
// page.

use serde::Serialize;
use tracing::{info, instrument};

use crate::error::{ParseError, ParseResult};
use crate::extract::{extract_tables, Gate, TableSpec};
use crate::schema;

pub const HEADER: &[&str] = &["日期", "事件", "比例"];
pub const NO_DATA_TEXT: &str = "查無資料";

/// The events grid; its id picked up an extra `_gvTbl` in a site rebuild.
const TABLES: TableSpec = TableSpec {
    no_data_cells: &[NO_DATA_TEXT],
    ..TableSpec::gated(Gate::Element {
        tag: "table",
        attr: "id",
        values: &[
            "ctl00_ctl00_MainContent_MainContent_gvTbl",
            "ctl00_ctl00_MainContent_MainContent_gvTbl_gvTbl",
        ],
    })
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EtfSlice {
    pub date: String,
    pub event: String,
    pub ratio: String,
}

#[instrument(level = "info", skip(body), fields(body_len = body.len()))]
pub fn parse_etf_slices(body: &str) -> ParseResult<Vec<EtfSlice>> {
    let extraction = extract_tables(body, &TABLES)?;
    if extraction.groups.is_empty() {
        return Err(ParseError::mismatch("etf slice table", HEADER, "no table"));
    }

    let mut out = Vec::new();
    for group in &extraction.groups {
        schema::check_headers("etf slice", &[HEADER], &group.headers)?;
        for row in &group.rows {
            let [date, event, ratio] = row.as_slice() else {
                return Err(ParseError::mismatch("etf slice row", HEADER.len(), row));
            };
            out.push(EtfSlice {
                date: date.clone(),
                event: event.clone(),
                ratio: ratio.clone(),
            });
        }
    }
    info!(rows = out.len(), "etf slices parsed");
    Ok(out)
}
