// src/datasets/revenue.rs

use serde::Serialize;
use tracing::{info, instrument};

use crate::error::{ParseError, ParseResult};
use crate::extract::csv_rows::read_csv;
use crate::extract::RawRow;
use crate::normalize::calendar::{roc_date_to_iso, roc_to_ad};
use crate::normalize::fields::RowReader;
use crate::normalize::number::{is_not_applicable, shift_decimal};

/// Every record of the monthly revenue export, header included.
pub const COLUMNS: usize = 14;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Revenue {
    pub stock_id: String,
    pub stock_name: String,
    pub create_time: String,
    pub year: i32,
    pub month: u32,
    pub value: Option<String>,
    pub last_month: Option<String>,
    pub last_year: Option<String>,
    pub last_month_percent: Option<String>,
    pub last_year_percent: Option<String>,
    pub accumulation: Option<String>,
    pub last_year_accumulation: Option<String>,
    pub last_year_accumulation_percent: Option<String>,
    pub note: Option<String>,
}

/// Thousands of NTD to NTD. `-` and blanks are null.
fn value(field: &str, raw: &str) -> ParseResult<Option<String>> {
    match raw.trim() {
        v if v.is_empty() || is_not_applicable(v) => Ok(None),
        "0" => Ok(Some("0".to_string())),
        v => shift_decimal(v, 3)
            .map(Some)
            .ok_or_else(|| ParseError::invalid(field, v, "not a decimal amount")),
    }
}

fn percent(raw: &str) -> Option<String> {
    match raw.trim() {
        v if v.is_empty() || is_not_applicable(v) => None,
        v => Some(v.to_string()),
    }
}

/// The export's `yyy/m` period must be the one asked for.
fn check_period(raw: &str, year: i32, month: u32) -> ParseResult<()> {
    let parsed = raw.trim().split_once('/').and_then(|(y, m)| {
        Some((roc_to_ad(y.trim().parse().ok()?), m.trim().parse::<u32>().ok()?))
    });
    match parsed {
        Some((y, m)) if y == year && m == month => Ok(()),
        Some(_) => Err(ParseError::mismatch("revenue period", (year, month), raw)),
        None => Err(ParseError::invalid("資料年月", raw, "expected yyy/m")),
    }
}

pub fn normalize_row(row: &RawRow, year: i32, month: u32) -> ParseResult<Revenue> {
    let mut reader = RowReader::new(row);
    reader.skip(&["產業別"]);
    check_period(reader.require(&["資料年月"])?, year, month)?;

    let mut money = |field: &'static str, name: &str| -> ParseResult<Option<String>> {
        let raw = reader.require(&[name])?;
        value(field, raw)
    };
    let value_now = money("value", "營業收入-當月營收")?;
    let last_month = money("last_month", "營業收入-上月營收")?;
    let last_year = money("last_year", "營業收入-去年當月營收")?;
    let accumulation = money("accumulation", "累計營業收入-當月累計營收")?;
    let last_year_accumulation = money("last_year_accumulation", "累計營業收入-去年累計營收")?;

    let note = reader.require(&["備註"])?.trim();
    let record = Revenue {
        stock_id: reader.require(&["公司代號"])?.to_string(),
        stock_name: reader.require(&["公司名稱"])?.to_string(),
        create_time: roc_date_to_iso("create_time", reader.require(&["出表日期"])?)?,
        year,
        month,
        value: value_now,
        last_month,
        last_year,
        last_month_percent: percent(reader.require(&["營業收入-上月比較增減(%)"])?),
        last_year_percent: percent(reader.require(&["營業收入-去年同月增減(%)"])?),
        accumulation,
        last_year_accumulation,
        last_year_accumulation_percent: percent(reader.require(&["累計營業收入-前期比較增減(%)"])?),
        note: (!is_not_applicable(note)).then(|| note.to_string()),
    };
    reader.finish(&format!("revenue {}", record.stock_id));
    Ok(record)
}

/// Parse the monthly revenue export for one market and month.
#[instrument(level = "info", skip(body), fields(body_len = body.len()))]
pub fn parse_revenue(body: &str, year: i32, month: u32) -> ParseResult<Vec<Revenue>> {
    let Some(table) = read_csv(body)? else {
        return Ok(Vec::new());
    };
    for record in std::iter::once(&table.header).chain(&table.rows) {
        if record.len() != COLUMNS {
            return Err(ParseError::mismatch("revenue column count", COLUMNS, record));
        }
    }

    let rows = table.into_raw_rows()?;
    let out = rows
        .iter()
        .map(|row| normalize_row(row, year, month))
        .collect::<ParseResult<Vec<_>>>()?;
    info!(year, month, rows = out.len(), "revenue parsed");
    Ok(out)
}
