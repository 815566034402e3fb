// src/datasets/etf_dividend.rs
//
// Cash dividend history of one ETF from the fund data service. The service
// answers `{Title: [...], Data: [[...], ...]}` and uses a different title
// vocabulary (annual vs quarterly) per listing country.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::EtfCountry;
use crate::error::{ParseError, ParseResult};
use crate::extract::json_table::parse_json;
use crate::normalize::number::trim_fraction_zeros;
use crate::schema::{self, Category, Rule, SchemaVersion};

const ANNUAL_TITLE: &[&str] = &["年度", "現金股利(元)", "現金股利殖利率(TTM)(%)", "除息權日"];
const QUARTERLY_TITLE: &[&str] = &["年季", "現金股利合計(元)", "現金股利殖利率(%)", "除息日", "發放日"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtfDividendVersion {
    /// `yyyy` periods, US listings.
    Annual,
    /// `yyyyqq` periods, Taiwan listings.
    Quarterly,
}

impl SchemaVersion for EtfDividendVersion {
    fn expected_headers(&self) -> &'static [&'static [&'static str]] {
        match self {
            EtfDividendVersion::Annual => &[ANNUAL_TITLE],
            EtfDividendVersion::Quarterly => &[QUARTERLY_TITLE],
        }
    }
}

pub const RULES: &[Rule<EtfDividendVersion>] = &[
    Rule {
        version: EtfDividendVersion::Annual,
        applies: |c| c.label == Some("US"),
    },
    Rule {
        version: EtfDividendVersion::Quarterly,
        applies: |c| c.label == Some("TW"),
    },
];

fn country_label(country: EtfCountry) -> &'static str {
    match country {
        EtfCountry::Us => "US",
        EtfCountry::Tw => "TW",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EtfDividend {
    pub dividend_year: i32,
    pub dividend_quarter: Option<u32>,
    pub dividend_value: String,
    pub dividend_return_rate: String,
    pub dividend_date: String,
}

fn period(version: EtfDividendVersion, raw: &str) -> ParseResult<(i32, Option<u32>)> {
    let bad = |reason: &str| ParseError::invalid("dividend period", raw, reason);
    match version {
        EtfDividendVersion::Annual => raw
            .parse()
            .map(|year| (year, None))
            .map_err(|_| bad("expected yyyy")),
        EtfDividendVersion::Quarterly => {
            if raw.len() < 3 || !raw.is_ascii() {
                return Err(bad("expected yyyyqq"));
            }
            let (year, quarter) = raw.split_at(raw.len() - 2);
            Ok((
                year.parse().map_err(|_| bad("expected yyyyqq"))?,
                Some(quarter.parse().map_err(|_| bad("expected yyyyqq"))?),
            ))
        }
    }
}

fn text_cells(row: &Value, width: usize) -> ParseResult<Vec<&str>> {
    let cells = row
        .as_array()
        .filter(|cells| cells.len() == width)
        .ok_or_else(|| ParseError::mismatch("etf dividend row", format!("{} strings", width), row))?;
    cells
        .iter()
        .map(|cell| {
            cell.as_str()
                .ok_or_else(|| ParseError::mismatch("etf dividend cell", "a string", cell))
        })
        .collect()
}

pub fn normalize_row(version: EtfDividendVersion, row: &Value) -> ParseResult<Option<EtfDividend>> {
    let width = version.expected_headers()[0].len();
    let cells = text_cells(row, width)?;
    if cells[1].trim().is_empty() {
        debug!(period = cells[0], "no dividend for period");
        return Ok(None);
    }

    let (dividend_year, dividend_quarter) = period(version, cells[0].trim())?;
    let dividend_date = NaiveDate::parse_from_str(cells[3].trim(), "%Y%m%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|e| ParseError::invalid("dividend_date", cells[3], e.to_string()))?;
    Ok(Some(EtfDividend {
        dividend_year,
        dividend_quarter,
        dividend_value: trim_fraction_zeros(cells[1]),
        dividend_return_rate: cells[2].trim().to_string(),
        dividend_date,
    }))
}

#[instrument(level = "info", skip(body), fields(body_len = body.len()))]
pub fn parse_etf_dividends(body: &str, country: EtfCountry) -> ParseResult<Vec<EtfDividend>> {
    let version = schema::resolve("etf_dividend", RULES, &Category::label(country_label(country)))?;
    let doc = parse_json("etf dividend", body.trim())?;

    let title: Vec<String> = doc
        .get("Title")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::mismatch("etf dividend", "a `Title` array", &doc))?
        .iter()
        .map(|v| v.as_str().unwrap_or_default().to_string())
        .collect();
    schema::check_headers("etf dividend", version.expected_headers(), &[title])?;

    let data = doc
        .get("Data")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::mismatch("etf dividend", "a `Data` array", &doc))?;
    let mut out = Vec::with_capacity(data.len());
    for row in data {
        if let Some(record) = normalize_row(version, row)? {
            out.push(record);
        }
    }
    info!(?country, rows = out.len(), "etf dividends parsed");
    Ok(out)
}
