// src/datasets/price_ratio.rs
//
// Daily valuation ratios (yield, P/E, P/B) per issuer, published by the
// listed and OTC exchanges as JSON after each trading day.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::StockType;
use crate::error::{ParseError, ParseResult};
use crate::extract::json_table::{parse_json, zip_fields};
use crate::extract::RawRow;
use crate::normalize::calendar::roc_to_ad;
use crate::normalize::fields::RowReader;
use crate::normalize::number::{is_not_applicable, is_zero, strip_thousands, trim_fraction_zeros};

/// `stat` of a listed-exchange answer for a day without a report.
pub const LISTED_NO_DATA: &str = "很抱歉，沒有符合條件的資料!";

static LISTED_PERIOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{3})/(\d)$").expect("valid regex"));
static OTC_PERIOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{3})Q(\d)$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceRatio {
    /// Calendar year and month of the trading day the report is for.
    pub year: String,
    pub month: String,
    pub stock_id: String,
    pub close_price: Option<String>,
    pub return_rate: Option<String>,
    pub dividend_year: Option<String>,
    pub per: Option<String>,
    pub pa: Option<String>,
    pub calculated_financial_year: Option<String>,
    pub calculated_financial_quarter: Option<String>,
}

/// One trading day's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RatioPage {
    Records(Vec<PriceRatio>),
    /// Nothing published for the day; an earlier working day has to be asked.
    NoData,
}

struct Layout {
    id: &'static str,
    name: &'static str,
    required: &'static [&'static str],
    ignored: &'static [&'static str],
    period: &'static Regex,
}

fn layout(stock_type: StockType) -> ParseResult<Layout> {
    match stock_type {
        StockType::Public => Ok(Layout {
            id: "證券代號",
            name: "證券名稱",
            required: &["證券代號", "殖利率(%)", "本益比", "股價淨值比"],
            ignored: &[],
            period: &LISTED_PERIOD,
        }),
        StockType::Otc => Ok(Layout {
            id: "股票代號",
            name: "名稱",
            required: &["股票代號", "殖利率(%)", "股利年度", "本益比", "股價淨值比"],
            ignored: &["每股股利"],
            period: &OTC_PERIOD,
        }),
        StockType::Rotc => Err(ParseError::UnknownCategory {
            dataset: "price_ratio".to_string(),
            category: format!("stock type {}", stock_type.label()),
        }),
    }
}

/// Ratio cell: null tokens to null, any zero to "0". The OTC exchange has its
/// fractional zeros trimmed; the listed exchange only loses an all-zero
/// fraction ("15.00" → "15", "12.50" stays).
pub fn ratio_value(raw: &str, stock_type: StockType) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || is_not_applicable(raw) {
        return None;
    }
    if is_zero(raw) {
        return Some("0".to_string());
    }
    let plain = strip_thousands(raw);
    Some(match stock_type {
        StockType::Otc => trim_fraction_zeros(&plain),
        _ => match plain.split_once('.') {
            Some((int, frac)) if frac.bytes().all(|b| b == b'0') => int.to_string(),
            _ => plain,
        },
    })
}

fn ad_year(field: &str, raw: &str) -> ParseResult<Option<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i32>()
        .map(|y| Some(roc_to_ad(y).to_string()))
        .map_err(|e| ParseError::invalid(field, raw, e.to_string()))
}

/// Financial year and quarter the ratios were computed from.
fn financial_period(
    pattern: &Regex,
    raw: Option<&str>,
) -> ParseResult<(Option<String>, Option<String>)> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok((None, None)),
        Some(raw) => raw,
    };
    let caps = pattern
        .captures(raw)
        .ok_or_else(|| ParseError::invalid("財報年/季", raw, format!("expected {}", pattern)))?;
    let quarter = &caps[2];
    if !matches!(quarter, "1" | "2" | "3" | "4") {
        return Err(ParseError::invalid("財報年/季", raw, "quarter out of range"));
    }
    Ok((ad_year("財報年/季", &caps[1])?, Some(quarter.to_string())))
}

pub fn normalize_row(row: &RawRow, stock_type: StockType, date: NaiveDate) -> ParseResult<PriceRatio> {
    let layout = layout(stock_type)?;
    let mut reader = RowReader::new(row);
    reader.skip(&[layout.name]);
    reader.skip(layout.ignored);
    for &name in layout.required {
        if reader.peek(&[name]).is_none() {
            return Err(ParseError::MissingField {
                names: vec![name.to_string()],
                row: row.to_string(),
            });
        }
    }

    let (calculated_financial_year, calculated_financial_quarter) =
        financial_period(layout.period, reader.first(&["財報年/季"]))?;
    let record = PriceRatio {
        year: date.year().to_string(),
        month: date.month().to_string(),
        stock_id: reader.require(&[layout.id])?.to_string(),
        close_price: reader.first(&["收盤價"]).map(str::to_string),
        return_rate: ratio_value(reader.require(&["殖利率(%)"])?, stock_type),
        dividend_year: match reader.first(&["股利年度"]) {
            Some(raw) => ad_year("股利年度", raw)?,
            None => None,
        },
        per: ratio_value(reader.require(&["本益比"])?, stock_type),
        pa: ratio_value(reader.require(&["股價淨值比"])?, stock_type),
        calculated_financial_year,
        calculated_financial_quarter,
    };
    reader.finish(&format!("price ratio {}", record.stock_id));
    Ok(record)
}

fn array<'v>(value: &'v Value, key: &str, context: &str) -> ParseResult<&'v [Value]> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| ParseError::mismatch(context, format!("a `{}` array", key), value))
}

fn records(
    fields: &[Value],
    data: &[Value],
    stock_type: StockType,
    date: NaiveDate,
) -> ParseResult<Vec<PriceRatio>> {
    debug!(?fields, "price ratio fields");
    zip_fields(fields, data)?
        .iter()
        .map(|row| normalize_row(row, stock_type, date))
        .collect()
}

/// Listed exchange: `{stat, title, fields, data}`.
pub fn parse_listed_page(body: &str, date: NaiveDate) -> ParseResult<RatioPage> {
    let doc = parse_json("listed price ratio", body)?;
    match doc.get("stat").and_then(Value::as_str) {
        Some("OK") => {}
        Some(LISTED_NO_DATA) => return Ok(RatioPage::NoData),
        _ => {
            return Err(ParseError::mismatch(
                "listed price ratio stat",
                ["OK", LISTED_NO_DATA],
                doc.get("stat"),
            ))
        }
    }
    let title = doc
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| ParseError::mismatch("listed price ratio", "a `title`", &doc))?;
    info!(%title, "listed price ratio report");

    let data = array(&doc, "data", "listed price ratio")?;
    let fields = array(&doc, "fields", "listed price ratio")?;
    records(fields, data, StockType::Public, date).map(RatioPage::Records)
}

/// OTC exchange: `{tables: [{fields, data}, ...]}`; an empty `data` means
/// no report for the day.
pub fn parse_otc_page(body: &str, date: NaiveDate) -> ParseResult<RatioPage> {
    let doc = parse_json("otc price ratio", body)?;
    let table = array(&doc, "tables", "otc price ratio")?
        .first()
        .ok_or_else(|| ParseError::mismatch("otc price ratio tables", "at least one table", 0))?;
    let fields = array(table, "fields", "otc price ratio table")?;
    let data = array(table, "data", "otc price ratio table")?;
    if data.is_empty() {
        return Ok(RatioPage::NoData);
    }
    records(fields, data, StockType::Otc, date).map(RatioPage::Records)
}

#[instrument(level = "info", skip(body), fields(body_len = body.len()))]
pub fn parse_page(body: &str, stock_type: StockType, date: NaiveDate) -> ParseResult<RatioPage> {
    match stock_type {
        StockType::Public => parse_listed_page(body, date),
        StockType::Otc => parse_otc_page(body, date),
        StockType::Rotc => layout(stock_type).map(|_| RatioPage::NoData),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 24).unwrap()
    }

    #[test]
    fn value_tokens() {
        let otc = |raw| ratio_value(raw, StockType::Otc);
        assert_eq!(otc("-"), None);
        assert_eq!(otc("N/A"), None);
        assert_eq!(otc(""), None);
        assert_eq!(otc("0.00"), Some("0".to_string()));
        assert_eq!(otc("15.00"), Some("15".to_string()));
        assert_eq!(otc("1,234.50"), Some("1234.5".to_string()));

        let listed = |raw| ratio_value(raw, StockType::Public);
        assert_eq!(listed("-"), None);
        assert_eq!(listed("0.00"), Some("0".to_string()));
        assert_eq!(listed("15.00"), Some("15".to_string()));
        assert_eq!(listed("12.50"), Some("12.50".to_string()));
        assert_eq!(listed("1,234.50"), Some("1234.50".to_string()));
    }

    #[test]
    fn listed_report() -> anyhow::Result<()> {
        let body = json!({
            "stat": "OK",
            "title": "114年01月24日 個股日本益比、殖利率及股價淨值比",
            "fields": ["證券代號", "證券名稱", "收盤價", "殖利率(%)", "股利年度", "本益比", "股價淨值比", "財報年/季"],
            "data": [
                ["2330", "台積電", "1,125.00", "1.60", 113, "25.92", "7.70", "113/3"],
                ["1101", "台泥", "33.10", "0.00", 112, "-", "1.00", ""],
            ]
        })
        .to_string();

        let RatioPage::Records(rows) = parse_page(&body, StockType::Public, day())? else {
            panic!("expected records");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].year, "2025");
        assert_eq!(rows[0].month, "1");
        assert_eq!(rows[0].close_price.as_deref(), Some("1,125.00"));
        assert_eq!(rows[0].return_rate.as_deref(), Some("1.60"));
        assert_eq!(rows[0].pa.as_deref(), Some("7.70"));
        assert_eq!(rows[0].dividend_year.as_deref(), Some("2024"));
        assert_eq!(rows[0].calculated_financial_year.as_deref(), Some("2024"));
        assert_eq!(rows[0].calculated_financial_quarter.as_deref(), Some("3"));

        assert_eq!(rows[1].return_rate.as_deref(), Some("0"));
        assert_eq!(rows[1].per, None);
        assert_eq!(rows[1].pa.as_deref(), Some("1"));
        assert_eq!(rows[1].calculated_financial_quarter, None);
        Ok(())
    }

    #[test]
    fn listed_no_data_and_bad_stat() -> anyhow::Result<()> {
        let body = json!({ "stat": LISTED_NO_DATA }).to_string();
        assert_eq!(parse_page(&body, StockType::Public, day())?, RatioPage::NoData);

        let body = json!({ "stat": "查詢日期大於今日" }).to_string();
        assert!(matches!(
            parse_page(&body, StockType::Public, day()),
            Err(ParseError::FormatMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn otc_report() -> anyhow::Result<()> {
        let body = json!({
            "tables": [{
                "fields": ["股票代號", "名稱", "本益比", "每股股利", "股利年度", "殖利率(%)", "股價淨值比", "財報年/季"],
                "data": [["6488", "環球晶", "12.30", "14.00", "113", "3.40", "1.80", "113Q3"]]
            }]
        })
        .to_string();
        let RatioPage::Records(rows) = parse_page(&body, StockType::Otc, day())? else {
            panic!("expected records");
        };
        assert_eq!(rows[0].stock_id, "6488");
        assert_eq!(rows[0].close_price, None);
        assert_eq!(rows[0].per.as_deref(), Some("12.3"));
        assert_eq!(rows[0].calculated_financial_year.as_deref(), Some("2024"));

        let empty = json!({ "tables": [{ "fields": ["股票代號"], "data": [] }] }).to_string();
        assert_eq!(parse_page(&empty, StockType::Otc, day())?, RatioPage::NoData);
        Ok(())
    }

    #[test]
    fn period_quarter_out_of_range() {
        let body = json!({
            "tables": [{
                "fields": ["股票代號", "本益比", "股利年度", "殖利率(%)", "股價淨值比", "財報年/季"],
                "data": [["6488", "1", "113", "1", "1", "113Q5"]]
            }]
        })
        .to_string();
        assert!(matches!(
            parse_page(&body, StockType::Otc, day()),
            Err(ParseError::InvalidValue { .. })
        ));
    }

    #[test]
    fn emerging_market_has_no_ratio_report() {
        assert!(matches!(
            parse_page("{}", StockType::Rotc, day()),
            Err(ParseError::UnknownCategory { .. })
        ));
    }
}
