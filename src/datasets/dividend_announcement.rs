// src/datasets/dividend_announcement.rs
//
// Ex-dividend announcements, exported by the disclosure site as CSV.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::{ParseError, ParseResult};
use crate::extract::{parse_csv_rows, RawRow};
use crate::normalize::calendar::slash_date_to_iso;
use crate::normalize::fields::RowReader;
use crate::normalize::number::{is_not_applicable, strip_thousands, trim_fraction_zeros};

pub const NO_DATA_TEXT: &str = "查無符合條件之資料";

/// File name the query page hands out for the CSV export.
pub static CSV_FILE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(t108sb27_\d+_\d+\.csv)").unwrap());

static PAR_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^新台幣(\d+(?:\.\d*)?)元$").unwrap());

/// Preferred-share cash dividends are only published from this year on.
const SPECIAL_CASH_SINCE: i32 = 2016;

const STOCK_ID: &[&str] = &["公司代號"];
const STOCK_NAME: &[&str] = &["公司名稱"];
const COUNT_TIME: &[&str] = &["股利所屬期間", "股利所屬年度"];
const RECORD_DATE: &[&str] = &["權利分派基準日"];
const CASH_FROM_EARNING: &[&str] = &[
    "現金股利-盈餘分配之股東現金股利(元/股)",
    "現金股利-股東配發內容-盈餘分配之股東現金股利(元/股)",
];
const CASH_FROM_ACCUMULATION: &[&str] = &[
    "現金股利-法定盈餘公積、資本公積發放之現金(元/股)",
    "現金股利-股東配發內容-法定盈餘公積、資本公積發放之現金(元/股)",
];
const CASH_FOR_SPECIAL: &[&str] = &["現金股利-特別股配發現金股利(元/股)"];
const CASH_DATE: &[&str] = &["現金股利-除息交易日"];
const CASH_DISTRIBUTE_DATE: &[&str] = &["現金股利-現金股利發放日"];
const SHARE_FROM_EARNING: &[&str] = &[
    "股票股利-盈餘轉增資配股(元/股)",
    "股票股利-股東配發內容-盈餘轉增資配股(元/股)",
];
const SHARE_FROM_ACCUMULATION: &[&str] = &[
    "股票股利-資本公積轉增資配股(元/股)",
    "股票股利-股東配發內容-法定盈餘公積、資本公積轉增資配股(元/股)",
];
const SHARE_DATE: &[&str] = &["股票股利-除權交易日"];
const CAPITAL_INCREASE: &[&str] = &["現金增資總股數(股)"];
const CAPITAL_INCREASE_RATE: &[&str] = &["現金增資認股比率(%)"];
const CAPITAL_INCREASE_PRICE: &[&str] = &["現金增資認購價(元/股)"];
const ANNOUNCEMENT_DATE: &[&str] = &["公告日期"];
const PAR_VALUE_FIELD: &[&str] = &["普通股每股面額"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DividendAnnouncement {
    pub stock_id: String,
    pub stock_name: String,
    pub count_time_str: Option<String>,
    pub share_holder_list_final_date: String,

    pub cash_from_earning: Option<String>,
    pub cash_from_accumulation: Option<String>,
    pub cash_for_special: Option<String>,
    pub cash_date: Option<String>,
    pub cash_distribute_date: Option<String>,

    pub share_from_earning: Option<String>,
    pub share_from_accumulation: Option<String>,
    pub share_date: Option<String>,

    pub capital_increase: Option<String>,
    pub capital_increase_rate: Option<String>,
    pub capital_increase_price: Option<String>,

    pub announcement_date: String,
    pub par_value: Option<String>,
}

/// What the first step of the export flow answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportLink {
    NoData,
    File(String),
}

/// Find the CSV file name in the query page, or its "no data" answer.
pub fn find_export_link(page: &str) -> ParseResult<ExportLink> {
    if page.contains(NO_DATA_TEXT) {
        return Ok(ExportLink::NoData);
    }
    match CSV_FILE_NAME.captures(page).and_then(|c| c.get(1)) {
        Some(m) => {
            debug!(file = m.as_str(), "found csv export");
            Ok(ExportLink::File(m.as_str().to_string()))
        }
        None => Err(ParseError::mismatch(
            "dividend announcement query page",
            "a t108sb27 csv file name",
            page.chars().take(200).collect::<String>(),
        )),
    }
}

fn number(reader: &mut RowReader<'_>, names: &[&str]) -> ParseResult<Option<String>> {
    let value = trim_fraction_zeros(&strip_thousands(reader.require(names)?));
    Ok((!value.is_empty()).then_some(value))
}

fn date(reader: &mut RowReader<'_>, field: &str, names: &[&str]) -> ParseResult<String> {
    slash_date_to_iso(field, reader.require(names)?)
}

fn date_opt(reader: &mut RowReader<'_>, field: &str, names: &[&str]) -> ParseResult<Option<String>> {
    let value = reader.require(names)?.trim();
    if value.is_empty() {
        return Ok(None);
    }
    slash_date_to_iso(field, value).map(Some)
}

fn par_value(value: &str) -> ParseResult<Option<String>> {
    let value = value.trim();
    if value == "無面額" {
        return Ok(None);
    }
    let amount = PAR_VALUE
        .captures(value)
        .and_then(|c| c.get(1))
        .ok_or_else(|| ParseError::invalid("par_value", value, "expected 新台幣<amount>元"))?;
    let amount = trim_fraction_zeros(amount.as_str());
    if amount.is_empty() {
        return Err(ParseError::invalid("par_value", value, "empty amount"));
    }
    Ok(Some(amount))
}

pub fn normalize_row(row: &RawRow, year: i32) -> ParseResult<DividendAnnouncement> {
    let mut reader = RowReader::new(row);
    let count_time = reader.require(COUNT_TIME)?.trim();

    let record = DividendAnnouncement {
        stock_id: reader.require(STOCK_ID)?.trim().to_string(),
        stock_name: reader.require(STOCK_NAME)?.trim().to_string(),
        count_time_str: (!is_not_applicable(count_time)).then(|| count_time.to_string()),
        share_holder_list_final_date: date(&mut reader, "share_holder_list_final_date", RECORD_DATE)?,

        cash_from_earning: number(&mut reader, CASH_FROM_EARNING)?,
        cash_from_accumulation: number(&mut reader, CASH_FROM_ACCUMULATION)?,
        cash_for_special: if year >= SPECIAL_CASH_SINCE {
            number(&mut reader, CASH_FOR_SPECIAL)?
        } else {
            reader.skip(CASH_FOR_SPECIAL);
            None
        },
        cash_date: date_opt(&mut reader, "cash_date", CASH_DATE)?,
        cash_distribute_date: date_opt(&mut reader, "cash_distribute_date", CASH_DISTRIBUTE_DATE)?,

        share_from_earning: number(&mut reader, SHARE_FROM_EARNING)?,
        share_from_accumulation: number(&mut reader, SHARE_FROM_ACCUMULATION)?,
        share_date: date_opt(&mut reader, "share_date", SHARE_DATE)?,

        capital_increase: number(&mut reader, CAPITAL_INCREASE)?,
        capital_increase_rate: number(&mut reader, CAPITAL_INCREASE_RATE)?,
        capital_increase_price: number(&mut reader, CAPITAL_INCREASE_PRICE)?,

        announcement_date: date(&mut reader, "announcement_date", ANNOUNCEMENT_DATE)?,
        par_value: par_value(reader.require(PAR_VALUE_FIELD)?)?,
    };
    reader.finish(&format!("dividend announcement {}", record.stock_id));
    Ok(record)
}

/// Parse the exported CSV for `year`, grouped by stock id. Before 2016 the
/// export mixes in preferred-share issuers, which are dropped.
#[instrument(level = "info", skip(body), fields(body_len = body.len()))]
pub fn parse_announcements(
    body: &str,
    year: i32,
) -> ParseResult<BTreeMap<String, Vec<DividendAnnouncement>>> {
    let mut out: BTreeMap<String, Vec<DividendAnnouncement>> = BTreeMap::new();
    for row in parse_csv_rows(body)? {
        if year < SPECIAL_CASH_SINCE
            && row.get(STOCK_NAME[0]).map_or(false, |name| name.contains("特別股"))
        {
            continue;
        }
        let record = normalize_row(&row, year)?;
        out.entry(record.stock_id.clone()).or_default().push(record);
    }
    info!(year, issuers = out.len(), "dividend announcements parsed");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "公司代號,公司名稱,股利所屬期間,權利分派基準日,\
現金股利-盈餘分配之股東現金股利(元/股),現金股利-法定盈餘公積、資本公積發放之現金(元/股),\
現金股利-特別股配發現金股利(元/股),現金股利-除息交易日,現金股利-現金股利發放日,\
股票股利-盈餘轉增資配股(元/股),股票股利-資本公積轉增資配股(元/股),股票股利-除權交易日,\
現金增資總股數(股),現金增資認股比率(%),現金增資認購價(元/股),公告日期,普通股每股面額";

    fn body(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn rows_are_normalized_and_grouped() -> anyhow::Result<()> {
        let csv = body(&[
            "2330,台積電,113年第1季,2024/09/12,3.50000000,0.00000000,,2024/09/12,2024/10/09,,,,,,,2024/08/30,新台幣10.0000元",
            "2330,台積電,113年第2季,2024/12/12,4.00000000,,,2024/12/12,2025/01/09,,,,\"1,000\",,,2024/11/20,新台幣10.0000元",
            "6415,矽力*-KY,不適用,2024/07/01,1.20,,,,,,,,,,,2024/06/01,無面額",
        ]);
        let parsed = parse_announcements(&csv, 2024)?;
        assert_eq!(parsed["2330"].len(), 2);

        let first = &parsed["2330"][0];
        assert_eq!(first.share_holder_list_final_date, "2024-09-12");
        assert_eq!(first.cash_from_earning.as_deref(), Some("3.5"));
        assert_eq!(first.cash_from_accumulation.as_deref(), Some("0"));
        assert_eq!(first.cash_for_special, None);
        assert_eq!(first.cash_distribute_date.as_deref(), Some("2024-10-09"));
        assert_eq!(first.share_date, None);
        assert_eq!(first.par_value.as_deref(), Some("10"));
        assert_eq!(parsed["2330"][1].capital_increase.as_deref(), Some("1000"));

        let foreign = &parsed["6415"][0];
        assert_eq!(foreign.count_time_str, None);
        assert_eq!(foreign.par_value, None);
        Ok(())
    }

    #[test]
    fn preferred_issuers_dropped_before_2016() -> anyhow::Result<()> {
        let csv = body(&["2881A,富邦金特別股,104年年度,2015/07/01,1.0,,9.9,,,,,,,,,2015/06/01,新台幣10.0元"]);
        assert!(parse_announcements(&csv, 2015)?.is_empty());
        let parsed = parse_announcements(&csv, 2016)?;
        assert_eq!(parsed["2881A"][0].cash_for_special.as_deref(), Some("9.9"));
        Ok(())
    }

    #[test]
    fn bad_par_value_is_invalid() {
        let csv = body(&["2330,台積電,113年,2024/09/12,,,,,,,,,,,,2024/08/30,十元"]);
        assert!(matches!(
            parse_announcements(&csv, 2024),
            Err(ParseError::InvalidValue { .. })
        ));
    }

    #[test]
    fn export_link() -> anyhow::Result<()> {
        assert_eq!(
            find_export_link("<a href='x'>t108sb27_1733_1.csv</a>")?,
            ExportLink::File("t108sb27_1733_1.csv".to_string())
        );
        assert_eq!(find_export_link(NO_DATA_TEXT)?, ExportLink::NoData);
        assert!(find_export_link("<html></html>").is_err());
        Ok(())
    }
}
