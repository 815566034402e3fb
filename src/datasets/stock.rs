// src/datasets/stock.rs
//
// Company directory: one row per listed issuer with its registration basics.

use serde::Serialize;
use tracing::{info, instrument};

use super::{StockType, REPORT_TABLES};
use crate::error::{ParseError, ParseResult};
use crate::extract::{extract_tables, RawRow};
use crate::normalize::calendar::roc_date_to_iso;
use crate::normalize::fields::RowReader;
use crate::normalize::number::is_not_applicable;

const REPORT_TYPES: &[&str] = &["個別", "合併"];
const DIVIDEND_PERIODS: &[&str] = &["每年", "每季", "每半會計年度"];
const DIVIDEND_DECIDE_LEVELS: &[&str] = &["董事會", "股東會"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stock {
    pub id: Option<String>,
    pub long_name: Option<String>,
    pub name: Option<String>,
    pub stock_group: Option<String>,
    pub register_foreign_country: Option<String>,
    pub address: Option<String>,
    pub invoice_number: Option<String>,
    pub chairman: Option<String>,
    pub manager: Option<String>,
    pub spokesman: Option<String>,
    pub spokesman_title: Option<String>,
    pub acting_spokesman: Option<String>,
    pub phone: Option<String>,
    pub create_date: Option<String>,
    pub public_date: Option<String>,
    pub share_unit: Option<String>,
    pub capital: Option<String>,
    pub public_shares: Option<String>,
    pub private_shares: Option<String>,
    pub special_shares: Option<String>,
    #[serde(rename = "financial_repport_type")]
    pub financial_report_type: Option<String>,
    pub dividend_assign_period: Option<String>,
    #[serde(rename = "dividend_assign_decide_leve")]
    pub dividend_assign_decide_level: Option<String>,
    pub english_name: Option<String>,
    pub english_address: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub investor: Option<String>,
    pub investor_title: Option<String>,
    pub investor_phone: Option<String>,
    pub investor_email: Option<String>,
    pub investor_website: Option<String>,
}

fn listing_date_column(stock_type: StockType) -> &'static str {
    match stock_type {
        StockType::Public => "上市日期",
        StockType::Otc => "上櫃日期",
        StockType::Rotc => "興櫃日期",
    }
}

struct Cells<'r, 'a> {
    reader: &'r mut RowReader<'a>,
}

impl<'r, 'a> Cells<'r, 'a> {
    fn text(&mut self, name: &str) -> ParseResult<Option<String>> {
        let value = self.reader.require(&[name])?;
        Ok((!is_not_applicable(value)).then(|| value.to_string()))
    }

    fn map(&mut self, name: &str, f: impl FnOnce(&str) -> String) -> ParseResult<Option<String>> {
        Ok(self.text(name)?.map(|v| f(&v)))
    }

    fn date(&mut self, field: &str, name: &str) -> ParseResult<Option<String>> {
        self.text(name)?
            .map(|v| roc_date_to_iso(field, &v))
            .transpose()
    }

    fn one_of(&mut self, field: &str, name: &str, allowed: &[&str]) -> ParseResult<Option<String>> {
        match self.text(name)? {
            Some(v) if !allowed.contains(&v.as_str()) => Err(ParseError::invalid(
                field,
                v,
                format!("expected one of {:?}", allowed),
            )),
            other => Ok(other),
        }
    }
}

fn no_commas(v: &str) -> String {
    v.replace(',', "")
}

fn backticks(v: &str) -> String {
    v.replace('\'', "`")
}

pub fn normalize_row(row: &RawRow, stock_type: StockType) -> ParseResult<Stock> {
    let mut reader = RowReader::new(row);
    let mut c = Cells {
        reader: &mut reader,
    };

    let stock = Stock {
        id: c.text("公司")?,
        long_name: c.text("公司名稱")?,
        name: c.text("公司簡稱")?,
        stock_group: c.text("產業類別")?,
        register_foreign_country: c.text("外國企業")?,
        address: c.text("住址")?,
        invoice_number: c.text("營利事業")?,
        chairman: c.text("董事長")?,
        manager: c.text("總經理")?,
        spokesman: c.text("發言人")?,
        spokesman_title: c.text("發言人職稱")?,
        acting_spokesman: c.text("代理發言人")?,
        phone: c.text("總機電話")?,
        create_date: c.date("create_date", "成立日期")?,
        public_date: c.date("public_date", listing_date_column(stock_type))?,
        share_unit: c.map("普通股每股面額", |v| v.split_whitespace().collect::<String>())?,
        capital: c.map("實收資本額(元)", no_commas)?,
        public_shares: c.map("已發行普通股數或", no_commas)?,
        private_shares: c.map("私募普通股(股)", no_commas)?,
        special_shares: c.map("特別股(股)", no_commas)?,
        financial_report_type: c.one_of("financial_report_type", "編製財務報告類型", REPORT_TYPES)?,
        dividend_assign_period: c.one_of("dividend_assign_period", "普通股盈餘分派或", DIVIDEND_PERIODS)?,
        dividend_assign_decide_level: c.one_of(
            "dividend_assign_decide_level",
            "普通股年度(含第4季或後半年度)",
            DIVIDEND_DECIDE_LEVELS,
        )?,
        english_name: c.map("英文簡稱", backticks)?,
        english_address: c.map("英文通訊地址", backticks)?,
        email: c.text("電子郵件信箱")?,
        website: c.text("公司網址")?,
        investor: c.text("投資人關係聯絡人")?,
        investor_title: c.text("投資人關係聯絡人職稱")?,
        investor_phone: c.text("投資人關係聯絡電話")?,
        investor_email: c.text("投資人關係聯絡電子郵件")?,
        investor_website: c.text("公司網站內利害關係人專區網址")?,
    };
    reader.finish(&format!("stock {:?}", stock.id));
    Ok(stock)
}

#[instrument(level = "info", skip(body), fields(body_len = body.len()))]
pub fn parse_stocks(body: &str, stock_type: StockType) -> ParseResult<Vec<Stock>> {
    let extraction = extract_tables(body, &REPORT_TABLES)?;
    let out = extraction
        .raw_rows()?
        .iter()
        .map(|row| normalize_row(row, stock_type))
        .collect::<ParseResult<Vec<_>>>()?;
    info!(?stock_type, rows = out.len(), "stock directory parsed");
    Ok(out)
}
