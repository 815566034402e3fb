// src/query.rs
//
// One query per invocation: the dataset name under `data_type` plus its
// parameters. Numbers may arrive as JSON numbers or as strings.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use crate::config::Settings;
use crate::datasets::price_history::TAIPEI_OFFSET_SECS;
use crate::datasets::{EtfCountry, StockType};
use crate::fetch::{market, mops, Transport};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "data_type", rename_all = "snake_case")]
pub enum Query {
    Dividend {
        stock_type: StockType,
        #[serde(deserialize_with = "lenient")]
        year: i32,
        #[serde(default, deserialize_with = "lenient_opt")]
        timeout: Option<u64>,
    },
    DividendAnnouncement {
        stock_type: StockType,
        #[serde(deserialize_with = "lenient")]
        year: i32,
        #[serde(default, deserialize_with = "lenient_opt")]
        month: Option<u32>,
        #[serde(default, deserialize_with = "lenient_opt")]
        timeout: Option<u64>,
    },
    StocksBalanceSheet {
        stock_type: StockType,
        #[serde(deserialize_with = "lenient")]
        year: i32,
        #[serde(deserialize_with = "lenient")]
        quarter: u8,
        #[serde(default, deserialize_with = "lenient_opt")]
        timeout: Option<u64>,
    },
    StocksProfitSheet {
        stock_type: StockType,
        #[serde(deserialize_with = "lenient")]
        year: i32,
        #[serde(deserialize_with = "lenient")]
        quarter: u8,
        #[serde(default, deserialize_with = "lenient_opt")]
        timeout: Option<u64>,
    },
    Revenue {
        stock_type: StockType,
        #[serde(deserialize_with = "lenient")]
        year: i32,
        #[serde(deserialize_with = "lenient")]
        month: u32,
        #[serde(default, deserialize_with = "lenient_opt")]
        timeout: Option<u64>,
    },
    Stock {
        stock_type: StockType,
        #[serde(default, deserialize_with = "lenient_opt")]
        timeout: Option<u64>,
    },
    PriceRatio {
        stock_type: StockType,
        query_date: NaiveDate,
        #[serde(default, deserialize_with = "lenient_opt")]
        timeout: Option<u64>,
    },
    EtfDividend {
        etf_id: String,
        etf_country: EtfCountry,
        #[serde(deserialize_with = "lenient")]
        years: u32,
        #[serde(default, deserialize_with = "lenient_opt")]
        timeout: Option<u64>,
    },
    EtfSlice {
        etf_id: String,
        etf_country: EtfCountry,
        #[serde(default, deserialize_with = "lenient_opt")]
        timeout: Option<u64>,
    },
    #[serde(rename = "tw_2y_index")]
    Tw2yIndex {
        #[serde(default, deserialize_with = "lenient_opt")]
        timeout: Option<u64>,
    },
    StockPriceHistory {
        stock_id: String,
        start_date_included: NaiveDate,
        #[serde(default)]
        end_date_excluded: Option<NaiveDate>,
        #[serde(default, deserialize_with = "lenient_opt")]
        timeout: Option<u64>,
    },
}

fn parse_text<T, E>(text: &str) -> Result<T, E>
where
    T: FromStr,
    T::Err: Display,
    E: serde::de::Error,
{
    text.trim()
        .parse()
        .map_err(|e| E::custom(format!("{:?}: {}", text, e)))
}

/// A number, or a string holding one.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + DeserializeOwned,
    T::Err: Display,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => parse_text(&text),
        other => T::deserialize(other).map_err(D::Error::custom),
    }
}

/// Like `lenient`; `null` and blank strings are absent.
fn lenient_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + DeserializeOwned,
    T::Err: Display,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) => parse_text(&text).map(Some),
        other => T::deserialize(other).map(Some).map_err(D::Error::custom),
    }
}

fn to_json<T: Serialize>(data: T) -> Result<Value> {
    serde_json::to_value(data).context("serializing records")
}

fn taipei_today() -> Result<NaiveDate> {
    let offset = FixedOffset::east_opt(TAIPEI_OFFSET_SECS).context("taipei offset")?;
    Ok(Utc::now().with_timezone(&offset).date_naive())
}

impl Query {
    pub fn data_type(&self) -> &'static str {
        match self {
            Query::Dividend { .. } => "dividend",
            Query::DividendAnnouncement { .. } => "dividend_announcement",
            Query::StocksBalanceSheet { .. } => "stocks_balance_sheet",
            Query::StocksProfitSheet { .. } => "stocks_profit_sheet",
            Query::Revenue { .. } => "revenue",
            Query::Stock { .. } => "stock",
            Query::PriceRatio { .. } => "price_ratio",
            Query::EtfDividend { .. } => "etf_dividend",
            Query::EtfSlice { .. } => "etf_slice",
            Query::Tw2yIndex { .. } => "tw_2y_index",
            Query::StockPriceHistory { .. } => "stock_price_history",
        }
    }

    fn timeout(&self) -> Option<Duration> {
        let secs = match self {
            Query::Dividend { timeout, .. }
            | Query::DividendAnnouncement { timeout, .. }
            | Query::StocksBalanceSheet { timeout, .. }
            | Query::StocksProfitSheet { timeout, .. }
            | Query::Revenue { timeout, .. }
            | Query::Stock { timeout, .. }
            | Query::PriceRatio { timeout, .. }
            | Query::EtfDividend { timeout, .. }
            | Query::EtfSlice { timeout, .. }
            | Query::Tw2yIndex { timeout }
            | Query::StockPriceHistory { timeout, .. } => *timeout,
        };
        secs.map(Duration::from_secs)
    }

    /// Fetch and normalize; the records come back as plain JSON.
    #[instrument(level = "info", skip_all, fields(data_type = self.data_type()))]
    pub fn run(&self, transport: &dyn Transport, settings: &Settings) -> Result<Value> {
        info!(query = ?self, "running query");
        let timeout = self.timeout();
        match self {
            Query::Dividend { stock_type, year, .. } => {
                to_json(mops::dividends(transport, *year, *stock_type, timeout)?)
            }
            Query::DividendAnnouncement {
                stock_type,
                year,
                month,
                ..
            } => to_json(mops::dividend_announcements(
                transport,
                *year,
                *month,
                *stock_type,
                timeout,
            )?),
            Query::StocksBalanceSheet {
                stock_type,
                year,
                quarter,
                ..
            } => to_json(mops::balance_sheets(transport, *year, *quarter, *stock_type, timeout)?),
            Query::StocksProfitSheet {
                stock_type,
                year,
                quarter,
                ..
            } => to_json(mops::profit_sheets(transport, *year, *quarter, *stock_type, timeout)?),
            Query::Revenue {
                stock_type,
                year,
                month,
                ..
            } => to_json(mops::revenue(transport, *year, *month, *stock_type, timeout)?),
            Query::Stock { stock_type, .. } => to_json(mops::stocks(transport, *stock_type, timeout)?),
            Query::PriceRatio {
                stock_type,
                query_date,
                ..
            } => to_json(market::price_ratios(
                transport,
                *stock_type,
                *query_date,
                settings,
                timeout,
            )?),
            Query::EtfDividend {
                etf_id,
                etf_country,
                years,
                ..
            } => to_json(market::etf_dividends(transport, etf_id, *etf_country, *years, timeout)?),
            Query::EtfSlice {
                etf_id,
                etf_country,
                ..
            } => to_json(market::etf_slices(transport, etf_id, *etf_country, timeout)?),
            Query::Tw2yIndex { .. } => to_json(market::tw_2y_index(transport, timeout)?),
            Query::StockPriceHistory {
                stock_id,
                start_date_included,
                end_date_excluded,
                ..
            } => {
                let end = match end_date_excluded {
                    Some(end) => *end,
                    None => taipei_today()?,
                };
                to_json(market::price_history(
                    transport,
                    stock_id,
                    *start_date_included,
                    end,
                    timeout,
                )?)
            }
        }
    }
}
