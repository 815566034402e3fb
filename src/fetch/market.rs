// src/fetch/market.rs
//
// Flows against the exchanges' after-trading reports and the fund and quote
// sites: price ratios, ETF dividends and splits, index and price history.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tracing::{info, instrument, warn};
use url::Url;

use super::{Request, Transport};
use crate::config::Settings;
use crate::datasets::etf_dividend::{parse_etf_dividends, EtfDividend};
use crate::datasets::etf_slice::{parse_etf_slices, EtfSlice};
use crate::datasets::price_history::{parse_price_history, Price, TAIPEI_OFFSET_SECS};
use crate::datasets::price_ratio::{parse_page, PriceRatio, RatioPage};
use crate::datasets::tw_2y_index::{parse_index_history, IndexDay};
use crate::datasets::{EtfCountry, StockType};
use crate::normalize::calendar::last_working_dates;

pub const LISTED_RATIO_URL: &str = "https://www.twse.com.tw/exchangeReport/BWIBBU_d";
pub const OTC_RATIO_URL: &str = "https://www.tpex.org.tw/www/zh-tw/afterTrading/peQryDate";
pub const POCKET_DTNO_URL: &str = "https://www.pocket.tw/api/cm/MobileService/ashx/GetDtnoData.ashx";
pub const ETF_SLICE_URL: &str = "https://www.moneydj.com/ETF/X/Basic/basic0006.xdjhtm";
pub const TW_INDEX_URL: &str = "https://www.moneydj.com/funddj/bcd/CZKC0.djbcd?a=EB09999&b=D";
pub const PRICE_HISTORY_URL: &str = "https://ws.api.cnyes.com/ws/api/v1/charting/history";

fn with_query(base: &str, pairs: &[(&str, &str)]) -> Result<String> {
    let mut url = Url::parse(base).with_context(|| format!("parsing url {}", base))?;
    url.query_pairs_mut().extend_pairs(pairs);
    Ok(url.to_string())
}

fn ratio_url(stock_type: StockType, day: NaiveDate) -> Result<String> {
    match stock_type {
        StockType::Public => with_query(
            LISTED_RATIO_URL,
            &[
                ("response", "json"),
                ("date", &day.format("%Y%m%d").to_string()),
                ("selectType", "ALL"),
            ],
        ),
        StockType::Otc => with_query(
            OTC_RATIO_URL,
            &[
                ("date", &day.format("%Y/%m/%d").to_string()),
                ("cate", ""),
                ("id", ""),
                ("response", "json"),
            ],
        ),
        StockType::Rotc => bail!("no price ratio report for {} issuers", stock_type.label()),
    }
}

/// Ratios of the latest working day on or before `query_date` that has a
/// report, walking back at most `settings.lookback_days` working days.
#[instrument(level = "info", skip(transport, settings))]
pub fn price_ratios(
    transport: &dyn Transport,
    stock_type: StockType,
    query_date: NaiveDate,
    settings: &Settings,
    timeout: Option<Duration>,
) -> Result<Vec<PriceRatio>> {
    for (attempt, day) in last_working_dates(query_date)
        .take(settings.lookback_days)
        .enumerate()
    {
        if attempt > 0 {
            std::thread::sleep(settings.lookback_pause());
        }
        let request = Request::post(ratio_url(stock_type, day)?).timeout(timeout);
        let page = transport.send(&request)?;
        match parse_page(&page.body, stock_type, day).with_context(|| format!("parsing {}", page.url))? {
            RatioPage::Records(rows) => {
                info!(%day, rows = rows.len(), "price ratios found");
                return Ok(rows);
            }
            RatioPage::NoData => warn!(%day, "no price ratio report, trying previous working day"),
        }
    }
    bail!(
        "no price ratio report within {} working days up to {}",
        settings.lookback_days,
        query_date
    )
}

/// Pocket data-table id and major table per listing country.
fn pocket_table(country: EtfCountry) -> (&'static str, &'static str) {
    match country {
        EtfCountry::Us => ("50405322", "M730"),
        EtfCountry::Tw => ("59444834", "M810"),
    }
}

#[instrument(level = "info", skip(transport))]
pub fn etf_dividends(
    transport: &dyn Transport,
    etf_id: &str,
    country: EtfCountry,
    years: u32,
    timeout: Option<Duration>,
) -> Result<Vec<EtfDividend>> {
    let (dtno, major_table) = pocket_table(country);
    let params = format!(
        "AssignID={};MTPeriod=3;DTMode=0;DTRange={};DTOrder=1;MajorTable={};",
        etf_id.to_uppercase(),
        years,
        major_table
    );
    let url = with_query(
        POCKET_DTNO_URL,
        &[
            ("action", "getdtnodata"),
            ("DtNo", dtno),
            ("ParamStr", &params),
            ("FilterNo", "0"),
        ],
    )?;
    let response = transport.send(&Request::get(url).timeout(timeout))?;
    parse_etf_dividends(&response.body, country).with_context(|| format!("parsing {}", response.url))
}

#[instrument(level = "info", skip(transport))]
pub fn etf_slices(
    transport: &dyn Transport,
    etf_id: &str,
    country: EtfCountry,
    timeout: Option<Duration>,
) -> Result<Vec<EtfSlice>> {
    let url = with_query(ETF_SLICE_URL, &[("etfid", &country.symbol(etf_id))])?;
    let response = transport.send(&Request::get(url).timeout(timeout))?;
    parse_etf_slices(&response.body).with_context(|| format!("parsing {}", response.url))
}

#[instrument(level = "info", skip(transport))]
pub fn tw_2y_index(transport: &dyn Transport, timeout: Option<Duration>) -> Result<Vec<IndexDay>> {
    let response = transport.send(&Request::get(TW_INDEX_URL).timeout(timeout))?;
    parse_index_history(&response.body).with_context(|| format!("parsing {}", response.url))
}

/// Unix seconds of `hour`:00 Taiwan time on `day`.
fn taipei_timestamp(day: NaiveDate, hour: u32) -> Result<i64> {
    let local = day
        .and_hms_opt(hour, 0, 0)
        .with_context(|| format!("no {}:00 on {}", hour, day))?;
    Ok(local.and_utc().timestamp() - i64::from(TAIPEI_OFFSET_SECS))
}

/// Daily bars from `start` (inclusive) up to `end` (exclusive). The API
/// takes the range newest first: `from` is the end, `to` the start.
#[instrument(level = "info", skip(transport))]
pub fn price_history(
    transport: &dyn Transport,
    stock_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    timeout: Option<Duration>,
) -> Result<Vec<Price>> {
    let from = taipei_timestamp(end, 0)?.to_string();
    let to = taipei_timestamp(start, 12)?.to_string();
    let symbol = format!("TWS:{}:STOCK", stock_id);
    let url = with_query(
        PRICE_HISTORY_URL,
        &[
            ("resolution", "D"),
            ("symbol", &symbol),
            ("from", &from),
            ("to", &to),
        ],
    )?;
    let response = transport.send(&Request::get(url).timeout(timeout))?;
    parse_price_history(&response.body).with_context(|| format!("parsing {}", response.url))
}
