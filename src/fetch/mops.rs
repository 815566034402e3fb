// src/fetch/mops.rs
//
// Flows against the market observation post system (MOPS), the disclosure
// site of both exchanges. The current site hands out one-off links into the
// old site through a redirect API; some exports are a query page that names
// a CSV file followed by a download of that file.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::{Request, Transport};
use crate::datasets::balance_sheet::{parse_balance_sheets, BalanceSheet};
use crate::datasets::dividend::{parse_dividends, Dividend};
use crate::datasets::dividend_announcement::{
    find_export_link, parse_announcements, DividendAnnouncement, ExportLink,
};
use crate::datasets::profit_sheet::{parse_profit_sheets, ProfitSheet};
use crate::datasets::revenue::{parse_revenue, Revenue};
use crate::datasets::stock::{parse_stocks, Stock};
use crate::datasets::StockType;
use crate::normalize::calendar::ad_to_roc;

pub const REDIRECT_API: &str = "https://mops.twse.com.tw/mops/api/redirectToOld";
pub const DIVIDEND_URL: &str = "https://mops.twse.com.tw/server-java/t05st09sub";
pub const ANNOUNCEMENT_QUERY_URL: &str = "https://mopsov.twse.com.tw/mops/web/ajax_t108sb27";
pub const CSV_DOWNLOAD_URL: &str = "https://mopsov.twse.com.tw/server-java/t105sb02";
pub const FILE_DOWNLOAD_URL: &str = "https://mopsov.twse.com.tw/server-java/FileDownLoad";

/// Ask the redirect API for an old-site link to `api_name` and fetch it.
fn via_redirect(
    transport: &dyn Transport,
    api_name: &str,
    parameters: Value,
    timeout: Option<Duration>,
) -> Result<String> {
    let request = Request::post_json(
        REDIRECT_API,
        json!({ "apiName": api_name, "parameters": parameters }),
    )
    .timeout(timeout);
    let answer = transport.send(&request)?;
    let doc: Value = serde_json::from_str(&answer.body)
        .with_context(|| format!("redirect answer for {} is not json", api_name))?;
    let Some(url) = doc.pointer("/result/url").and_then(Value::as_str) else {
        bail!("redirect answer for {} carries no url: {}", api_name, doc);
    };
    info!(%api_name, %url, "redirected to old site");

    Ok(transport.send(&Request::get(url).timeout(timeout))?.body)
}

/// Report parameters shared by the quarterly financial statements.
fn statement_parameters(year: i32, quarter: u8, stock_type: StockType) -> Value {
    json!({
        "year": ad_to_roc(year).to_string(),
        "TYPEK": stock_type.typek(),
        "season": format!("0{}", quarter),
        "encodeURIComponent": 1,
        "off": 1,
        "step": 1,
        "firstin": 1,
        "isQuery": "Y",
    })
}

#[instrument(level = "info", skip(transport))]
pub fn dividends(
    transport: &dyn Transport,
    year: i32,
    stock_type: StockType,
    timeout: Option<Duration>,
) -> Result<BTreeMap<String, Vec<Dividend>>> {
    let request = Request::post_form(
        DIVIDEND_URL,
        [
            ("step", "1".to_string()),
            ("TYPEK", stock_type.typek().to_string()),
            ("YEAR", ad_to_roc(year).to_string()),
            ("first", String::new()),
            ("qryType", "1".to_string()),
        ],
    )
    .encoding("big5")
    .timeout(timeout);
    let page = transport.send(&request)?;
    parse_dividends(&page.body, year).with_context(|| format!("parsing {}", page.url))
}

#[instrument(level = "info", skip(transport))]
pub fn dividend_announcements(
    transport: &dyn Transport,
    year: i32,
    month: Option<u32>,
    stock_type: StockType,
    timeout: Option<Duration>,
) -> Result<BTreeMap<String, Vec<DividendAnnouncement>>> {
    let roc_year = ad_to_roc(year).to_string();
    let month = month.map(|m| format!("{:02}", m)).unwrap_or_default();
    let query = Request::post_form(
        ANNOUNCEMENT_QUERY_URL,
        [
            ("encodeURIComponent", "1"),
            ("step", "1"),
            ("firstin", "1"),
            ("off", "1"),
            ("keyword4", ""),
            ("code1", ""),
            ("TYPEK2", ""),
            ("checkbtn", ""),
            ("queryName", ""),
            ("TYPEK", stock_type.typek()),
            ("co_id_1", ""),
            ("co_id_2", ""),
            ("year", roc_year.as_str()),
            ("month", month.as_str()),
            ("b_date", ""),
            ("e_date", ""),
            ("type", ""),
        ],
    )
    .timeout(timeout);
    let page = transport.send(&query)?;

    let file = match find_export_link(&page.body).with_context(|| format!("parsing {}", page.url))? {
        ExportLink::NoData => {
            info!("no dividend announcements for query");
            return Ok(BTreeMap::new());
        }
        ExportLink::File(file) => file,
    };

    let download = Request::post_form(
        CSV_DOWNLOAD_URL,
        [("firstin", "True"), ("step", "10"), ("filename", file.as_str())],
    )
    .encoding("big5")
    .timeout(timeout);
    let csv = transport.send(&download)?;
    parse_announcements(&csv.body, year).with_context(|| format!("parsing export {}", file))
}

#[instrument(level = "info", skip(transport))]
pub fn revenue(
    transport: &dyn Transport,
    year: i32,
    month: u32,
    stock_type: StockType,
    timeout: Option<Duration>,
) -> Result<Vec<Revenue>> {
    let request = Request::post_form(
        FILE_DOWNLOAD_URL,
        [
            ("step", "9".to_string()),
            ("functionName", "show_file2".to_string()),
            ("filePath", format!("/t21/{}/", stock_type.typek())),
            ("fileName", format!("t21sc03_{}_{}.csv", ad_to_roc(year), month)),
        ],
    )
    .encoding("utf-8")
    .timeout(timeout);
    let csv = transport.send(&request)?;
    parse_revenue(&csv.body, year, month).with_context(|| format!("parsing {}", csv.url))
}

#[instrument(level = "info", skip(transport))]
pub fn balance_sheets(
    transport: &dyn Transport,
    year: i32,
    quarter: u8,
    stock_type: StockType,
    timeout: Option<Duration>,
) -> Result<Vec<BalanceSheet>> {
    let body = via_redirect(
        transport,
        "ajax_t163sb05",
        statement_parameters(year, quarter, stock_type),
        timeout,
    )?;
    parse_balance_sheets(&body, year)
        .with_context(|| format!("parsing balance sheets {} Q{}", year, quarter))
}

#[instrument(level = "info", skip(transport))]
pub fn profit_sheets(
    transport: &dyn Transport,
    year: i32,
    quarter: u8,
    stock_type: StockType,
    timeout: Option<Duration>,
) -> Result<Vec<ProfitSheet>> {
    let body = via_redirect(
        transport,
        "ajax_t163sb04",
        statement_parameters(year, quarter, stock_type),
        timeout,
    )?;
    parse_profit_sheets(&body, year, quarter)
        .with_context(|| format!("parsing profit sheets {} Q{}", year, quarter))
}

#[instrument(level = "info", skip(transport))]
pub fn stocks(
    transport: &dyn Transport,
    stock_type: StockType,
    timeout: Option<Duration>,
) -> Result<Vec<Stock>> {
    let parameters = json!({
        "TYPEK": stock_type.typek(),
        "code": "",
        "encodeURIComponent": 1,
        "step": 1,
        "firstin": true,
        "id": "",
    });
    let body = via_redirect(transport, "ajax_t51sb01", parameters, timeout)?;
    parse_stocks(&body, stock_type).context("parsing stock directory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::canned::CannedTransport;
    use crate::fetch::Body;
    use crate::test_support::init_test_logging;

    const OLD_SITE: &str = "https://mopsov.twse.com.tw/mops/web/ajax_t163sb05";

    fn redirect_answer(url: &str) -> String {
        json!({ "code": 200, "result": { "url": url } }).to_string()
    }

    #[test]
    fn balance_sheets_follow_the_redirect() -> Result<()> {
        init_test_logging();
        let report = r#"<table class="hasBorder">
            <tr><th>公司<br>代號</th><th>公司名稱</th><th>資產總計</th><th>負債總計</th><th>股本</th>
                <th>資本公積</th><th>保留盈餘（或累積虧損）</th><th>其他權益</th><th>庫藏股票</th>
                <th>歸屬於母公司業主權益合計</th><th>共同控制下前手權益</th><th>非控制權益</th>
                <th>權益總計</th><th>每股參考淨值</th></tr>
            <tr><td>2330</td><td>台積電</td><td>1,000</td><td>200</td><td>259,327,332</td>
                <td>70,000</td><td>3,000</td><td>-1,200</td><td>0</td>
                <td>800</td><td>0</td><td>50</td>
                <td>850</td><td>12.50</td></tr>
            </table>"#;
        let transport = CannedTransport::new()
            .reply(REDIRECT_API, redirect_answer(OLD_SITE))
            .reply(OLD_SITE, report);

        let sheets = balance_sheets(&transport, 2023, 4, StockType::Public, None)?;
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].assets, "1000000");

        let sent = transport.sent();
        let Body::Json(payload) = &sent[0].body else {
            panic!("redirect request should carry json");
        };
        assert_eq!(payload["apiName"], "ajax_t163sb05");
        assert_eq!(payload["parameters"]["year"], "112");
        assert_eq!(payload["parameters"]["season"], "04");
        assert_eq!(sent[1].url, OLD_SITE);
        Ok(())
    }

    #[test]
    fn redirect_without_url_fails() {
        let transport = CannedTransport::new().reply(REDIRECT_API, r#"{"code":500}"#);
        assert!(stocks(&transport, StockType::Otc, None).is_err());
    }

    #[test]
    fn announcement_export_in_two_steps() -> Result<()> {
        let query_page = r#"<input type="button" onclick="window.open('/server-java/t105sb02?filename=t108sb27_1715241234_12345.csv')">"#;
        let transport = CannedTransport::new()
            .reply(ANNOUNCEMENT_QUERY_URL, query_page)
            .reply(CSV_DOWNLOAD_URL, "");

        let out = dividend_announcements(&transport, 2025, Some(5), StockType::Public, None)?;
        assert!(out.is_empty());

        let sent = transport.sent();
        assert_eq!(sent[0].form_value("year"), Some("114"));
        assert_eq!(sent[0].form_value("month"), Some("05"));
        assert_eq!(sent[1].form_value("filename"), Some("t108sb27_1715241234_12345.csv"));
        assert_eq!(sent[1].encoding, Some("big5"));
        Ok(())
    }

    #[test]
    fn announcement_query_without_data_stops_early() -> Result<()> {
        let transport = CannedTransport::new().reply(
            ANNOUNCEMENT_QUERY_URL,
            format!("<center>{}</center>", crate::datasets::dividend_announcement::NO_DATA_TEXT),
        );
        assert!(dividend_announcements(&transport, 2025, None, StockType::Otc, None)?.is_empty());
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(transport.sent()[0].form_value("month"), Some(""));
        Ok(())
    }

    #[test]
    fn revenue_file_name() -> Result<()> {
        let transport = CannedTransport::new().reply(FILE_DOWNLOAD_URL, "出表日期\n");
        assert!(revenue(&transport, 2024, 3, StockType::Otc, None)?.is_empty());
        let sent = transport.sent();
        assert_eq!(sent[0].form_value("fileName"), Some("t21sc03_113_3.csv"));
        assert_eq!(sent[0].form_value("filePath"), Some("/t21/otc/"));
        Ok(())
    }

    #[test]
    fn dividend_form() -> Result<()> {
        let transport = CannedTransport::new().reply(DIVIDEND_URL, "<html><body></body></html>");
        let _ = dividends(&transport, 2022, StockType::Rotc, None);
        let sent = transport.sent();
        assert_eq!(sent[0].form_value("YEAR"), Some("111"));
        assert_eq!(sent[0].form_value("TYPEK"), Some("rotc"));
        assert_eq!(sent[0].encoding, Some("big5"));
        Ok(())
    }
}
