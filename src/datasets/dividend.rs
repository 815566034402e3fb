// src/datasets/dividend.rs
//
// Board-approved dividend distributions, one HTML page per year and market.
// Rows are positional: the two header tiers only prove which layout the page
// uses, the cells are then read by index.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::{ParseError, ParseResult};
use crate::extract::{extract_tables, Gate, NoDataMarker, TableIndex, TableSpec};
use crate::normalize::number::{is_not_applicable, is_zero};
use crate::normalize::overrides::{self, Dataset};
use crate::schema::{self, Category, Rule, SchemaVersion};

pub const NO_DATA_TEXT: &str = "查無符合條件之資料";

pub const TABLES: TableSpec = TableSpec {
    gate: Gate::Element {
        tag: "table",
        attr: "class",
        values: &["hasBorder"],
    },
    tables: TableIndex::All,
    no_data_cells: &[],
    no_data_marker: Some(NoDataMarker {
        path: &["h4", "font"],
        text: NO_DATA_TEXT,
    }),
};

static STOCK_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+.*) - (.+)$").unwrap());

const TEST_ACCOUNT: &str = "測試帳號";

/// Issuers that already published the 2017 layout for fiscal year 2016.
const EARLY_2017_LAYOUT: &[&str] = &["4764", "3306", "3548", "4923", "6508"];

const HEADER_COMMON: [&str; 12] = [
    "公司代號",
    "決議（擬議）進度",
    "股利所屬",
    "股利所屬",
    "期別",
    "董事會決議",
    "股東會",
    "期初未分配",
    "本期淨利",
    "可分配",
    "分配後期末未",
    "股東配發內容",
];

const HEADERS_AFTER_2021: &[&[&str]] = &[
    &[
        HEADER_COMMON[0], HEADER_COMMON[1], HEADER_COMMON[2], HEADER_COMMON[3],
        HEADER_COMMON[4], HEADER_COMMON[5], HEADER_COMMON[6], HEADER_COMMON[7],
        HEADER_COMMON[8], HEADER_COMMON[9], HEADER_COMMON[10], HEADER_COMMON[11],
        "摘錄公司章程-", "備註",
    ],
    &["盈餘分配", "法定盈餘", "資本公積", "股東配發", "盈餘轉", "法定盈餘", "資本公積", "股東配股"],
];

const HEADERS_2017_TO_2020: &[&[&str]] = &[
    HEADERS_AFTER_2021[0],
    &["盈餘分配", "法定盈餘", "股東配發", "盈餘轉", "法定盈餘", "股東配股"],
];

const HEADERS_BEFORE_2016: &[&[&str]] = &[
    &[
        HEADER_COMMON[0], HEADER_COMMON[1], HEADER_COMMON[2], HEADER_COMMON[3],
        HEADER_COMMON[4], HEADER_COMMON[5], HEADER_COMMON[6], HEADER_COMMON[7],
        HEADER_COMMON[8], HEADER_COMMON[9], HEADER_COMMON[10], HEADER_COMMON[11],
        "董監酬勞(元)", "員工紅利", "有無全數", "股東會", "摘錄公司章程-", "備註",
    ],
    &[
        "盈餘分配", "法定盈餘", "股東配發", "盈餘轉", "法定盈餘", "股東配股",
        "現金紅利", "股票紅利", "股票紅利", "股票紅利",
    ],
];

/// The three layouts the disclosure page went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DividendVersion {
    After2021,
    Between2017And2020,
    Before2016,
}

/// Cell positions of one layout.
struct Columns {
    cash_parts: &'static [usize],
    cash_total: usize,
    share_parts: &'static [usize],
    share_total: usize,
    note: usize,
}

impl DividendVersion {
    fn columns(self) -> Columns {
        match self {
            DividendVersion::After2021 => Columns {
                cash_parts: &[11, 12, 13],
                cash_total: 14,
                share_parts: &[15, 16, 17],
                share_total: 18,
                note: 19,
            },
            DividendVersion::Between2017And2020 => Columns {
                cash_parts: &[11, 12],
                cash_total: 13,
                share_parts: &[14, 15],
                share_total: 16,
                note: 17,
            },
            DividendVersion::Before2016 => Columns {
                cash_parts: &[11, 12],
                cash_total: 13,
                share_parts: &[14, 15],
                share_total: 16,
                note: 24,
            },
        }
    }

    pub fn min_cells(self) -> usize {
        match self {
            DividendVersion::After2021 => 20,
            DividendVersion::Between2017And2020 => 18,
            DividendVersion::Before2016 => 25,
        }
    }
}

impl SchemaVersion for DividendVersion {
    fn expected_headers(&self) -> &'static [&'static [&'static str]] {
        match self {
            DividendVersion::After2021 => HEADERS_AFTER_2021,
            DividendVersion::Between2017And2020 => HEADERS_2017_TO_2020,
            DividendVersion::Before2016 => HEADERS_BEFORE_2016,
        }
    }
}

pub const RULES: &[Rule<DividendVersion>] = &[
    Rule {
        version: DividendVersion::After2021,
        applies: |c| c.year > 2020,
    },
    Rule {
        version: DividendVersion::Between2017And2020,
        applies: |c| (2017..=2020).contains(&c.year),
    },
    Rule {
        version: DividendVersion::Between2017And2020,
        applies: |c| {
            c.year == 2016
                && c.stock_id.map_or(false, |id| EARLY_2017_LAYOUT.contains(&id))
                && c.cells.map_or(false, |n| n < 25)
        },
    },
    Rule {
        version: DividendVersion::Before2016,
        applies: |c| (1912..=2016).contains(&c.year),
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dividend {
    pub progress_status: String,
    pub dividend_cal_time_str: String,
    pub dividend_cal_time: String,
    pub time_index: String,

    pub dividend_board_plan_time: Option<String>,
    pub dividend_shareholder_time: Option<String>,

    pub rest_last_time: String,
    pub earn: String,
    pub assignable: String,
    pub unassign: String,

    pub dividend_cash_per_share_from_earn: String,
    pub dividend_cash_per_share_from_earn_accumulation: String,
    pub dividend_cash_per_share_from_other_accumulation: String,
    pub dividend_cash_total: String,

    pub dividend_share_per_share_from_earn: String,
    pub dividend_share_per_share_from_earn_accumulation: String,
    pub dividend_share_per_share_from_other_accumulation: String,
    pub dividend_share_total: String,

    pub note: Option<String>,
    pub year: i32,
}

fn plain(cell: &str) -> String {
    cell.replace(',', "")
}

fn zero_if_empty(cell: &str, zero: &str) -> String {
    if cell.is_empty() {
        zero.to_string()
    } else {
        plain(cell)
    }
}

fn is_zero_or_empty(cell: &str) -> bool {
    cell.is_empty() || is_zero(cell)
}

/// A zero or blank total must not have non-zero constituents. Before 2021 a
/// non-zero total must also have at least one constituent.
fn check_totals(
    version: DividendVersion,
    year: i32,
    stock_id: &str,
    cells: &[String],
) -> ParseResult<()> {
    let cols = version.columns();
    for (kind, parts, total) in [
        ("cash", cols.cash_parts, cols.cash_total),
        ("share", cols.share_parts, cols.share_total),
    ] {
        let total_value = cells[total].as_str();
        let parts_empty = parts.iter().all(|&i| is_zero_or_empty(&cells[i]));
        // Blank totals are published as "0", so they are checked as zero.
        let total_is_zero = is_zero_or_empty(total_value);

        if total_is_zero && !parts_empty {
            return Err(ParseError::InconsistentTotals {
                stock_id: stock_id.to_string(),
                year,
                detail: format!("{} total is zero but constituents are {:?}", kind, pick(cells, parts)),
            });
        }

        if version != DividendVersion::After2021
            && !total_is_zero
            && parts_empty
            && !overrides::is_totals_exception(year, stock_id)
        {
            return Err(ParseError::InconsistentTotals {
                stock_id: stock_id.to_string(),
                year,
                detail: format!("{} total `{}` without constituents", kind, total_value),
            });
        }
    }
    Ok(())
}

fn pick<'a>(cells: &'a [String], idx: &[usize]) -> Vec<&'a str> {
    idx.iter().map(|&i| cells[i].as_str()).collect()
}

/// Map one positional row of a resolved layout onto the record.
pub fn to_record(version: DividendVersion, cells: &[String], year: i32) -> ParseResult<Dividend> {
    if cells.len() < version.min_cells() {
        return Err(ParseError::mismatch(
            format!("dividend row width for {:?}", version),
            format!("at least {} cells", version.min_cells()),
            cells,
        ));
    }
    let cols = version.columns();
    let c = |i: usize| cells[i].as_str();

    let (cash_earn_acc, cash_other_acc, cash_total, share_earn, share_earn_acc, share_other_acc, share_total, note_blank): (
        String,
        String,
        String,
        String,
        String,
        String,
        String,
        &[&str],
    ) = match version {
        DividendVersion::After2021 => (
            zero_if_empty(c(12), "0.0"),
            plain(c(13)),
            zero_if_empty(c(14), "0"),
            zero_if_empty(c(15), "0"),
            zero_if_empty(c(16), "0"),
            plain(c(17)),
            zero_if_empty(c(18), "0"),
            &["無", "", "無。"],
        ),
        DividendVersion::Between2017And2020 | DividendVersion::Before2016 => (
            "0.0".to_string(),
            plain(c(12)),
            plain(c(13)),
            plain(c(14)),
            "0.0".to_string(),
            plain(c(15)),
            plain(c(16)),
            &["無", ""],
        ),
    };

    let note = c(cols.note);
    Ok(Dividend {
        progress_status: c(1).to_string(),
        dividend_cal_time_str: c(2).to_string(),
        dividend_cal_time: c(3).to_string(),
        time_index: c(4).to_string(),
        dividend_board_plan_time: (c(5) != "0").then(|| c(5).to_string()),
        dividend_shareholder_time: (!is_not_applicable(c(6))).then(|| c(6).to_string()),
        rest_last_time: plain(c(7)),
        earn: plain(c(8)),
        assignable: plain(c(9)),
        unassign: plain(c(10)),
        dividend_cash_per_share_from_earn: plain(c(11)),
        dividend_cash_per_share_from_earn_accumulation: cash_earn_acc,
        dividend_cash_per_share_from_other_accumulation: cash_other_acc,
        dividend_cash_total: cash_total,
        dividend_share_per_share_from_earn: share_earn,
        dividend_share_per_share_from_earn_accumulation: share_earn_acc,
        dividend_share_per_share_from_other_accumulation: share_other_acc,
        dividend_share_total: share_total,
        note: (!note_blank.contains(&note)).then(|| note.to_string()),
        year,
    })
}

/// Split the leading `"<id> - <name>"` cell.
fn stock_of(cell: &str) -> ParseResult<(&str, &str)> {
    let caps = STOCK_CELL
        .captures(cell)
        .ok_or_else(|| ParseError::invalid("stock", cell, "expected `<id> - <name>`"))?;
    match (caps.get(1), caps.get(2)) {
        (Some(id), Some(name)) => Ok((id.as_str(), name.as_str())),
        _ => Err(ParseError::invalid("stock", cell, "expected `<id> - <name>`")),
    }
}

/// Normalize one positional row: resolve its layout, patch known upstream
/// errors, verify totals and map it.
pub fn normalize_row(year: i32, mut cells: Vec<String>) -> ParseResult<Option<(String, Dividend)>> {
    let first = cells.first().cloned().unwrap_or_default();
    let (stock_id, stock_name) = stock_of(&first)?;
    if stock_name == TEST_ACCOUNT {
        debug!(%stock_id, "skipping test account");
        return Ok(None);
    }

    let version = schema::resolve(
        "dividend",
        RULES,
        &Category {
            year,
            stock_id: Some(stock_id),
            cells: Some(cells.len()),
            label: None,
        },
    )?;
    if cells.len() < version.min_cells() {
        return Err(ParseError::mismatch(
            format!("dividend row width for {:?}", version),
            format!("at least {} cells", version.min_cells()),
            &cells,
        ));
    }

    if version != DividendVersion::After2021 {
        let patched = overrides::apply_to_cells(Dataset::Dividend, year, stock_id, &mut cells);
        if patched.is_none() {
            check_totals(version, year, stock_id, &cells)?;
            for cell in &mut cells[11..=16] {
                if cell.is_empty() {
                    *cell = "0".to_string();
                }
            }
        }
    } else {
        check_totals(version, year, stock_id, &cells)?;
    }

    let record = to_record(version, &cells, year)?;
    Ok(Some((stock_id.to_string(), record)))
}

/// Parse a dividend disclosure page for `year` into records grouped by stock id.
#[instrument(level = "info", skip(body), fields(body_len = body.len()))]
pub fn parse_dividends(body: &str, year: i32) -> ParseResult<BTreeMap<String, Vec<Dividend>>> {
    let extraction = extract_tables(body, &TABLES)?;
    let mut out: BTreeMap<String, Vec<Dividend>> = BTreeMap::new();
    if extraction.no_data {
        info!(year, "no dividend data published");
        return Ok(out);
    }

    let page_version = schema::resolve("dividend", RULES, &Category::year(year))?;
    for group in &extraction.groups {
        if group.rows.is_empty() && group.headers.is_empty() {
            continue;
        }
        schema::check_headers("dividend", page_version.expected_headers(), &group.headers)?;
        for row in &group.rows {
            if let Some((stock_id, record)) = normalize_row(year, row.clone())? {
                debug!(%stock_id, ?record, "dividend row");
                out.entry(stock_id).or_default().push(record);
            }
        }
    }

    info!(year, issuers = out.len(), "dividends parsed");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::init_test_logging;

    fn html_page(headers: &[&[&str]], rows: &[Vec<String>]) -> String {
        let mut html = String::from(r#"<html><body><table class="hasBorder">"#);
        for tier in headers {
            html.push_str("<tr>");
            for h in tier.iter() {
                html.push_str(&format!("<th>{}</th>", h));
            }
            html.push_str("</tr>");
        }
        for row in rows {
            html.push_str("<tr>");
            for cell in row {
                html.push_str(&format!("<td>{}</td>", cell));
            }
            html.push_str("</tr>");
        }
        html.push_str("</table></body></html>");
        html
    }

    fn row_2022(stock: &str, cash: [&str; 4], share: [&str; 4]) -> Vec<String> {
        let mut cells = vec![
            stock, "股東會確認", "111年年度", "111/01/01~111/12/31", "1", "112/02/14",
            "112/06/06", "1,000", "500", "1,500", "900",
        ];
        cells.extend(cash);
        cells.extend(share);
        cells.push("無");
        cells.into_iter().map(String::from).collect()
    }

    fn row_2019(stock: &str, cash: [&str; 3], share: [&str; 3], note: &str) -> Vec<String> {
        let mut cells = vec![
            stock, "董事會決議", "107年年度", "107/01/01~107/12/31", "1", "0",
            "不適用", "10", "20", "30", "40",
        ];
        cells.extend(cash);
        cells.extend(share);
        cells.push(note);
        cells.into_iter().map(String::from).collect()
    }

    #[test]
    fn after_2021_page_groups_by_stock() -> anyhow::Result<()> {
        init_test_logging();
        let rows = vec![
            row_2022("2330 - 台積電", ["2.75", "", "0.0", "71,308,000"], ["", "", "0.0", ""]),
            row_2022("2330 - 台積電", ["3.00", "", "0.0", "77,790,000"], ["0.0", "", "0.0", "0"]),
            row_2022("9999 - 測試帳號", ["0", "", "0", "0"], ["0", "", "0", "0"]),
        ];
        let html = html_page(HEADERS_AFTER_2021, &rows);
        let parsed = parse_dividends(&html, 2022)?;

        assert_eq!(parsed.len(), 1);
        let records = &parsed["2330"];
        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.rest_last_time, "1000");
        assert_eq!(first.dividend_cash_total, "71308000");
        assert_eq!(first.dividend_cash_per_share_from_earn_accumulation, "0.0");
        assert_eq!(first.dividend_share_per_share_from_earn, "0");
        assert_eq!(first.dividend_share_total, "0");
        assert_eq!(first.note, None);
        assert_eq!(first.year, 2022);

        let json = serde_json::to_value(first)?;
        assert_eq!(json["dividend_cash_per_share_from_earn_accumulation"], "0.0");
        Ok(())
    }

    #[test]
    fn pre_2021_rows_fill_accumulation_and_blanks() -> anyhow::Result<()> {
        let rows = vec![row_2019("1101 - 台泥", ["1.5", "", "7,000"], ["", "", ""], "本公司章程")];
        let html = html_page(HEADERS_2017_TO_2020, &rows);
        let parsed = parse_dividends(&html, 2019)?;
        let record = &parsed["1101"][0];

        assert_eq!(record.dividend_cash_per_share_from_earn_accumulation, "0.0");
        assert_eq!(record.dividend_share_per_share_from_earn_accumulation, "0.0");
        assert_eq!(record.dividend_cash_per_share_from_other_accumulation, "0");
        assert_eq!(record.dividend_cash_total, "7000");
        assert_eq!(record.dividend_share_total, "0");
        assert_eq!(record.dividend_board_plan_time, None);
        assert_eq!(record.dividend_shareholder_time, None);
        assert_eq!(record.note.as_deref(), Some("本公司章程"));
        Ok(())
    }

    #[test]
    fn zero_total_with_cash_is_rejected() {
        let rows = vec![row_2019("1101 - 台泥", ["1.5", "", "0"], ["", "", ""], "無")];
        let html = html_page(HEADERS_2017_TO_2020, &rows);
        assert!(matches!(
            parse_dividends(&html, 2019),
            Err(ParseError::InconsistentTotals { .. })
        ));
    }

    #[test]
    fn blank_cash_total_with_cash_is_rejected() {
        let row = row_2019("1101 - 台泥", ["1.5", "", ""], ["", "", ""], "無");
        assert!(matches!(
            normalize_row(2019, row),
            Err(ParseError::InconsistentTotals { .. })
        ));
    }

    #[test]
    fn blank_or_zero_share_total_with_shares_is_rejected() {
        for share in [["0.5", "", ""], ["", "0.2", "0"]] {
            let row = row_2019("1101 - 台泥", ["", "", ""], share, "無");
            assert!(matches!(
                normalize_row(2019, row),
                Err(ParseError::InconsistentTotals { .. })
            ));
        }

        let mut before_2016 = row_2019("1101 - 台泥", ["", "", ""], ["1.0", "", ""], "無");
        before_2016.resize(25, String::new());
        assert!(matches!(
            normalize_row(2015, before_2016),
            Err(ParseError::InconsistentTotals { .. })
        ));
    }

    #[test]
    fn total_without_constituents_is_rejected_unless_listed() -> anyhow::Result<()> {
        let bad = vec![row_2019("1101 - 台泥", ["0", "", "500"], ["", "", ""], "無")];
        let html = html_page(HEADERS_2017_TO_2020, &bad);
        assert!(parse_dividends(&html, 2018).is_err());

        let listed = vec![row_2019("3447 - 展達", ["0", "", "500"], ["", "", ""], "無")];
        let html = html_page(HEADERS_2017_TO_2020, &listed);
        assert_eq!(parse_dividends(&html, 2018)?["3447"][0].dividend_cash_total, "500");
        Ok(())
    }

    #[test]
    fn override_bypasses_checks() -> anyhow::Result<()> {
        let rows = vec![row_2019("1784 - 訊聯", ["1.0", "", "0"], ["", "", ""], "無")];
        let html = html_page(HEADERS_2017_TO_2020, &rows);
        let record = &parse_dividends(&html, 2020)?["1784"][0];
        assert_eq!(record.dividend_cash_per_share_from_other_accumulation, "");
        Ok(())
    }

    #[test]
    fn zero_total_property_holds_for_parsed_rows() -> anyhow::Result<()> {
        let rows = vec![
            row_2022("1101 - 台泥", ["0.0", "", "0.0", "0"], ["", "", "", ""]),
            row_2022("1102 - 亞泥", ["1.2", "", "", "1,000"], ["", "", "", ""]),
        ];
        let html = html_page(HEADERS_AFTER_2021, &rows);
        for record in parse_dividends(&html, 2023)?.values().flatten() {
            if record.dividend_cash_total == "0" {
                for part in [
                    &record.dividend_cash_per_share_from_earn,
                    &record.dividend_cash_per_share_from_earn_accumulation,
                    &record.dividend_cash_per_share_from_other_accumulation,
                ] {
                    assert!(part.is_empty() || is_zero(part), "{part}");
                }
            }
        }
        Ok(())
    }

    #[test]
    fn header_drift_is_fatal() {
        let rows = vec![row_2022("2330 - 台積電", ["1", "", "", "1"], ["", "", "", ""])];
        let html = html_page(HEADERS_2017_TO_2020, &rows);
        assert!(matches!(
            parse_dividends(&html, 2022),
            Err(ParseError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn no_data_page_is_empty() -> anyhow::Result<()> {
        let html = format!("<html><body><h4><font>{}</font></h4></body></html>", NO_DATA_TEXT);
        assert!(parse_dividends(&html, 2024)?.is_empty());
        Ok(())
    }

    #[test]
    fn early_2017_layout_in_2016() -> anyhow::Result<()> {
        let cat = |id, cells| Category {
            year: 2016,
            stock_id: Some(id),
            cells: Some(cells),
            label: None,
        };
        assert_eq!(
            schema::resolve("dividend", RULES, &cat("4764", 18))?,
            DividendVersion::Between2017And2020
        );
        assert_eq!(
            schema::resolve("dividend", RULES, &cat("4764", 26))?,
            DividendVersion::Before2016
        );
        assert_eq!(
            schema::resolve("dividend", RULES, &cat("2330", 18))?,
            DividendVersion::Before2016
        );
        assert!(schema::resolve("dividend", RULES, &Category::year(1911)).is_err());
        Ok(())
    }

    #[test]
    fn normalizing_twice_is_identical() -> anyhow::Result<()> {
        let row = row_2019("1101 - 台泥", ["1.5", "", "7,000"], ["", "", ""], "無");
        let a = normalize_row(2019, row.clone())?;
        let b = normalize_row(2019, row)?;
        assert_eq!(
            serde_json::to_string(&a.map(|(_, r)| r))?,
            serde_json::to_string(&b.map(|(_, r)| r))?
        );
        Ok(())
    }
}
