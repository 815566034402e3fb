// src/datasets/profit_sheet.rs

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::{thousands, thousands_opt, unscaled, REPORT_TABLES};
use crate::error::{ParseError, ParseResult};
use crate::extract::{extract_tables, RawRow};
use crate::normalize::fields::{field_group, RowReader};
use crate::normalize::number::{format_decimal, parse_decimal};
use crate::normalize::overrides::{self, Dataset};

field_group! {
    /// Line items only some issuer categories print.
    pub struct ProfitItems {
        operating_costs: ["營業成本"],

        biological_assets_profit_or_loss: ["原始認列生物資產及農產品之利益（損失）"],
        biological_assets_current_profit_or_loss: ["生物資產當期公允價值減出售成本之變動利益（損失）"],

        operating_gross_profit: ["營業毛利（毛損）"],

        unrealized_selling_profit: ["未實現銷貨（損）益"],
        realized_selling_profit: ["已實現銷貨（損）益"],

        net_operating_gross_profit: ["營業毛利（毛損）淨額"],

        operating_expenses: ["營業費用", "支出及費用", "支出"],
        net_other_expenses_or_profit: ["其他收益及費損淨額"],

        operating_profit: ["營業利益（損失）", "營業利益"],

        non_operating_profit: ["營業外收入及支出", "營業外損益"],

        prepare_bad_debt: [
            "呆帳費用、承諾及保證責任準備提存",
            "呆帳費用及保證責任準備提存",
            "呆帳費用及保證責任準備提存（各項提存）",
        ],

        prepare_insurance_debt: ["保險負債準備淨變動"],
    }
}

field_group! {
    pub struct OperatingRevenueDetail {
        interest_revenue: ["利息淨收益"],
        non_interest_revenue: ["利息以外淨損益", "利息以外淨收益"],
    }
}

field_group! {
    pub struct ProfitDetail {
        this_company: ["淨利（淨損）歸屬於母公司業主", "淨利（損）歸屬於母公司業主"],
        from_before_merge: ["淨利（淨損）歸屬於共同控制下前手權益", "淨利（損）歸屬於共同控制下前手權益"],
        non_control_equity: ["淨利（淨損）歸屬於非控制權益", "淨利（損）歸屬於非控制權益"],
        from_continuing_operation: [
            "繼續營業單位本期淨利（淨損）",
            "繼續營業單位本期稅後淨利（淨損）",
            "繼續營業單位本期純益（純損）",
        ],
        from_discontinuing_operation: ["停業單位損益"],
        from_merged_company: ["合併前非屬共同控制股權損益"],
    }
}

field_group! {
    pub struct ComprehensiveProfitDetail {
        this_company: ["綜合損益總額歸屬於母公司業主"],
        from_before_merge: ["綜合損益總額歸屬於共同控制下前手權益"],
        non_control_equity: ["綜合損益總額歸屬於非控制權益"],
    }
}

const ID: &[&str] = &["公司"];
const NAME: &[&str] = &["公司名稱"];
const OPERATING_REVENUE: &[&str] = &["營業收入", "收益", "收入"];
const INTEREST_REVENUE: &str = "利息淨收益";
const NON_INTEREST_REVENUE: &[&str] = &["利息以外淨損益", "利息以外淨收益"];
const PROFIT_BEFORE_TAX: &[&str] = &[
    "稅前淨利（淨損）",
    "繼續營業單位稅前淨利（淨損）",
    "繼續營業單位稅前損益",
    "繼續營業單位稅前純益（純損）",
];
const INCOME_TAX: &[&str] = &["所得稅費用（利益）", "所得稅（費用）利益", "所得稅利益（費用）"];
const PROFIT: &[&str] = &["本期淨利（淨損）", "本期稅後淨利（淨損）"];
const OTHER_PROFIT: &[&str] = &[
    "其他綜合損益（淨額）",
    "其他綜合損益（稅後）",
    "本期其他綜合損益（稅後淨額）",
    "其他綜合損益（稅後淨額）",
    "其他綜合損益",
];
const OTHER_PROFIT_FROM_MERGED: &[&str] = &["合併前非屬共同控制股權綜合損益淨額"];
const COMPREHENSIVE_PROFIT: &[&str] = &["本期綜合損益總額", "本期綜合損益總額（稅後）"];
pub const EPS: &str = "基本每股盈餘（元）";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfitSheet {
    #[serde(flatten)]
    pub items: ProfitItems,

    pub id: String,
    pub operating_revenue: String,
    pub operating_revenue_detail: OperatingRevenueDetail,
    pub profit_before_tax: String,
    pub income_tax: String,
    pub profit: String,
    pub other_profit: String,
    pub other_profit_from_merged_company: Option<String>,
    pub comprehensive_profit: String,
    pub profit_detail: ProfitDetail,
    pub comprehensive_profit_detail: ComprehensiveProfitDetail,
    /// Per-share figure, not scaled.
    pub eps: String,
}

fn money(reader: &mut RowReader<'_>, field: &'static str, names: &[&str]) -> ParseResult<String> {
    let value = reader.require(names)?;
    thousands(field, value)
}

/// Issuers without a single revenue line (banks, financial holdings) report
/// interest and non-interest revenue; their sum stands in for it.
fn operating_revenue(reader: &mut RowReader<'_>) -> ParseResult<String> {
    if let Some(value) = reader.first(OPERATING_REVENUE) {
        return thousands("operating_revenue", value);
    }

    let interest = reader.peek(&[INTEREST_REVENUE]);
    let non_interest = reader.peek(NON_INTEREST_REVENUE);
    if interest.is_none() && non_interest.is_none() {
        return Err(ParseError::MissingField {
            names: OPERATING_REVENUE
                .iter()
                .chain(std::iter::once(&INTEREST_REVENUE))
                .chain(NON_INTEREST_REVENUE)
                .map(|s| s.to_string())
                .collect(),
            row: reader.row().to_string(),
        });
    }

    let mut total = Decimal::ZERO;
    for (field, value) in [("interest_revenue", interest), ("non_interest_revenue", non_interest)] {
        let Some(value) = value else { continue };
        let scaled = thousands(field, value)?;
        total = parse_decimal(&scaled)
            .and_then(|amount| total.checked_add(amount))
            .ok_or_else(|| ParseError::invalid(field, value, "not a decimal amount"))?;
    }
    let total = format_decimal(total);
    debug!(%total, "operating revenue merged from interest components");
    Ok(total)
}

pub fn normalize_row(row: &RawRow, year: i32, quarter: u8) -> ParseResult<ProfitSheet> {
    let patched = row.get(ID[0]).and_then(|id| {
        let mut candidate = row.clone();
        overrides::apply_to_row(Dataset::ProfitSheet, year, Some(quarter), id, &mut candidate)
            .map(|_| candidate)
    });
    let row = patched.as_ref().unwrap_or(row);

    let mut reader = RowReader::new(row);
    reader.skip(NAME);

    let id = reader.require(ID)?.to_string();
    let operating_revenue = operating_revenue(&mut reader)?;

    let sheet = ProfitSheet {
        items: ProfitItems::read(&mut reader, thousands_opt)?,
        operating_revenue_detail: OperatingRevenueDetail::read(&mut reader, thousands_opt)?,
        profit_before_tax: money(&mut reader, "profit_before_tax", PROFIT_BEFORE_TAX)?,
        income_tax: money(&mut reader, "income_tax", INCOME_TAX)?,
        profit: money(&mut reader, "profit", PROFIT)?,
        other_profit: money(&mut reader, "other_profit", OTHER_PROFIT)?,
        other_profit_from_merged_company: match reader.first(OTHER_PROFIT_FROM_MERGED) {
            Some(value) => thousands_opt("other_profit_from_merged_company", value)?,
            None => None,
        },
        comprehensive_profit: money(&mut reader, "comprehensive_profit", COMPREHENSIVE_PROFIT)?,
        profit_detail: ProfitDetail::read(&mut reader, thousands_opt)?,
        comprehensive_profit_detail: ComprehensiveProfitDetail::read(&mut reader, thousands_opt)?,
        eps: unscaled(reader.require(&[EPS])?),
        id,
        operating_revenue,
    };

    reader.finish(&format!("profit sheet {}", sheet.id));
    Ok(sheet)
}

#[instrument(level = "info", skip(body), fields(body_len = body.len()))]
pub fn parse_profit_sheets(body: &str, year: i32, quarter: u8) -> ParseResult<Vec<ProfitSheet>> {
    let extraction = extract_tables(body, &REPORT_TABLES)?;
    let mut out = Vec::new();
    for row in extraction.raw_rows()? {
        out.push(normalize_row(&row, year, quarter)?);
    }
    info!(year, quarter, rows = out.len(), "profit sheets parsed");
    Ok(out)
}
