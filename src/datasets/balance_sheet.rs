// src/datasets/balance_sheet.rs
//
// Quarterly condensed balance sheets. General, bank, financial holding and
// insurance issuers each print their own vocabulary; every name a field has
// ever been printed under is listed below, most recent first.

use serde::Serialize;
use tracing::{debug, info, instrument};

use super::{thousands, thousands_opt, unscaled, REPORT_TABLES};
use crate::error::{ParseError, ParseResult};
use crate::extract::{extract_tables, RawRow};
use crate::normalize::fields::{field_group, RowReader};
use crate::normalize::number::{format_decimal, parse_decimal};

field_group! {
    pub struct AssetsDetail {
        current_assets: ["流動資產"],
        non_current_assets: ["非流動資產"],

        cash: ["現金及約當現金"],
        savings_in_other_bank: ["存放央行及拆借銀行同業", "存放央行及拆借金融同業"],
        financial_assets_through_profit_or_loss: ["透過損益按公允價值衡量之金融資產"],
        financial_assets_through_other: ["透過其他綜合損益按公允價值衡量之金融資產"],
        invest_by_debt_tool: ["按攤銷後成本衡量之債務工具投資"],
        assets_for_hedging: ["避險之衍生金融資產淨額", "避險之衍生金融資產"],
        sell_back_bill_or_bond: ["附賣回票券及債券投資淨額", "附賣回票券及債券投資"],
        accounts_receivable: ["應收款項－淨額", "應收款項"],
        current_income_tax_overpaid: ["當期所得稅資產", "本期所得稅資產"],
        unsell_assets: ["待出售資產－淨額", "待出售資產"],
        assets_unpaid_to_owner: ["待分配予業主之資產－淨額", "待分配予業主之資產（或處分群組）"],
        loans: ["貼現及放款－淨額"],

        reinsurance_contract_assets: ["再保險合約資產－淨額", "再保險合約資產"],

        invest_by_equity: ["採用權益法之投資－淨額", "投資"],
        restricted_assets: ["受限制資產－淨額"],
        other_financial_assets: ["其他金融資產－淨額"],
        property_assets: ["不動產及設備－淨額", "不動產及設備"],
        right_of_use_assets: ["使用權資產－淨額", "使用權資產"],
        invest_property_assets: ["投資性不動產投資－淨額", "投資性不動產－淨額"],
        intangible_assets: ["無形資產－淨額", "無形資產"],
        income_tax_overpaid: ["遞延所得稅資產"],
        other_assets: ["其他資產－淨額", "其他資產"],

        invest_insurance_account_assets: ["分離帳戶保險商品資產"],
    }
}

field_group! {
    pub struct LiabilitiesDetail {
        current_liabilities: ["流動負債", "短期債務"],
        non_current_liabilities: ["非流動負債"],

        savings_from_other_bank: ["央行及銀行同業存款", "央行及金融同業存款"],
        debt_from_other_bank: ["央行及同業融資"],
        financial_liabilities_through_profit_or_loss: ["透過損益按公允價值衡量之金融負債"],
        financial_liabilities_for_hedging: ["避險之衍生金融負債－淨額", "避險之衍生金融負債"],
        buy_back_bill_or_bond: ["附買回票券及債券負債"],

        commercial_paper_payable: ["應付商業本票－淨額"],

        accounts_payable: ["應付款項"],
        current_income_tax_unpaid: ["當期所得稅負債", "本期所得稅負債"],
        liabilities_related_to_unsell_assets: ["與待出售資產直接相關之負債"],
        savings: ["存款及匯款"],
        bond_payable: ["應付金融債券", "應付債券"],
        company_bond_payable: ["應付公司債", "其他借款"],
        special_share_payable: ["特別股負債"],
        other_financial_liabilities: ["其他金融負債"],
        prepare_liabilities: ["負債準備"],
        lease_liabilities: ["租賃負債"],

        insurance_product_liabilities: ["保險負債"],
        financial_insurance_contract_prepare_liabilities: ["具金融商品性質之保險契約準備"],
        foreign_currency_price_prepare_liabilities: ["外匯價格變動準備"],
        invest_insurance_account_liabilities: ["分離帳戶保險商品負債"],

        income_tax_unpaid: ["遞延所得稅負債"],
        other_liabilities: ["其他負債"],
    }
}

const ID: &[&str] = &["公司"];
const NAME: &[&str] = &["公司名稱"];
const ASSETS: &[&str] = &["資產總計", "資產總額", "資產合計"];
const LIABILITIES: &[&str] = &["負債總計", "負債總額", "負債合計"];
const SHARE_CAPITAL: &[&str] = &["股本"];
const CAPITAL_SURPLUS: &[&str] = &["資本公積"];
const RETAINED_EARNINGS: &[&str] = &["保留盈餘（或累積虧損）", "保留盈餘"];
const OTHER_EQUITY: &[&str] = &["其他權益"];
const TREASURE_STOCK: &[&str] = &["庫藏股票", "庫藏股"];
const PARENT_EQUITY: &[&str] = &[
    "歸屬於母公司業主權益合計",
    "歸屬於母公司業主之權益合計",
    "歸屬於母公司業主之權益",
];
const CHILD_MERGE_EQUITY: &[&str] = &["共同控制下前手權益"];
const NON_CONTROL_EQUITY: &[&str] = &["非控制權益"];
const TOTAL_EQUITY: &[&str] = &["權益總計", "權益總額", "權益合計"];
const NET_WORTH: &[&str] = &["每股參考淨值"];
const VIRTUAL_CURRENCY: &[&str] = &["權益－具證券性質之虛擬通貨", "權益─具證券性質之虛擬通貨"];
const SHARE_OF_CHILD_MERGE: &[&str] = &["合併前非屬共同控制股權"];

/// Last year non-controlling equity may be missing and is derived instead.
const DERIVED_NON_CONTROL_UNTIL: i32 = 2017;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSheet {
    pub assets_detail: AssetsDetail,
    pub liabilities_detail: LiabilitiesDetail,

    pub virtual_currency: Option<String>,
    pub share_of_child_merge_from: Option<String>,

    pub id: String,
    pub assets: String,
    pub liabilities: String,

    pub share_capital: String,
    pub capital_surplus: String,
    pub retained_earnings: String,
    pub other_equity: String,
    pub treasure_stock: String,

    pub total_equity_of_this_company: String,
    pub equity_of_child_merge_from: String,
    pub non_control_equity: String,
    pub equity: String,

    /// Per-share figure, not scaled.
    pub net_worth: String,
}

fn money(reader: &mut RowReader<'_>, field: &'static str, names: &[&str]) -> ParseResult<String> {
    let value = reader.require(names)?;
    thousands(field, value)
}

fn money_opt(reader: &mut RowReader<'_>, field: &'static str, names: &[&str]) -> ParseResult<Option<String>> {
    match reader.first(names) {
        Some(value) => thousands_opt(field, value),
        None => Ok(None),
    }
}

fn derive_non_control(total: &str, parent: &str) -> ParseResult<String> {
    let total_units = parse_decimal(total)
        .ok_or_else(|| ParseError::invalid("equity", total, "not a decimal amount"))?;
    let parent_units = parse_decimal(parent).ok_or_else(|| {
        ParseError::invalid("total_equity_of_this_company", parent, "not a decimal amount")
    })?;
    total_units
        .checked_sub(parent_units)
        .map(format_decimal)
        .ok_or_else(|| ParseError::invalid("non_control_equity", total, "difference overflows"))
}

/// Normalize one keyed row of the report for fiscal `year`.
pub fn normalize_row(row: &RawRow, year: i32) -> ParseResult<BalanceSheet> {
    let mut reader = RowReader::new(row);
    reader.skip(NAME);

    let id = reader.require(ID)?.to_string();
    let parent_equity = money(&mut reader, "total_equity_of_this_company", PARENT_EQUITY)?;
    let equity = money(&mut reader, "equity", TOTAL_EQUITY)?;

    let assets_detail = AssetsDetail::read(&mut reader, thousands_opt)?;
    let liabilities_detail = LiabilitiesDetail::read(&mut reader, thousands_opt)?;

    let non_control_equity =
        if year <= DERIVED_NON_CONTROL_UNTIL && reader.peek(NON_CONTROL_EQUITY).is_none() {
            derive_non_control(&equity, &parent_equity)?
        } else {
            money(&mut reader, "non_control_equity", NON_CONTROL_EQUITY)?
        };

    let sheet = BalanceSheet {
        virtual_currency: money_opt(&mut reader, "virtual_currency", VIRTUAL_CURRENCY)?,
        share_of_child_merge_from: money_opt(&mut reader, "share_of_child_merge_from", SHARE_OF_CHILD_MERGE)?,
        assets: money(&mut reader, "assets", ASSETS)?,
        liabilities: money(&mut reader, "liabilities", LIABILITIES)?,
        share_capital: money(&mut reader, "share_capital", SHARE_CAPITAL)?,
        capital_surplus: money(&mut reader, "capital_surplus", CAPITAL_SURPLUS)?,
        retained_earnings: money(&mut reader, "retained_earnings", RETAINED_EARNINGS)?,
        other_equity: money(&mut reader, "other_equity", OTHER_EQUITY)?,
        treasure_stock: money(&mut reader, "treasure_stock", TREASURE_STOCK)?,
        total_equity_of_this_company: parent_equity,
        equity_of_child_merge_from: money(&mut reader, "equity_of_child_merge_from", CHILD_MERGE_EQUITY)?,
        non_control_equity,
        equity,
        net_worth: unscaled(reader.require(NET_WORTH)?),
        id,
        assets_detail,
        liabilities_detail,
    };

    reader.finish(&format!("balance sheet {}", sheet.id));
    Ok(sheet)
}

/// Parse a balance-sheet report page. Each issuer category is its own table.
#[instrument(level = "info", skip(body), fields(body_len = body.len()))]
pub fn parse_balance_sheets(body: &str, year: i32) -> ParseResult<Vec<BalanceSheet>> {
    let extraction = extract_tables(body, &REPORT_TABLES)?;
    let mut out = Vec::new();
    for row in extraction.raw_rows()? {
        let sheet = normalize_row(&row, year)?;
        debug!(id = %sheet.id, "balance sheet row");
        out.push(sheet);
    }
    info!(year, rows = out.len(), "balance sheets parsed");
    Ok(out)
}
