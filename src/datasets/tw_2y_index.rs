// src/datasets/tw_2y_index.rs
//
// Two years of daily TAIEX history from the fund site's chart feed: nine
// positional groups, no headers.

use serde::Serialize;
use tracing::{info, instrument};

use crate::error::{ParseError, ParseResult};
use crate::extract::{parse_groups, GroupKind, GroupSpec};

/// Feed layout in order. Volume and margin balance arrive in millions,
/// short selling and day trading in thousands.
pub const GROUPS: &[GroupSpec] = &[
    GroupSpec::new("date", GroupKind::CompactDate),
    GroupSpec::new("opening", GroupKind::Plain),
    GroupSpec::new("highest", GroupKind::Plain),
    GroupSpec::new("lowest", GroupKind::Plain),
    GroupSpec::new("closing", GroupKind::Plain),
    GroupSpec::new("volume", GroupKind::Scaled(6)),
    GroupSpec::new("margin_financing_balance", GroupKind::Scaled(6)),
    GroupSpec::new("short_selling_amount", GroupKind::Scaled(3)),
    GroupSpec::new("day_trading_amount", GroupKind::Scaled(3)),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDay {
    pub date: String,
    pub opening: String,
    pub highest: String,
    pub lowest: String,
    pub closing: String,
    pub volume: String,
    pub margin_financing_balance: String,
    pub short_selling_amount: String,
    pub day_trading_amount: String,
}

impl TryFrom<Vec<String>> for IndexDay {
    type Error = ParseError;

    fn try_from(record: Vec<String>) -> ParseResult<Self> {
        let fields: [String; 9] = record.try_into().map_err(|r: Vec<String>| {
            ParseError::mismatch("index record width", GROUPS.len(), r.len())
        })?;
        let [date, opening, highest, lowest, closing, volume, margin_financing_balance, short_selling_amount, day_trading_amount] =
            fields;
        Ok(Self {
            date,
            opening,
            highest,
            lowest,
            closing,
            volume,
            margin_financing_balance,
            short_selling_amount,
            day_trading_amount,
        })
    }
}

#[instrument(level = "info", skip(body), fields(body_len = body.len()))]
pub fn parse_index_history(body: &str) -> ParseResult<Vec<IndexDay>> {
    let out = parse_groups(body, GROUPS)?
        .into_iter()
        .map(IndexDay::try_from)
        .collect::<ParseResult<Vec<_>>>()?;
    info!(days = out.len(), "index history parsed");
    Ok(out)
}
