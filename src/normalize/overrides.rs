// src/normalize/overrides.rs
//
// Hand corrections for rows the upstream publishes wrong. Entries are matched
// in order and the first hit wins.

use tracing::info;

use crate::extract::RawRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Dividend,
    ProfitSheet,
}

/// Which issuers an entry applies to.
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    Stocks(&'static [&'static str]),
    /// Any issuer whose positional row satisfies the predicate.
    Pattern(fn(&[String]) -> bool),
}

#[derive(Debug, Clone, Copy)]
pub enum Patch {
    /// Overwrite positional cells.
    Columns(&'static [(usize, &'static str)]),
    /// Overwrite a keyed cell, but only while it still holds `from`.
    Field {
        name: &'static str,
        from: &'static str,
        to: &'static str,
    },
    /// Leave the row as published but skip the consistency checks.
    Bypass,
}

#[derive(Debug, Clone, Copy)]
pub struct KnownOverride {
    pub dataset: Dataset,
    pub year: i32,
    pub quarter: Option<u8>,
    pub matcher: Matcher,
    pub patch: Patch,
}

impl KnownOverride {
    fn matches(
        &self,
        dataset: Dataset,
        year: i32,
        quarter: Option<u8>,
        stock_id: &str,
        cells: &[String],
    ) -> bool {
        self.dataset == dataset
            && self.year == year
            && (self.quarter.is_none() || self.quarter == quarter)
            && match self.matcher {
                Matcher::Stocks(ids) => ids.contains(&stock_id),
                Matcher::Pattern(pred) => pred(cells),
            }
    }
}

/// 2012 rows with cash from earnings and every total filled in but the
/// reserve cash column left blank.
fn blank_reserve_cash(cells: &[String]) -> bool {
    cells.len() > 16
        && !cells[11].is_empty()
        && cells[12].is_empty()
        && cells[13..=16].iter().all(|c| !c.is_empty())
}

pub const KNOWN_OVERRIDES: &[KnownOverride] = &[
    KnownOverride {
        dataset: Dataset::Dividend,
        year: 2014,
        quarter: None,
        matcher: Matcher::Stocks(&["1231"]),
        patch: Patch::Columns(&[(14, "1.2"), (15, "0.0")]),
    },
    KnownOverride {
        dataset: Dataset::Dividend,
        year: 2020,
        quarter: None,
        matcher: Matcher::Stocks(&["1784"]),
        patch: Patch::Bypass,
    },
    KnownOverride {
        dataset: Dataset::Dividend,
        year: 2012,
        quarter: None,
        matcher: Matcher::Stocks(&["1410", "3338", "4960"]),
        patch: Patch::Columns(&[(12, "0.0"), (16, "0")]),
    },
    KnownOverride {
        dataset: Dataset::Dividend,
        year: 2012,
        quarter: None,
        matcher: Matcher::Stocks(&["2324"]),
        patch: Patch::Columns(&[(16, "0")]),
    },
    KnownOverride {
        dataset: Dataset::Dividend,
        year: 2020,
        quarter: None,
        matcher: Matcher::Stocks(&["4577"]),
        patch: Patch::Columns(&[(13, "0"), (14, "0.0"), (15, "0.0"), (16, "0")]),
    },
    KnownOverride {
        dataset: Dataset::Dividend,
        year: 2012,
        quarter: None,
        matcher: Matcher::Stocks(&["1258"]),
        patch: Patch::Columns(&[(11, "2.2"), (12, "0.0"), (14, "0.0"), (15, "0.0")]),
    },
    // 2724, 3114, 4109, 4113, 4406, 4510, 4953, 5443, 6203
    KnownOverride {
        dataset: Dataset::Dividend,
        year: 2012,
        quarter: None,
        matcher: Matcher::Pattern(blank_reserve_cash),
        patch: Patch::Columns(&[(12, "0.0")]),
    },
    KnownOverride {
        dataset: Dataset::Dividend,
        year: 2012,
        quarter: None,
        matcher: Matcher::Stocks(&["4154", "4905", "8289"]),
        patch: Patch::Bypass,
    },
    KnownOverride {
        dataset: Dataset::Dividend,
        year: 2012,
        quarter: None,
        matcher: Matcher::Stocks(&["5516"]),
        patch: Patch::Columns(&[(11, "1.0"), (12, "0.0"), (14, "0.0"), (15, "0.0"), (16, "0")]),
    },
    // EPS published as `--`; value taken from the filed report.
    KnownOverride {
        dataset: Dataset::ProfitSheet,
        year: 2018,
        quarter: Some(2),
        matcher: Matcher::Stocks(&["6693"]),
        patch: Patch::Field {
            name: "基本每股盈餘（元）",
            from: "--",
            to: "0.53",
        },
    },
];

/// Pairs whose totals contradict their constituents upstream and are taken
/// as published.
pub const TOTALS_EXCEPTIONS: &[(i32, &str)] = &[(2018, "3447")];

pub fn is_totals_exception(year: i32, stock_id: &str) -> bool {
    TOTALS_EXCEPTIONS
        .iter()
        .any(|&(y, id)| y == year && id == stock_id)
}

pub fn find_override(
    dataset: Dataset,
    year: i32,
    quarter: Option<u8>,
    stock_id: &str,
    cells: &[String],
) -> Option<&'static KnownOverride> {
    KNOWN_OVERRIDES
        .iter()
        .find(|o| o.matches(dataset, year, quarter, stock_id, cells))
}

/// Apply the first matching positional override to `cells`. Returns the
/// entry that matched, if any.
pub fn apply_to_cells(
    dataset: Dataset,
    year: i32,
    stock_id: &str,
    cells: &mut [String],
) -> Option<&'static KnownOverride> {
    let hit = find_override(dataset, year, None, stock_id, cells)?;
    if let Patch::Columns(patches) = hit.patch {
        for &(idx, value) in patches {
            if let Some(cell) = cells.get_mut(idx) {
                *cell = value.to_string();
            }
        }
    }
    info!(year, %stock_id, patch = ?hit.patch, "known override applied");
    Some(hit)
}

/// Apply the first matching keyed override to `row`.
pub fn apply_to_row(
    dataset: Dataset,
    year: i32,
    quarter: Option<u8>,
    stock_id: &str,
    row: &mut RawRow,
) -> Option<&'static KnownOverride> {
    let hit = find_override(dataset, year, quarter, stock_id, &[])?;
    match hit.patch {
        Patch::Field { name, from, to } => {
            if row.get(name) != Some(from) {
                return None;
            }
            row.set(name, to);
        }
        Patch::Columns(_) | Patch::Bypass => {}
    }
    info!(year, %stock_id, patch = ?hit.patch, "known override applied");
    Some(hit)
}
