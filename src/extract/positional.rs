// src/extract/positional.rs
//
// Header-less positional text: a body of delimiter-separated groups where
// group `i` holds field `i` of every record as a comma list. Group order is
// the only schema there is.

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{ParseError, ParseResult};
use crate::normalize::number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// `YYYYMMDD`, emitted as ISO `YYYY-MM-DD`.
    CompactDate,
    /// Passed through untouched.
    Plain,
    /// Arrives divided by `10^n`; scaled back by decimal shifting.
    Scaled(u32),
}

#[derive(Debug, Clone, Copy)]
pub struct GroupSpec {
    pub name: &'static str,
    pub kind: GroupKind,
}

impl GroupSpec {
    pub const fn new(name: &'static str, kind: GroupKind) -> Self {
        Self { name, kind }
    }
}

fn is_group_delimiter(c: char) -> bool {
    c == ' ' || c == '$'
}

/// Split `body` into `specs.len()` groups and zip them element-wise into
/// records of `specs.len()` fields each. The first group fixes the record
/// count; any other group with a different element count is a format error
/// naming that group.
pub fn parse_groups(body: &str, specs: &[GroupSpec]) -> ParseResult<Vec<Vec<String>>> {
    let body = body.trim().trim_matches('$');
    if body.is_empty() || specs.is_empty() {
        return Ok(Vec::new());
    }

    let groups: Vec<&str> = body.splitn(specs.len(), is_group_delimiter).collect();
    if groups.len() != specs.len() {
        return Err(ParseError::mismatch(
            "positional group count",
            specs.iter().map(|s| s.name).collect::<Vec<_>>(),
            groups.len(),
        ));
    }

    let mut columns: Vec<Vec<String>> = Vec::with_capacity(specs.len());
    let mut expected_len = None;
    for (spec, group) in specs.iter().zip(&groups) {
        let items: Vec<&str> = group.split(',').collect();
        match expected_len {
            None => expected_len = Some(items.len()),
            Some(n) if n != items.len() => {
                return Err(ParseError::mismatch(
                    format!("group `{}` length", spec.name),
                    n,
                    items.len(),
                ))
            }
            Some(_) => {}
        }

        let column = items
            .iter()
            .map(|item| convert(spec, item))
            .collect::<ParseResult<Vec<_>>>()?;
        columns.push(column);
    }

    let len = expected_len.unwrap_or(0);
    debug!(groups = specs.len(), records = len, "positional groups parsed");

    let mut records: Vec<Vec<String>> = (0..len).map(|_| Vec::with_capacity(specs.len())).collect();
    for column in columns {
        for (record, value) in records.iter_mut().zip(column) {
            record.push(value);
        }
    }
    Ok(records)
}

fn convert(spec: &GroupSpec, item: &str) -> ParseResult<String> {
    let item = item.trim();
    match spec.kind {
        GroupKind::CompactDate => NaiveDate::parse_from_str(item, "%Y%m%d")
            .map(|d| d.format("%Y-%m-%d").to_string())
            .map_err(|e| ParseError::invalid(spec.name, item, e.to_string())),
        GroupKind::Plain => Ok(item.to_string()),
        GroupKind::Scaled(places) => number::shift_decimal(item, places)
            .ok_or_else(|| ParseError::invalid(spec.name, item, "not a decimal number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[GroupSpec] = &[
        GroupSpec::new("date", GroupKind::CompactDate),
        GroupSpec::new("close", GroupKind::Plain),
        GroupSpec::new("volume", GroupKind::Scaled(6)),
    ];

    #[test]
    fn zips_groups_into_records() -> anyhow::Result<()> {
        let records = parse_groups("$20240102,20240103 17000.5,17100 1234,2.5$", SPECS)?;
        assert_eq!(
            records,
            vec![
                vec!["2024-01-02", "17000.5", "1234000000"],
                vec!["2024-01-03", "17100", "2500000"],
            ]
        );
        Ok(())
    }

    #[test]
    fn mismatched_group_is_named() {
        let err = parse_groups("20240102,20240103 1,2 3", SPECS).unwrap_err();
        match err {
            ParseError::FormatMismatch { context, .. } => assert!(context.contains("volume")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_group_is_a_mismatch() {
        assert!(matches!(
            parse_groups("20240102 1", SPECS),
            Err(ParseError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn bad_date_is_invalid() {
        assert!(matches!(
            parse_groups("2024-01-02 1 1", SPECS),
            Err(ParseError::InvalidValue { .. })
        ));
    }
}
