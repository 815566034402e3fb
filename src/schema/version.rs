// src/schema/version.rs
//
// Priority-ordered schema version selection. A dataset lists its versions as
// rules; the first rule whose predicate accepts the category wins and no
// match at all is an error, never a default.

use std::fmt::Debug;

use tracing::{debug, error};

use crate::error::{ParseError, ParseResult};

/// What a row or a request can tell about which layout it was published in.
#[derive(Debug, Clone, Copy, Default)]
pub struct Category<'a> {
    pub year: i32,
    pub stock_id: Option<&'a str>,
    /// Cell count of the positional row, when there is one.
    pub cells: Option<usize>,
    /// Free-form discriminator such as a market or issuer category.
    pub label: Option<&'a str>,
}

impl<'a> Category<'a> {
    pub fn year(year: i32) -> Self {
        Self {
            year,
            ..Self::default()
        }
    }

    pub fn label(label: &'a str) -> Self {
        Self {
            label: Some(label),
            ..Self::default()
        }
    }
}

/// A layout a source used at some point, with the header tiers it prints.
pub trait SchemaVersion: Copy + Debug {
    /// Header tiers in document order, super-headers first.
    fn expected_headers(&self) -> &'static [&'static [&'static str]];
}

pub struct Rule<V> {
    pub version: V,
    pub applies: fn(&Category<'_>) -> bool,
}

impl<V: Debug> Debug for Rule<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("version", &self.version).finish()
    }
}

pub fn resolve<V: Copy + Debug>(
    dataset: &str,
    rules: &[Rule<V>],
    category: &Category<'_>,
) -> ParseResult<V> {
    match rules.iter().find(|rule| (rule.applies)(category)) {
        Some(rule) => {
            debug!(%dataset, ?category, version = ?rule.version, "schema version resolved");
            Ok(rule.version)
        }
        None => Err(ParseError::UnknownCategory {
            dataset: dataset.to_string(),
            category: format!("{:?}", category),
        }),
    }
}

pub fn check_header(context: &str, expected: &[&str], actual: &[String]) -> ParseResult<()> {
    if expected.len() == actual.len() && expected.iter().zip(actual).all(|(e, a)| e == a) {
        return Ok(());
    }
    error!(%context, ?expected, ?actual, "unexpected header");
    Err(ParseError::mismatch(context, expected, actual))
}

/// Every tier must match exactly, and there must be as many tiers as expected.
pub fn check_headers(
    context: &str,
    expected: &[&[&str]],
    actual: &[Vec<String>],
) -> ParseResult<()> {
    if expected.len() != actual.len() {
        error!(%context, ?expected, ?actual, "unexpected header tiers");
        return Err(ParseError::mismatch(
            format!("{} header tiers", context),
            expected,
            actual,
        ));
    }
    for (tier, (e, a)) in expected.iter().zip(actual).enumerate() {
        check_header(&format!("{} header tier {}", context, tier + 1), e, a)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Layout {
        New,
        Old,
    }

    const RULES: &[Rule<Layout>] = &[
        Rule {
            version: Layout::New,
            applies: |c| c.year > 2020,
        },
        Rule {
            version: Layout::Old,
            applies: |c| (1912..=2020).contains(&c.year),
        },
    ];

    #[test]
    fn first_matching_rule_wins_and_gaps_fail() -> anyhow::Result<()> {
        assert_eq!(resolve("demo", RULES, &Category::year(2022))?, Layout::New);
        assert_eq!(resolve("demo", RULES, &Category::year(2020))?, Layout::Old);
        assert!(matches!(
            resolve("demo", RULES, &Category::year(1900)),
            Err(ParseError::UnknownCategory { .. })
        ));
        Ok(())
    }

    #[test]
    fn header_tiers_compare_exactly() {
        let actual = vec![vec!["a".to_string(), "b".to_string()]];
        assert!(check_headers("demo", &[&["a", "b"]], &actual).is_ok());
        assert!(check_headers("demo", &[&["a", "c"]], &actual).is_err());
        assert!(check_headers("demo", &[&["a", "b"], &["x"]], &actual).is_err());
    }
}
