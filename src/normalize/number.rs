// src/normalize/number.rs
//
// Decimal strings, never floats. Values stay text on the way in and out;
// arithmetic in between goes through `Decimal`.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Tokens sources print in place of a value.
pub const NOT_APPLICABLE: &[&str] = &["-", "--", "－", "N/A", "null", "不適用", "&nbsp"];

pub fn strip_thousands(value: &str) -> String {
    value.trim().replace(',', "")
}

pub fn is_not_applicable(value: &str) -> bool {
    NOT_APPLICABLE.contains(&value.trim())
}

/// Plain decimal literal with optional sign and thousands separators.
///
/// Exponents, underscores and anything else `Decimal` would otherwise accept
/// are rejected.
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let cleaned = strip_thousands(value);
    let plain = cleaned
        .bytes()
        .enumerate()
        .all(|(i, b)| b.is_ascii_digit() || b == b'.' || (i == 0 && matches!(b, b'-' | b'+')));
    if !plain || !cleaned.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Canonical text: no trailing fractional zeros, no negative zero.
pub fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Multiply a decimal literal by `10^places`.
///
/// Thousands separators are stripped first. Returns `None` for anything that
/// is not a plain decimal literal or would overflow.
pub fn shift_decimal(value: &str, places: u32) -> Option<String> {
    let factor = Decimal::from(10i64.checked_pow(places)?);
    parse_decimal(value)?.checked_mul(factor).map(format_decimal)
}

/// "12.50" → "12.5", "3.00" → "3". Text that is not a number comes back
/// trimmed but otherwise untouched.
pub fn trim_fraction_zeros(value: &str) -> String {
    let value = value.trim();
    match parse_decimal(value) {
        Some(d) => format_decimal(d),
        None => value.to_string(),
    }
}

/// True when the literal denotes zero ("0", "0.00", "-0.0").
pub fn is_zero(value: &str) -> bool {
    parse_decimal(value).is_some_and(|d| d.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifting_is_exact() {
        assert_eq!(shift_decimal("1,000", 3).as_deref(), Some("1000000"));
        assert_eq!(shift_decimal("259,327,332", 3).as_deref(), Some("259327332000"));
        assert_eq!(shift_decimal("1.2345", 3).as_deref(), Some("1234.5"));
        assert_eq!(shift_decimal("2.5", 6).as_deref(), Some("2500000"));
        assert_eq!(shift_decimal("-12", 3).as_deref(), Some("-12000"));
        assert_eq!(shift_decimal("0.004", 3).as_deref(), Some("4"));
        assert_eq!(shift_decimal("0", 3).as_deref(), Some("0"));
        assert_eq!(shift_decimal("-0", 3).as_deref(), Some("0"));
        assert_eq!(shift_decimal("12", 0).as_deref(), Some("12"));
    }

    #[test]
    fn shifting_rejects_non_numbers() {
        assert_eq!(shift_decimal("", 3), None);
        assert_eq!(shift_decimal("--", 3), None);
        assert_eq!(shift_decimal("1.2.3", 3), None);
        assert_eq!(shift_decimal("1e5", 3), None);
        assert_eq!(shift_decimal("1_000", 3), None);
    }

    #[test]
    fn fraction_zeros() {
        assert_eq!(trim_fraction_zeros("12.50"), "12.5");
        assert_eq!(trim_fraction_zeros("3.00"), "3");
        assert_eq!(trim_fraction_zeros("1200"), "1200");
        assert_eq!(trim_fraction_zeros(" 0.000 "), "0");
        assert_eq!(trim_fraction_zeros("無面額"), "無面額");
    }

    #[test]
    fn fractional_amounts_parse() {
        let total = parse_decimal("1,234.5").map(|d| d - Decimal::from(1000));
        assert_eq!(total.map(format_decimal).as_deref(), Some("234.5"));
        assert_eq!(parse_decimal("N/A"), None);
    }

    #[test]
    fn zero_and_sentinels() {
        assert!(is_zero("0.000"));
        assert!(is_zero("-0"));
        assert!(!is_zero("0.01"));
        assert!(!is_zero(""));
        assert!(is_not_applicable(" -- "));
        assert!(is_not_applicable("不適用"));
        assert!(!is_not_applicable("0"));
        assert!(!is_not_applicable("-1"));
    }
}
